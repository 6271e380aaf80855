use super::{CampaignOptions, Category, MutantCampaign, MutantKind, MutantRecord, Permanence};
use crate::catalog::ArchitectureModel;
use crate::fault_edges::FaultEdgeTable;
use crate::fault_space::FaultSpace;
use crate::trace::{AccessSummary, DecodedTrace};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Records buffered before a flush to the sink
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Receives generated mutants in bounded batches.
///
/// Implementations deduplicate: inserting an already present
/// `(kind, target, mask, access index)` is a no-op.
pub trait MutantSink {
    /// Consume every record of `batch`, leaving it empty; returns the number
    /// of new mutants
    fn insert_batch(&mut self, batch: &mut Vec<MutantRecord>) -> usize;
}

/// Outcome of one generation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Records emitted before deduplication
    pub emitted: u64,
    /// New mutants stored by the sink
    pub inserted: u64,
    /// Structures skipped because they are not faultable
    pub skipped: u64,
}

/// Turns decoded coverage and the fault space into mutants
#[derive(Debug, Clone, Copy)]
pub struct MutantGenerator<'a> {
    arch: &'a ArchitectureModel,
    space: &'a FaultSpace,
    edges: &'a FaultEdgeTable,
    batch_size: usize,
}

struct Batch<'s, S: MutantSink> {
    buf: Vec<MutantRecord>,
    cap: usize,
    sink: &'s mut S,
    report: GenerationReport,
}

impl<S: MutantSink> Batch<'_, S> {
    fn push(&mut self, record: MutantRecord) {
        self.buf.push(record);
        self.report.emitted += 1;
        if self.buf.len() >= self.cap {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.buf.is_empty() {
            self.report.inserted += self.sink.insert_batch(&mut self.buf) as u64;
        }
    }
}

impl<'a> MutantGenerator<'a> {
    /// Generator over one architecture's fault space and edge table
    #[must_use]
    pub const fn new(
        arch: &'a ArchitectureModel,
        space: &'a FaultSpace,
        edges: &'a FaultEdgeTable,
    ) -> Self {
        Self {
            arch,
            space,
            edges,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size (minimum 1)
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 { 1 } else { batch_size };
        self
    }

    /// Build a complete campaign for one test program
    #[must_use]
    pub fn generate_campaign(
        &self,
        name: impl Into<String>,
        trace: &DecodedTrace,
        options: CampaignOptions,
    ) -> MutantCampaign {
        let mut campaign = MutantCampaign::new(name, options);
        let report = self.generate(trace, options, &mut campaign);
        campaign.add_skipped(report.skipped);
        info!(
            program = campaign.name(),
            mutants = campaign.len(),
            skipped = report.skipped,
            "generated mutants"
        );
        campaign
    }

    /// Emit every mutant selected by `options` into `sink`
    pub fn generate<S: MutantSink>(
        &self,
        trace: &DecodedTrace,
        options: CampaignOptions,
        sink: &mut S,
    ) -> GenerationReport {
        let mut batch = Batch {
            buf: Vec::with_capacity(self.batch_size),
            cap: self.batch_size,
            sink,
            report: GenerationReport::default(),
        };

        if options.gpr {
            self.register_faults(
                &mut batch,
                Category::Gpr,
                trace.gpr_accesses(),
                |n| self.space.gpr_masks(n),
                options,
            );
        }
        if options.csr {
            self.register_faults(
                &mut batch,
                Category::Csr,
                trace.csr_accesses(),
                |n| self.space.csr_masks(n),
                options,
            );
        }
        if options.imem {
            self.instruction_faults(&mut batch, trace, options);
        }
        if options.ifr {
            for &mask in self.space.ifr_masks() {
                permanent(&mut batch, Category::InstructionFetchRegister, 0, mask, None, options);
            }
            batch.flush();
        }
        if options.coremem {
            let bytes = trace.touched_bytes();
            for address in bytes {
                for &mask in self.space.coremem_masks() {
                    permanent(&mut batch, Category::CoreMemory, address, mask, None, options);
                }
            }
            batch.flush();
        }

        batch.flush();
        batch.report
    }

    fn register_faults<S, F>(
        &self,
        batch: &mut Batch<'_, S>,
        category: Category,
        accesses: &BTreeMap<u64, AccessSummary>,
        masks_of: F,
        options: CampaignOptions,
    ) where
        S: MutantSink,
        F: Fn(u64) -> Option<&'a [u64]>,
    {
        let mut eligible = Vec::new();
        for (&number, summary) in accesses {
            let Some(masks) = masks_of(number) else {
                if category == Category::Csr && self.arch.csr(number).is_none() {
                    warn!("unknown CSR access (number: {number})");
                } else {
                    debug!(%number, ?category, "register not in fault space");
                }
                batch.report.skipped += 1;
                continue;
            };
            if summary.is_written() {
                eligible.push((number, *summary, masks));
            }
        }

        for &(number, _, masks) in &eligible {
            for &mask in masks {
                permanent(batch, category, number, mask, None, options);
            }
        }
        batch.flush();

        if options.transient {
            let Some(kind) = MutantKind::new(category, Permanence::TransientFlip) else {
                return;
            };
            for &(number, summary, masks) in &eligible {
                for access_index in 1..=summary.total {
                    for &mask in masks {
                        batch.push(MutantRecord {
                            kind,
                            target: number,
                            access_index,
                            mask,
                            edge: None,
                        });
                    }
                }
            }
            batch.flush();
        }
    }

    fn instruction_faults<S: MutantSink>(
        &self,
        batch: &mut Batch<'_, S>,
        trace: &DecodedTrace,
        options: CampaignOptions,
    ) {
        for site in trace.instructions() {
            let Some(masks) = self.space.instruction_masks(site.instruction) else {
                batch.report.skipped += 1;
                continue;
            };
            for &mask in masks {
                let edge = self.edges.get(site.instruction, mask).copied();
                if edge.is_none() {
                    debug!(
                        instruction = %site.instruction,
                        mask,
                        "no fault edge for instruction mask"
                    );
                }
                permanent(batch, Category::InstructionMemory, site.address, mask, edge, options);
            }
        }
        batch.flush();
    }
}

fn permanent<S: MutantSink>(
    batch: &mut Batch<'_, S>,
    category: Category,
    target: u64,
    mask: u64,
    edge: Option<crate::fault_edges::InstructionFaultEdge>,
    options: CampaignOptions,
) {
    let mut emit = |permanence| {
        if let Some(kind) = MutantKind::new(category, permanence) {
            batch.push(MutantRecord {
                kind,
                target,
                access_index: 0,
                mask,
                edge,
            });
        }
    };
    if options.flip {
        emit(Permanence::PermanentFlip);
    }
    if options.stuck_at {
        emit(Permanence::PermanentStuckAt0);
        emit(Permanence::PermanentStuckAt1);
    }
}
