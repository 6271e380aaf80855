//! Result and error types for faultcov.

use thiserror::Error;

/// Result type for faultcov operations
pub type FaultcovResult<T> = Result<T, FaultcovError>;

/// Errors that can occur in faultcov
///
/// Only catalog problems and an exhausted simulator budget are fatal for a
/// campaign. Trace and generation anomalies are logged and skipped instead of
/// surfacing here.
#[derive(Debug, Error)]
pub enum FaultcovError {
    /// Architecture catalog could not be loaded or is inconsistent
    #[error("Catalog error: {message}")]
    Catalog {
        /// Error message
        message: String,
    },

    /// Two instruction definitions decode the same encoding
    #[error("Ambiguous decode table: {first} and {second} both match 0x{word:08x}")]
    AmbiguousEncoding {
        /// First matching instruction
        first: String,
        /// Second matching instruction
        second: String,
        /// Witness encoding matched by both
        word: u64,
    },

    /// Fault-override document is malformed
    #[error("Fault override error: {message}")]
    FaultOverride {
        /// Error message
        message: String,
    },

    /// Artifact (mutant list, results, summary) is malformed
    #[error("Artifact error: {message}")]
    Artifact {
        /// Error message
        message: String,
    },

    /// A single simulator attempt failed
    #[error("Simulator attempt failed: {message}")]
    SimulatorAttempt {
        /// Error message
        message: String,
    },

    /// Simulator kept failing until the attempt budget ran out
    #[error("Simulator gave up after {attempts} attempts: {last_error}")]
    SimulatorExhausted {
        /// Attempts made
        attempts: u32,
        /// Error of the final attempt
        last_error: String,
    },

    /// Simulator did not finish in time
    #[error("Simulator timed out after {secs}s")]
    Timeout {
        /// Timeout in seconds
        secs: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FaultcovError {
    /// Create a catalog error
    #[must_use]
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a fault-override error
    #[must_use]
    pub fn fault_override(message: impl Into<String>) -> Self {
        Self::FaultOverride {
            message: message.into(),
        }
    }

    /// Create an artifact error
    #[must_use]
    pub fn artifact(message: impl Into<String>) -> Self {
        Self::Artifact {
            message: message.into(),
        }
    }

    /// Create a simulator attempt error
    #[must_use]
    pub fn simulator_attempt(message: impl Into<String>) -> Self {
        Self::SimulatorAttempt {
            message: message.into(),
        }
    }

    /// Whether the error aborts a whole run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Catalog { .. } | Self::AmbiguousEncoding { .. } | Self::SimulatorExhausted { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_display() {
        let err = FaultcovError::catalog("missing operand rd");
        assert!(err.to_string().contains("Catalog"));
        assert!(err.to_string().contains("rd"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ambiguous_encoding_display() {
        let err = FaultcovError::AmbiguousEncoding {
            first: "addi".into(),
            second: "nop".into(),
            word: 0x13,
        };
        assert!(err.to_string().contains("0x00000013"));
    }

    #[test]
    fn test_exhausted_is_fatal_but_attempt_is_not() {
        let attempt = FaultcovError::simulator_attempt("exit status 1");
        assert!(!attempt.is_fatal());
        let exhausted = FaultcovError::SimulatorExhausted {
            attempts: 5,
            last_error: attempt.to_string(),
        };
        assert!(exhausted.is_fatal());
        assert!(exhausted.to_string().contains("5 attempts"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FaultcovError = io_err.into();
        assert!(err.to_string().contains("I/O"));
        assert!(!err.is_fatal());
    }
}
