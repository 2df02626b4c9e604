//! Error types for handsweep.
//!
//! Taxonomy:
//! - Setup: the run cannot start (bad config, bad ranges, checkpoint mismatch)
//! - I/O: the run started but the disk or the encoder failed; fatal for the run
//! - Invariant: a collaborator broke its contract (duplicate image names)
//!
//! Cancellation is not an error; it is reported through `RunOutcome`.

use crate::models::Dof;
use thiserror::Error;

/// Top-level error type for handsweep.
#[derive(Debug, Error)]
pub enum SweepError {
    // ═══════════════════════════════════════════════════════════════════
    // SETUP: the run never starts, no output is touched
    // ═══════════════════════════════════════════════════════════════════
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid range for {dof}: min={min}, max={max}, step={step}")]
    InvalidRange {
        dof: Dof,
        min: f64,
        max: f64,
        step: f64,
    },

    #[error("Parameter space is missing a range for {0}")]
    MissingRange(Dof),

    #[error("Checkpoint does not match the current parameter space: {0}")]
    CheckpointMismatch(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // I/O: fatal for the current run, writer is closed before surfacing
    // ═══════════════════════════════════════════════════════════════════
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),

    // ═══════════════════════════════════════════════════════════════════
    // INVARIANT: collaborator contract broken
    // ═══════════════════════════════════════════════════════════════════
    #[error("Image name '{0}' was already written in this run")]
    DuplicateImageName(String),

    #[error("Invalid image name '{0}': must be a plain file name")]
    InvalidImageName(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SweepError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error happened before any output was touched.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidRange { .. }
                | Self::MissingRange(_)
                | Self::CheckpointMismatch(_)
                | Self::ParseError(_)
        )
    }
}

/// Result type alias for handsweep.
pub type Result<T> = std::result::Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_failure_classification() {
        let err = SweepError::InvalidRange {
            dof: Dof::Beta,
            min: 1.0,
            max: 0.0,
            step: 1.0,
        };
        assert!(err.is_setup_failure());
        assert!(err.to_string().contains("beta"));

        let err = SweepError::io(
            "writing csv",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert!(!err.is_setup_failure());
        assert_eq!(err.to_string(), "IO error: writing csv");
    }
}
