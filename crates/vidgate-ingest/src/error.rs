//! Error taxonomy for the ingestion pipeline
//!
//! Lock and admission rejections mean "not attempted" and are surfaced
//! immediately; per-method transfer failures are absorbed by the
//! orchestrator's one-shot fallback and only total exhaustion reaches the
//! caller.

use crate::download::IngestMethod;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors surfaced by the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    /// The resource is already being ingested by another attempt.
    /// Advisory, not fatal; the caller should not retry immediately.
    #[error("ingestion already in progress for resource '{key}'")]
    LockContention { key: String },

    /// The disk-headroom gate refused the operation. The caller may retry
    /// once space has been reclaimed.
    #[error("insufficient disk headroom: {reason}")]
    AdmissionDenied { reason: String },

    /// A single download method failed. Internal to the orchestrator's
    /// fallback protocol; surfaced only through `AllMethodsExhausted`.
    #[error("{method} download failed: {reason}")]
    TransferFailed { method: IngestMethod, reason: String },

    /// Both the stream and heavyweight methods failed for this attempt.
    #[error("all download methods exhausted (stream: {stream_error}; heavyweight: {heavyweight_error})")]
    AllMethodsExhausted {
        stream_error: String,
        heavyweight_error: String,
    },

    /// Filesystem usage could not be sampled. Monitoring paths degrade to a
    /// synthetic warning; the admission gate fails closed and rejects the
    /// attempt with this variant.
    #[error("disk introspection unavailable")]
    DiskUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Whether this failure means the attempt was never started, as opposed
    /// to attempted and failed.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            IngestError::LockContention { .. }
                | IngestError::AdmissionDenied { .. }
                | IngestError::DiskUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_classified() {
        let lock = IngestError::LockContention {
            key: "drive-abc".into(),
        };
        let denied = IngestError::AdmissionDenied {
            reason: "free space below headroom".into(),
        };
        let exhausted = IngestError::AllMethodsExhausted {
            stream_error: "timeout".into(),
            heavyweight_error: "exit 1".into(),
        };

        assert!(lock.is_rejection());
        assert!(denied.is_rejection());
        assert!(IngestError::DiskUnavailable.is_rejection());
        assert!(!exhausted.is_rejection());
    }

    #[test]
    fn test_exhausted_message_retains_both_errors() {
        let err = IngestError::AllMethodsExhausted {
            stream_error: "connection reset".into(),
            heavyweight_error: "yt-dlp exit 1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("connection reset"));
        assert!(msg.contains("yt-dlp exit 1"));
    }
}
