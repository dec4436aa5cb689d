//! Error types for the Vidgate CLI
//!
//! Errors are user-facing; messages say what went wrong and what to try next.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Ingestion was refused before any download was attempted
    #[error("{0}. Retry once the current attempt finishes or disk space is freed.")]
    Rejected(String),

    /// Ingestion was attempted and failed
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    /// Configuration problem
    #[error("Configuration error: {0}. Check VIDGATE_* environment variables.")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vidgate_ingest::IngestError> for CliError {
    fn from(error: vidgate_ingest::IngestError) -> Self {
        if error.is_rejection() {
            CliError::Rejected(error.to_string())
        } else {
            CliError::Ingestion(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidgate_ingest::IngestError;

    #[test]
    fn test_rejection_mapping() {
        let err: CliError = IngestError::LockContention {
            key: "drive-x".into(),
        }
        .into();
        assert!(matches!(err, CliError::Rejected(_)));

        let err: CliError = IngestError::AllMethodsExhausted {
            stream_error: "a".into(),
            heavyweight_error: "b".into(),
        }
        .into();
        assert!(matches!(err, CliError::Ingestion(_)));
    }
}
