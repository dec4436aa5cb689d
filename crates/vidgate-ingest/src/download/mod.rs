//! Download methods
//!
//! Two interchangeable strategies behind one contract: a direct
//! byte-streamed HTTP download (the default for small/medium transfers) and
//! a heavyweight subprocess downloader reserved for large or type-ambiguous
//! transfers where simple streaming is unreliable. Both honor the same
//! verification and partial-cleanup rules, so the orchestrator can fall back
//! from one to the other.

mod heavyweight;
mod stream;

pub use heavyweight::HeavyweightDownloader;
pub use stream::StreamDownloader;

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Download method selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMethod {
    Stream,
    Heavyweight,
}

impl IngestMethod {
    /// The one-shot fallback counterpart of this method
    pub fn fallback(self) -> IngestMethod {
        match self {
            IngestMethod::Stream => IngestMethod::Heavyweight,
            IngestMethod::Heavyweight => IngestMethod::Stream,
        }
    }
}

impl std::fmt::Display for IngestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestMethod::Stream => write!(f, "stream"),
            IngestMethod::Heavyweight => write!(f, "heavyweight"),
        }
    }
}

/// Successful download outcome
#[derive(Debug, Clone, Copy)]
pub struct DownloadOutcome {
    pub size_bytes: u64,
}

/// Contract shared by all download methods
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` to `dest`
    ///
    /// Implementations must verify the result and remove any partial file on
    /// every failure path, so retries never observe stale artifacts.
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome>;
}

/// Verify a finished download and clean up on rejection
///
/// The destination must exist and exceed the minimum plausible size; an
/// undersized file is an HTML error or consent page saved as the body, and
/// is removed before the failure is reported.
pub(crate) async fn verify_download(
    method: IngestMethod,
    dest: &Path,
    min_plausible_bytes: u64,
) -> Result<u64> {
    let size = match tokio::fs::metadata(dest).await {
        Ok(m) if m.is_file() => m.len(),
        _ => {
            return Err(IngestError::TransferFailed {
                method,
                reason: format!("destination file missing: {}", dest.display()),
            });
        },
    };

    if size < min_plausible_bytes {
        remove_partial(dest).await;
        return Err(IngestError::TransferFailed {
            method,
            reason: format!(
                "downloaded file too small to be media ({} bytes, minimum {})",
                size, min_plausible_bytes
            ),
        });
    }

    Ok(size)
}

/// Best-effort removal of a partially written destination file
pub(crate) async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => {},
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => {
            warn!(file = %dest.display(), error = %e, "failed to remove partial download");
        },
    }
}
