//! Heavyweight subprocess download
//!
//! Invokes an external multiplexing/remuxing tool (yt-dlp) for transfers
//! where simple streaming is unreliable: large files, type-ambiguous
//! responses, and hosts that only serve media through interstitial pages.
//! Honors the same verification and partial-cleanup contract as the stream
//! method.

use super::{remove_partial, verify_download, DownloadOutcome, IngestMethod, MediaDownloader};
use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Downloader backed by a yt-dlp subprocess
pub struct HeavyweightDownloader {
    config: Arc<PipelineConfig>,
}

impl HeavyweightDownloader {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    async fn run_tool(&self, url: &str, dest: &Path) -> Result<()> {
        let mut command = tokio::process::Command::new(&self.config.ytdlp_binary);
        command
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--user-agent")
            .arg(&self.config.user_agent)
            .arg("--output")
            .arg(dest)
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.config.heavyweight_timeout_secs);
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(IngestError::TransferFailed {
                    method: IngestMethod::Heavyweight,
                    reason: format!(
                        "failed to launch {}: {}",
                        self.config.ytdlp_binary, e
                    ),
                });
            },
            Err(_) => {
                // kill_on_drop reaps the subprocess when the future is dropped
                return Err(IngestError::TransferFailed {
                    method: IngestMethod::Heavyweight,
                    reason: format!(
                        "{} timed out after {}s",
                        self.config.ytdlp_binary,
                        timeout.as_secs()
                    ),
                });
            },
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr_tail(&stderr);
            warn!(url = %url, status = %output.status, stderr = %tail, "heavyweight tool failed");
            return Err(IngestError::TransferFailed {
                method: IngestMethod::Heavyweight,
                reason: format!("{} exited with {}: {}", self.config.ytdlp_binary, output.status, tail),
            });
        }

        Ok(())
    }
}

/// Last few stderr lines, enough to diagnose without flooding the result
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail_start = lines.len().saturating_sub(3);
    lines[tail_start..].join("; ")
}

#[async_trait]
impl MediaDownloader for HeavyweightDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome> {
        info!(
            url = %url,
            dest = %dest.display(),
            tool = %self.config.ytdlp_binary,
            "starting heavyweight download"
        );

        if let Err(e) = self.run_tool(url, dest).await {
            remove_partial(dest).await;
            return Err(e);
        }

        let size_bytes = verify_download(
            IngestMethod::Heavyweight,
            dest,
            self.config.min_plausible_size_bytes,
        )
        .await?;

        info!(
            dest = %dest.display(),
            size_mb = format!("{:.1}", size_bytes as f64 / (1024.0 * 1024.0)),
            "heavyweight download verified"
        );
        Ok(DownloadOutcome { size_bytes })
    }
}
