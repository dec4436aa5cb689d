//! Direct byte-streamed HTTP download

use super::{remove_partial, verify_download, DownloadOutcome, IngestMethod, MediaDownloader};
use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Streaming HTTP downloader
///
/// Issues a GET with the pipeline's fixed User-Agent, a bounded redirect
/// chain, and a connect/initial-response timeout. The transfer itself is
/// unbounded but tracked through progress logging.
pub struct StreamDownloader {
    client: reqwest::Client,
    config: Arc<PipelineConfig>,
}

impl StreamDownloader {
    pub fn new(config: Arc<PipelineConfig>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    async fn transfer(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transfer_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(transfer_failed(format!("HTTP {}", response.status())));
        }

        let expected = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        let mut last_logged_percent: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transfer_failed(format!("stream error: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| transfer_failed(format!("write error: {}", e)))?;
            written += chunk.len() as u64;

            if let Some(total) = expected {
                if total > 0 {
                    let percent = written * 100 / total;
                    // Log at >= 10-percentage-point increments
                    if percent >= last_logged_percent + 10 {
                        last_logged_percent = percent - percent % 10;
                        info!(
                            url = %url,
                            percent = last_logged_percent,
                            written_mb = format!("{:.1}", written as f64 / (1024.0 * 1024.0)),
                            "download progress"
                        );
                    }
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| transfer_failed(format!("flush error: {}", e)))?;
        debug!(url = %url, bytes = written, "stream transfer finished");
        Ok(())
    }
}

fn transfer_failed(reason: String) -> IngestError {
    IngestError::TransferFailed {
        method: IngestMethod::Stream,
        reason,
    }
}

#[async_trait]
impl MediaDownloader for StreamDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome> {
        info!(url = %url, dest = %dest.display(), "starting stream download");

        if let Err(e) = self.transfer(url, dest).await {
            remove_partial(dest).await;
            return Err(e);
        }

        let size_bytes = verify_download(
            IngestMethod::Stream,
            dest,
            self.config.min_plausible_size_bytes,
        )
        .await?;

        info!(
            dest = %dest.display(),
            size_mb = format!("{:.1}", size_bytes as f64 / (1024.0 * 1024.0)),
            "stream download verified"
        );
        Ok(DownloadOutcome { size_bytes })
    }
}
