//! Remote size probing and method classification
//!
//! The probe issues lightweight HEAD requests across an ordered list of
//! candidate access URLs for a resource and reports the first definite
//! positive size. It never fails outright: URLs it cannot interpret, network
//! errors, and exhausted candidates all collapse to a conservative
//! "unknown, assume large" estimate that biases the pipeline toward the
//! heavyweight method.
//!
//! Candidates are probed with a plain ordered loop and early return; the
//! deterministic first-listed-first-tried order is intentional, no
//! speculative racing.

use crate::config::PipelineConfig;
use crate::resource_key::extract_file_id;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Size and type estimate for a remote resource
///
/// `size_mb == 0.0` means unknown, not empty; unknown is treated as the
/// conservative case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub size_mb: f64,
    pub content_type: Option<String>,
    pub probed_url: String,
    pub is_large: bool,
    pub needs_heavyweight: bool,
}

impl SizeEstimate {
    /// Conservative default for anything that could not be probed
    fn conservative(url: &str) -> Self {
        Self {
            size_mb: 0.0,
            content_type: None,
            probed_url: url.to_string(),
            is_large: false,
            needs_heavyweight: true,
        }
    }
}

/// Classify a probed size and content type against the method thresholds
///
/// Returns `(is_large, needs_heavyweight)`. A file over the lower threshold
/// is not routed to the heavyweight path unless it also exceeds the upper
/// threshold or its type looks like video; this guards against mislabeled
/// HTML error pages that report a nontrivial length. An unknown size assumes
/// the worst.
pub fn classify_size(
    size_mb: f64,
    content_type: Option<&str>,
    config: &PipelineConfig,
) -> (bool, bool) {
    if size_mb <= 0.0 {
        return (false, true);
    }

    let is_large = size_mb > config.large_threshold_mb;
    let is_video = content_type
        .map(|t| t.trim().to_ascii_lowercase().starts_with("video/"))
        .unwrap_or(false);
    let needs_heavyweight = size_mb > config.heavyweight_threshold_mb || (is_large && is_video);

    (is_large, needs_heavyweight)
}

/// Probing seam for the orchestrator, so pipeline decisions are testable
/// without a network
#[async_trait]
pub trait SizeProber: Send + Sync {
    /// Estimate the size and content type of the resource behind `url`
    async fn estimate(&self, url: &str) -> SizeEstimate;
}

/// Lightweight metadata prober for remote resources
pub struct SizeProbe {
    client: reqwest::Client,
    config: Arc<PipelineConfig>,
}

impl SizeProbe {
    /// Create a probe with the pipeline's HTTP settings
    pub fn new(config: Arc<PipelineConfig>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client, config })
    }

    /// Estimate the size and content type of the resource behind `url`
    ///
    /// Never fails; total probe failure returns the conservative estimate.
    pub async fn estimate(&self, url: &str) -> SizeEstimate {
        let Some(file_id) = extract_file_id(url) else {
            debug!(url = %url, "no share-link shape matched, returning conservative estimate");
            return SizeEstimate::conservative(url);
        };

        for candidate in candidate_urls(&file_id) {
            match self.probe_candidate(&candidate).await {
                Some((size_mb, content_type)) => {
                    let (is_large, needs_heavyweight) =
                        classify_size(size_mb, content_type.as_deref(), &self.config);
                    info!(
                        url = %candidate,
                        size_mb = format!("{:.1}", size_mb),
                        content_type = content_type.as_deref().unwrap_or("unknown"),
                        is_large,
                        needs_heavyweight,
                        "size probe succeeded"
                    );
                    return SizeEstimate {
                        size_mb,
                        content_type,
                        probed_url: candidate,
                        is_large,
                        needs_heavyweight,
                    };
                },
                None => continue,
            }
        }

        warn!(url = %url, "all probe candidates exhausted, assuming large");
        SizeEstimate::conservative(url)
    }

    /// Probe a single candidate URL
    ///
    /// Returns the size in MB and content type when the response carries a
    /// definite positive content length.
    pub async fn probe_candidate(&self, url: &str) -> Option<(f64, Option<String>)> {
        let response = match self.client.head(url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %url, error = %e, "probe request failed");
                return None;
            },
        };

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "probe returned non-success");
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(';').next().unwrap_or(s).trim().to_string());

        match response.content_length() {
            Some(len) if len > 0 => Some((len as f64 / (1024.0 * 1024.0), content_type)),
            _ => {
                debug!(url = %url, "probe response carried no definite length");
                None
            },
        }
    }
}

#[async_trait]
impl SizeProber for SizeProbe {
    async fn estimate(&self, url: &str) -> SizeEstimate {
        SizeProbe::estimate(self, url).await
    }
}

/// Ordered candidate access URLs for a share-link file identifier
///
/// Different host endpoints serve the same resource with varying
/// reliability; the export endpoints usually answer with a real length while
/// the viewer page serves HTML.
pub fn candidate_urls(file_id: &str) -> Vec<String> {
    vec![
        format!(
            "https://drive.google.com/uc?export=download&id={}&confirm=t",
            file_id
        ),
        format!("https://drive.google.com/uc?export=download&id={}", file_id),
        format!("https://docs.google.com/uc?export=download&id={}", file_id),
    ]
}
