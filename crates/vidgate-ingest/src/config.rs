//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Size above which a file is considered "large" (MB).
pub const DEFAULT_LARGE_THRESHOLD_MB: f64 = 50.0;

/// Size above which the heavyweight method is always selected (MB).
pub const DEFAULT_HEAVYWEIGHT_THRESHOLD_MB: f64 = 100.0;

/// Per-candidate timeout for size probes (seconds).
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 15;

/// Connect/initial-response timeout for stream downloads (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;

/// Maximum redirect hops followed by the HTTP client.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Lock TTL before forced auto-release (seconds, 30 minutes).
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30 * 60;

/// Minimum plausible size for a downloaded media file (bytes, 1 MB).
/// Anything smaller is treated as an HTML interstitial saved as the body.
pub const DEFAULT_MIN_PLAUSIBLE_SIZE_BYTES: u64 = 1024 * 1024;

/// Fixed headroom margin added to admission checks (MB).
pub const DEFAULT_HEADROOM_MARGIN_MB: f64 = 500.0;

/// Disk monitor sampling interval (seconds).
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 300;

/// Age after which scratch files are eligible for cleanup (seconds).
pub const DEFAULT_TEMP_MAX_AGE_SECS: u64 = 60 * 60;

/// Overall timeout for a heavyweight subprocess download (seconds).
pub const DEFAULT_HEAVYWEIGHT_TIMEOUT_SECS: u64 = 60 * 60;

/// Fixed User-Agent presented to remote hosts.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Default heavyweight downloader binary.
pub const DEFAULT_YTDLP_BINARY: &str = "yt-dlp";

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Scratch directory for downloaded artifacts
    pub scratch_dir: PathBuf,
    /// Size above which a file counts as large (MB)
    pub large_threshold_mb: f64,
    /// Size above which the heavyweight method is mandatory (MB)
    pub heavyweight_threshold_mb: f64,
    /// Per-candidate probe timeout (seconds)
    pub probe_timeout_secs: u64,
    /// Connect/initial-response timeout for downloads (seconds)
    pub connect_timeout_secs: u64,
    /// Redirect hop cap for the HTTP client
    pub max_redirects: usize,
    /// Lock TTL before forced auto-release (seconds)
    pub lock_ttl_secs: u64,
    /// Minimum plausible downloaded file size (bytes)
    pub min_plausible_size_bytes: u64,
    /// Fixed admission headroom margin (MB)
    pub headroom_margin_mb: f64,
    /// Disk monitor sampling interval (seconds)
    pub monitor_interval_secs: u64,
    /// Scratch file age before cleanup eligibility (seconds)
    pub temp_max_age_secs: u64,
    /// Overall timeout for heavyweight subprocess downloads (seconds)
    pub heavyweight_timeout_secs: u64,
    /// User-Agent header for all outbound requests
    pub user_agent: String,
    /// Heavyweight downloader binary name or path
    pub ytdlp_binary: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("vidgate"),
            large_threshold_mb: DEFAULT_LARGE_THRESHOLD_MB,
            heavyweight_threshold_mb: DEFAULT_HEAVYWEIGHT_THRESHOLD_MB,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            min_plausible_size_bytes: DEFAULT_MIN_PLAUSIBLE_SIZE_BYTES,
            headroom_margin_mb: DEFAULT_HEADROOM_MARGIN_MB,
            monitor_interval_secs: DEFAULT_MONITOR_INTERVAL_SECS,
            temp_max_age_secs: DEFAULT_TEMP_MAX_AGE_SECS,
            heavyweight_timeout_secs: DEFAULT_HEAVYWEIGHT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ytdlp_binary: DEFAULT_YTDLP_BINARY.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to defaults
    ///
    /// Recognized variables (all optional):
    /// - `VIDGATE_SCRATCH_DIR`
    /// - `VIDGATE_LARGE_THRESHOLD_MB`
    /// - `VIDGATE_HEAVYWEIGHT_THRESHOLD_MB`
    /// - `VIDGATE_PROBE_TIMEOUT_SECS`
    /// - `VIDGATE_CONNECT_TIMEOUT_SECS`
    /// - `VIDGATE_LOCK_TTL_SECS`
    /// - `VIDGATE_MONITOR_INTERVAL_SECS`
    /// - `VIDGATE_TEMP_MAX_AGE_SECS`
    /// - `VIDGATE_YTDLP_BINARY`
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("VIDGATE_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }
        if let Some(v) = env_parse("VIDGATE_LARGE_THRESHOLD_MB")? {
            config.large_threshold_mb = v;
        }
        if let Some(v) = env_parse("VIDGATE_HEAVYWEIGHT_THRESHOLD_MB")? {
            config.heavyweight_threshold_mb = v;
        }
        if let Some(v) = env_parse("VIDGATE_PROBE_TIMEOUT_SECS")? {
            config.probe_timeout_secs = v;
        }
        if let Some(v) = env_parse("VIDGATE_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout_secs = v;
        }
        if let Some(v) = env_parse("VIDGATE_LOCK_TTL_SECS")? {
            config.lock_ttl_secs = v;
        }
        if let Some(v) = env_parse("VIDGATE_MONITOR_INTERVAL_SECS")? {
            config.monitor_interval_secs = v;
        }
        if let Some(v) = env_parse("VIDGATE_TEMP_MAX_AGE_SECS")? {
            config.temp_max_age_secs = v;
        }
        if let Ok(bin) = std::env::var("VIDGATE_YTDLP_BINARY") {
            config.ytdlp_binary = bin;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.large_threshold_mb <= 0.0 || self.heavyweight_threshold_mb <= 0.0 {
            anyhow::bail!("size thresholds must be positive");
        }
        if self.heavyweight_threshold_mb < self.large_threshold_mb {
            anyhow::bail!(
                "heavyweight threshold ({} MB) must not be below large threshold ({} MB)",
                self.heavyweight_threshold_mb,
                self.large_threshold_mb
            );
        }
        if self.lock_ttl_secs == 0 {
            anyhow::bail!("lock TTL must be nonzero");
        }
        if self.probe_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            anyhow::bail!("timeouts must be nonzero");
        }
        if self.user_agent.is_empty() {
            anyhow::bail!("user agent must not be empty");
        }
        if self.ytdlp_binary.is_empty() {
            anyhow::bail!("heavyweight binary must not be empty");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => {
            let parsed = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e))?;
            Ok(Some(parsed))
        },
        Err(_) => Ok(None),
    }
}
