//! Disk-space admission control and monitoring
//!
//! The disk guard samples filesystem usage on demand, classifies it into
//! alert levels, and gates large ingestion operations. Sampling failures
//! degrade to a synthetic warning rather than an error so the rest of the
//! pipeline keeps functioning, conservatively, when introspection itself
//! fails. Admission decisions fail closed.
//!
//! Scratch cleanup removes only files this pipeline recognizably owns:
//! artifacts under the scratch directory matching the `vg-` naming
//! convention, aged beyond the current operation.

use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ============================================================================
// Alert Thresholds
// ============================================================================

/// Usage percent / free MB at which a warning fires.
pub const WARNING_USAGE_PERCENT: f64 = 80.0;
pub const WARNING_FREE_MB: f64 = 500.0;

/// Usage percent / free MB at which operations are refused.
pub const CRITICAL_USAGE_PERCENT: f64 = 90.0;
pub const CRITICAL_FREE_MB: f64 = 200.0;

/// Usage percent / free MB at which automatic cleanup is forced.
pub const EMERGENCY_USAGE_PERCENT: f64 = 95.0;
pub const EMERGENCY_FREE_MB: f64 = 100.0;

/// Prefix marking scratch files as owned by this pipeline.
pub const SCRATCH_PREFIX: &str = "vg-";

/// Scratch artifact name for a resource key: prefix, key, and a timestamp so
/// concurrent distinct resources never collide and stale files are
/// identifiable by age.
pub fn scratch_file_name(key: &str) -> String {
    format!("{}{}-{}.mp4", SCRATCH_PREFIX, key, Utc::now().timestamp())
}

// ============================================================================
// Capability Interfaces
// ============================================================================

/// Raw volume usage figures, in megabytes
#[derive(Debug, Clone, Copy)]
pub struct VolumeStats {
    pub total_mb: f64,
    pub used_mb: f64,
    pub free_mb: f64,
}

/// Narrow capability interface for filesystem usage queries, so the guard
/// logic is testable against a fake without invoking OS utilities.
#[async_trait]
pub trait FilesystemStats: Send + Sync {
    async fn stats(&self, path: &Path) -> anyhow::Result<VolumeStats>;
}

/// Production stats provider: shells out to `df -kP`
pub struct DfStats;

#[async_trait]
impl FilesystemStats for DfStats {
    async fn stats(&self, path: &Path) -> anyhow::Result<VolumeStats> {
        let output = tokio::process::Command::new("df")
            .arg("-kP")
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!(
                "df exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_df_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse POSIX `df -kP` output (1024-byte blocks)
fn parse_df_output(output: &str) -> anyhow::Result<VolumeStats> {
    let line = output
        .lines()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("df output missing data line"))?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        anyhow::bail!("unexpected df output: {}", line);
    }

    let total_kb: f64 = fields[1].parse()?;
    let used_kb: f64 = fields[2].parse()?;
    let avail_kb: f64 = fields[3].parse()?;

    Ok(VolumeStats {
        total_mb: total_kb / 1024.0,
        used_mb: used_kb / 1024.0,
        free_mb: avail_kb / 1024.0,
    })
}

// ============================================================================
// Snapshot, Levels, Decisions
// ============================================================================

/// Point-in-time disk usage sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiskSnapshot {
    pub total_mb: f64,
    pub used_mb: f64,
    pub free_mb: f64,
    pub usage_percent: f64,
}

impl DiskSnapshot {
    fn from_stats(stats: VolumeStats) -> Self {
        let usage_percent = if stats.total_mb > 0.0 {
            (stats.used_mb / stats.total_mb) * 100.0
        } else {
            0.0
        };
        Self {
            total_mb: stats.total_mb,
            used_mb: stats.used_mb,
            free_mb: stats.free_mb,
            usage_percent,
        }
    }
}

/// Disk usage alert level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[serde(rename = "healthy")]
    None,
    Warning,
    Critical,
    Emergency,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertLevel::None => "healthy",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        };
        write!(f, "{}", s)
    }
}

/// Classified alert with a human-readable message
#[derive(Debug, Clone, Serialize)]
pub struct DiskAlert {
    pub level: AlertLevel,
    pub message: String,
}

/// Admission decision for one operation
#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Admission {
    fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    fn unsafe_because(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of a scratch cleanup pass
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CleanupReport {
    pub files_removed: usize,
    pub space_freed_mb: f64,
}

/// Status snapshot for the external health-check endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: AlertLevel,
    pub disk: Option<DiskSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

/// Classify a snapshot into an alert level; whichever threshold fires first
/// (percent or absolute free space) decides.
pub fn classify(snapshot: &DiskSnapshot) -> AlertLevel {
    if snapshot.usage_percent >= EMERGENCY_USAGE_PERCENT || snapshot.free_mb < EMERGENCY_FREE_MB {
        AlertLevel::Emergency
    } else if snapshot.usage_percent >= CRITICAL_USAGE_PERCENT
        || snapshot.free_mb < CRITICAL_FREE_MB
    {
        AlertLevel::Critical
    } else if snapshot.usage_percent >= WARNING_USAGE_PERCENT || snapshot.free_mb < WARNING_FREE_MB
    {
        AlertLevel::Warning
    } else {
        AlertLevel::None
    }
}

// ============================================================================
// DiskGuard
// ============================================================================

/// Process-wide disk admission and monitoring service
pub struct DiskGuard {
    stats: Arc<dyn FilesystemStats>,
    config: Arc<PipelineConfig>,
}

impl DiskGuard {
    /// Create a guard over the volume hosting the scratch directory
    pub fn new(stats: Arc<dyn FilesystemStats>, config: Arc<PipelineConfig>) -> Self {
        Self { stats, config }
    }

    /// Sample current disk usage
    ///
    /// Returns None when sampling fails; callers decide how to degrade.
    pub async fn snapshot(&self) -> Option<DiskSnapshot> {
        // Sample the volume root if the scratch dir does not exist yet
        let probe_path = if self.config.scratch_dir.exists() {
            self.config.scratch_dir.clone()
        } else {
            self.config
                .scratch_dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("/"))
        };

        match self.stats.stats(&probe_path).await {
            Ok(stats) => Some(DiskSnapshot::from_stats(stats)),
            Err(e) => {
                warn!(error = %e, path = %probe_path.display(), "failed to sample disk usage");
                None
            },
        }
    }

    /// Classify current usage into an alert
    ///
    /// An unavailable sample degrades to a synthetic warning, never an error.
    pub async fn check_level(&self) -> DiskAlert {
        match self.snapshot().await {
            Some(snapshot) => {
                let level = classify(&snapshot);
                let message = match level {
                    AlertLevel::None => format!(
                        "disk usage normal: {:.1}% used, {:.0} MB free",
                        snapshot.usage_percent, snapshot.free_mb
                    ),
                    _ => format!(
                        "disk usage {}: {:.1}% used, {:.0} MB free",
                        level, snapshot.usage_percent, snapshot.free_mb
                    ),
                };
                DiskAlert { level, message }
            },
            None => DiskAlert {
                level: AlertLevel::Warning,
                message: "disk introspection unavailable, proceeding conservatively".to_string(),
            },
        }
    }

    /// Decide whether an operation expected to write `expected_size_mb` is
    /// safe to admit
    ///
    /// Fails closed: an unavailable snapshot is `DiskUnavailable`, and
    /// critical-or-worse usage refuses the operation. Required headroom is
    /// twice the expected size (covering concurrent temp copies) plus a
    /// fixed margin.
    pub async fn is_safe_for_operation(&self, expected_size_mb: f64) -> Result<Admission> {
        let snapshot = match self.snapshot().await {
            Some(s) => s,
            None => return Err(IngestError::DiskUnavailable),
        };

        let level = classify(&snapshot);
        if level >= AlertLevel::Critical {
            return Ok(Admission::unsafe_because(format!(
                "disk usage {} ({:.1}% used, {:.0} MB free)",
                level, snapshot.usage_percent, snapshot.free_mb
            )));
        }

        let required_mb = 2.0 * expected_size_mb.max(0.0) + self.config.headroom_margin_mb;
        if snapshot.free_mb < required_mb {
            return Ok(Admission::unsafe_because(format!(
                "insufficient headroom: {:.0} MB free, {:.0} MB required for a {:.0} MB download",
                snapshot.free_mb, required_mb, expected_size_mb
            )));
        }

        Ok(Admission::safe())
    }

    /// Remove aged scratch files owned by this pipeline
    ///
    /// Only touches files under the scratch directory matching the `vg-`
    /// naming convention and older than the configured age, so an in-progress
    /// write is never collected.
    pub async fn cleanup_temp_files(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        let max_age = Duration::from_secs(self.config.temp_max_age_secs);

        let mut dir = match tokio::fs::read_dir(&self.config.scratch_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                debug!(
                    error = %e,
                    dir = %self.config.scratch_dir.display(),
                    "scratch directory not readable, skipping cleanup"
                );
                return report;
            },
        };

        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(SCRATCH_PREFIX) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|t| t.elapsed().ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            let size = metadata.len();
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    report.files_removed += 1;
                    report.space_freed_mb += size as f64 / (1024.0 * 1024.0);
                    info!(file = %entry.path().display(), "removed stale scratch file");
                },
                Err(e) => {
                    warn!(file = %entry.path().display(), error = %e, "failed to remove scratch file");
                },
            }
        }

        if report.files_removed > 0 {
            info!(
                files = report.files_removed,
                freed_mb = format!("{:.1}", report.space_freed_mb),
                "scratch cleanup complete"
            );
        }
        report
    }

    /// Status snapshot for the health endpoint
    pub async fn health(&self) -> HealthStatus {
        let disk = self.snapshot().await;
        match disk {
            Some(snapshot) => {
                let level = classify(&snapshot);
                let alert = if level > AlertLevel::None {
                    Some(self.check_message(&snapshot, level))
                } else {
                    None
                };
                HealthStatus {
                    status: level,
                    disk: Some(snapshot),
                    alert,
                }
            },
            None => HealthStatus {
                status: AlertLevel::Warning,
                disk: None,
                alert: Some("disk introspection unavailable".to_string()),
            },
        }
    }

    fn check_message(&self, snapshot: &DiskSnapshot, level: AlertLevel) -> String {
        format!(
            "disk usage {}: {:.1}% used, {:.0} MB free",
            level, snapshot.usage_percent, snapshot.free_mb
        )
    }

    /// Fixed-interval monitoring loop
    ///
    /// Crossing critical or emergency triggers an automatic cleanup pass and
    /// an error-level alert consumable by the monitoring surface. Runs until
    /// the owning task is dropped.
    pub async fn monitor_loop(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.monitor_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let alert = self.check_level().await;
            match alert.level {
                AlertLevel::None => {
                    debug!("{}", alert.message);
                },
                AlertLevel::Warning => {
                    warn!("{}", alert.message);
                },
                AlertLevel::Critical | AlertLevel::Emergency => {
                    error!("{}", alert.message);
                    let report = self.cleanup_temp_files().await;
                    info!(
                        files = report.files_removed,
                        freed_mb = format!("{:.1}", report.space_freed_mb),
                        "automatic cleanup pass finished"
                    );
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeStats {
        result: Option<VolumeStats>,
    }

    #[async_trait]
    impl FilesystemStats for FakeStats {
        async fn stats(&self, _path: &Path) -> anyhow::Result<VolumeStats> {
            self.result
                .ok_or_else(|| anyhow::anyhow!("stats unavailable"))
        }
    }

    fn guard_with(stats: Option<VolumeStats>, scratch: &Path) -> DiskGuard {
        let mut config = PipelineConfig::default();
        config.scratch_dir = scratch.to_path_buf();
        DiskGuard::new(
            Arc::new(FakeStats { result: stats }),
            Arc::new(config),
        )
    }

    fn stats(total_mb: f64, used_mb: f64) -> VolumeStats {
        VolumeStats {
            total_mb,
            used_mb,
            free_mb: total_mb - used_mb,
        }
    }

    fn snapshot(usage_percent: f64, free_mb: f64) -> DiskSnapshot {
        DiskSnapshot {
            total_mb: 100_000.0,
            used_mb: 100_000.0 - free_mb,
            free_mb,
            usage_percent,
        }
    }

    #[test]
    fn test_classify_levels() {
        assert_eq!(classify(&snapshot(50.0, 50_000.0)), AlertLevel::None);
        assert_eq!(classify(&snapshot(80.0, 20_000.0)), AlertLevel::Warning);
        assert_eq!(classify(&snapshot(90.0, 10_000.0)), AlertLevel::Critical);
        assert_eq!(classify(&snapshot(95.0, 5_000.0)), AlertLevel::Emergency);
    }

    #[test]
    fn test_classify_boundaries_are_monotonic() {
        // 96% never classifies below critical; 94% never as emergency
        assert!(classify(&snapshot(96.0, 10_000.0)) >= AlertLevel::Critical);
        assert!(classify(&snapshot(94.0, 10_000.0)) < AlertLevel::Emergency);
    }

    #[test]
    fn test_classify_absolute_free_triggers() {
        assert_eq!(classify(&snapshot(10.0, 499.0)), AlertLevel::Warning);
        assert_eq!(classify(&snapshot(10.0, 199.0)), AlertLevel::Critical);
        assert_eq!(classify(&snapshot(10.0, 99.0)), AlertLevel::Emergency);
    }

    #[test]
    fn test_parse_df_output() {
        let output = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                       /dev/sda1  104857600 52428800 52428800  50% /\n";
        let stats = parse_df_output(output).unwrap();
        assert_eq!(stats.total_mb, 102_400.0);
        assert_eq!(stats.used_mb, 51_200.0);
        assert_eq!(stats.free_mb, 51_200.0);
    }

    #[test]
    fn test_parse_df_output_malformed() {
        assert!(parse_df_output("").is_err());
        assert!(parse_df_output("Filesystem\ngarbage").is_err());
    }

    #[tokio::test]
    async fn test_admission_requires_headroom() {
        let tmp = tempfile::tempdir().unwrap();
        // 100 GB volume, ~59% used, 42400 MB free
        let guard = guard_with(Some(stats(102_400.0, 60_000.0)), tmp.path());

        // 2x + 500 = 50500 MB required, only 42400 free
        let admission = guard.is_safe_for_operation(25_000.0).await.unwrap();
        assert!(!admission.safe);
        assert!(admission.reason.unwrap().contains("insufficient headroom"));
    }

    #[tokio::test]
    async fn test_admission_allows_small_operation() {
        let tmp = tempfile::tempdir().unwrap();
        // 50% used, plenty free
        let guard = guard_with(Some(stats(102_400.0, 51_200.0)), tmp.path());
        let admission = guard.is_safe_for_operation(100.0).await.unwrap();
        assert!(admission.safe);
    }

    #[tokio::test]
    async fn test_admission_fails_closed_without_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_with(None, tmp.path());
        let err = guard.is_safe_for_operation(10.0).await.unwrap_err();
        assert!(matches!(err, IngestError::DiskUnavailable));
    }

    #[tokio::test]
    async fn test_admission_refuses_at_critical_usage() {
        let tmp = tempfile::tempdir().unwrap();
        // 92% used but 8 GB free: percent threshold, not headroom, refuses
        let guard = guard_with(Some(stats(102_400.0, 94_208.0)), tmp.path());
        let admission = guard.is_safe_for_operation(1.0).await.unwrap();
        assert!(!admission.safe);
    }

    #[tokio::test]
    async fn test_check_level_degrades_to_warning() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_with(None, tmp.path());
        let alert = guard.check_level().await;
        assert_eq!(alert.level, AlertLevel::Warning);
        assert!(alert.message.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_health_reports_status() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_with(Some(stats(102_400.0, 51_200.0)), tmp.path());
        let health = guard.health().await;
        assert_eq!(health.status, AlertLevel::None);
        assert!(health.disk.is_some());
        assert!(health.alert.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_respects_naming_convention() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.scratch_dir = tmp.path().to_path_buf();
        config.temp_max_age_secs = 0; // everything old enough
        let guard = DiskGuard::new(
            Arc::new(FakeStats {
                result: Some(stats(102_400.0, 51_200.0)),
            }),
            Arc::new(config),
        );

        std::fs::write(tmp.path().join("vg-drive-abc-1700000000.mp4"), vec![0u8; 2048]).unwrap();
        std::fs::write(tmp.path().join("user-data.mp4"), vec![0u8; 2048]).unwrap();

        let report = guard.cleanup_temp_files().await;
        assert_eq!(report.files_removed, 1);
        assert!(!tmp.path().join("vg-drive-abc-1700000000.mp4").exists());
        assert!(tmp.path().join("user-data.mp4").exists());
    }

    #[tokio::test]
    async fn test_cleanup_skips_recent_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.scratch_dir = tmp.path().to_path_buf();
        config.temp_max_age_secs = 3600;
        let guard = DiskGuard::new(
            Arc::new(FakeStats {
                result: Some(stats(102_400.0, 51_200.0)),
            }),
            Arc::new(config),
        );

        std::fs::write(tmp.path().join("vg-drive-new-1700000000.mp4"), vec![0u8; 2048]).unwrap();

        let report = guard.cleanup_temp_files().await;
        assert_eq!(report.files_removed, 0);
        assert!(tmp.path().join("vg-drive-new-1700000000.mp4").exists());
    }

    #[test]
    fn test_scratch_file_name_embeds_key_and_prefix() {
        let name = scratch_file_name("drive-abc");
        assert!(name.starts_with("vg-drive-abc-"));
        assert!(name.ends_with(".mp4"));
    }
}
