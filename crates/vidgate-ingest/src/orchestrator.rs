//! Ingestion orchestration
//!
//! Composes the pipeline services into a single attempt lifecycle:
//! derive key, acquire the per-resource lock, probe, admission-check against
//! disk headroom, select a method, download with one method-level fallback,
//! and release the lock on every exit path.
//!
//! The lock is taken before the admission check so that only one attempt per
//! resource key consumes disk-safety headroom at a time. A rejected
//! acquisition or a denied admission is surfaced immediately and distinctly
//! from transfer failures; they mean "not attempted", not "attempted and
//! failed".

use crate::config::PipelineConfig;
use crate::disk::{scratch_file_name, DfStats, DiskGuard};
use crate::download::{
    HeavyweightDownloader, IngestMethod, MediaDownloader, StreamDownloader,
};
use crate::error::{IngestError, Result};
use crate::lock::ResourceLock;
use crate::probe::{SizeEstimate, SizeProbe, SizeProber};
use crate::resource_key::ResourceKey;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Method reported in a terminal ingestion result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodUsed {
    Stream,
    Heavyweight,
    Failed,
}

impl From<IngestMethod> for MethodUsed {
    fn from(method: IngestMethod) -> Self {
        match method {
            IngestMethod::Stream => MethodUsed::Stream,
            IngestMethod::Heavyweight => MethodUsed::Heavyweight,
        }
    }
}

/// Successful ingestion, as typed data
#[derive(Debug, Clone)]
pub struct Ingested {
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub method: IngestMethod,
}

/// Terminal value returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub file_size_bytes: Option<u64>,
    pub method_used: MethodUsed,
    pub error: Option<String>,
}

impl IngestionResult {
    fn from_run(outcome: &Result<Ingested>) -> Self {
        match outcome {
            Ok(ingested) => Self {
                success: true,
                file_path: Some(ingested.file_path.clone()),
                file_size_bytes: Some(ingested.size_bytes),
                method_used: ingested.method.into(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                file_path: None,
                file_size_bytes: None,
                method_used: MethodUsed::Failed,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Releases the resource lock when the attempt body is done, whatever the
/// exit path
struct LockGuard {
    lock: ResourceLock,
    key: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.lock.release(&self.key);
    }
}

/// The adaptive ingestion pipeline
pub struct IngestionOrchestrator {
    config: Arc<PipelineConfig>,
    lock: ResourceLock,
    disk: Arc<DiskGuard>,
    probe: Arc<dyn SizeProber>,
    stream: Arc<dyn MediaDownloader>,
    heavyweight: Arc<dyn MediaDownloader>,
}

impl IngestionOrchestrator {
    /// Create an orchestrator with production collaborators
    pub fn new(config: PipelineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let lock = ResourceLock::new(Duration::from_secs(config.lock_ttl_secs));
        let disk = Arc::new(DiskGuard::new(Arc::new(DfStats), Arc::clone(&config)));
        let probe: Arc<dyn SizeProber> = Arc::new(SizeProbe::new(Arc::clone(&config))?);
        let stream: Arc<dyn MediaDownloader> =
            Arc::new(StreamDownloader::new(Arc::clone(&config))?);
        let heavyweight: Arc<dyn MediaDownloader> =
            Arc::new(HeavyweightDownloader::new(Arc::clone(&config)));
        Ok(Self {
            config,
            lock,
            disk,
            probe,
            stream,
            heavyweight,
        })
    }

    /// Create an orchestrator with injected collaborators
    pub fn with_parts(
        config: Arc<PipelineConfig>,
        lock: ResourceLock,
        disk: Arc<DiskGuard>,
        probe: Arc<dyn SizeProber>,
        stream: Arc<dyn MediaDownloader>,
        heavyweight: Arc<dyn MediaDownloader>,
    ) -> Self {
        Self {
            config,
            lock,
            disk,
            probe,
            stream,
            heavyweight,
        }
    }

    /// The lock service, for the operational surface
    pub fn lock(&self) -> &ResourceLock {
        &self.lock
    }

    /// The disk guard, for health checks and the monitor loop
    pub fn disk(&self) -> &Arc<DiskGuard> {
        &self.disk
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest the resource behind `url`, returning the terminal result value
    pub async fn ingest(&self, url: &str, dest: Option<PathBuf>) -> IngestionResult {
        let outcome = self.run(url, dest).await;
        if let Err(e) = &outcome {
            if e.is_rejection() {
                info!(url = %url, reason = %e, "ingestion rejected");
            } else {
                warn!(url = %url, error = %e, "ingestion failed");
            }
        }
        IngestionResult::from_run(&outcome)
    }

    /// Ingest the resource behind `url`, with typed failures
    pub async fn run(&self, url: &str, dest: Option<PathBuf>) -> Result<Ingested> {
        let key = ResourceKey::derive(url);

        if !self.lock.acquire(key.as_str()) {
            return Err(IngestError::LockContention {
                key: key.as_str().to_string(),
            });
        }
        let _guard = LockGuard {
            lock: self.lock.clone(),
            key: key.as_str().to_string(),
        };

        self.run_locked(url, &key, dest).await
    }

    /// Probe-only advisory: which method would be chosen for `url`
    ///
    /// Acquires no locks and touches no disk.
    pub async fn recommended_method(&self, url: &str) -> IngestMethod {
        let estimate = self.probe.estimate(url).await;
        Self::select_method(&estimate)
    }

    fn select_method(estimate: &SizeEstimate) -> IngestMethod {
        if estimate.needs_heavyweight {
            IngestMethod::Heavyweight
        } else {
            IngestMethod::Stream
        }
    }

    async fn run_locked(
        &self,
        url: &str,
        key: &ResourceKey,
        dest: Option<PathBuf>,
    ) -> Result<Ingested> {
        let estimate = self.probe.estimate(url).await;

        let admission = self.disk.is_safe_for_operation(estimate.size_mb).await?;
        if !admission.safe {
            return Err(IngestError::AdmissionDenied {
                reason: admission
                    .reason
                    .unwrap_or_else(|| "disk admission refused".to_string()),
            });
        }

        let method = Self::select_method(&estimate);
        info!(
            key = %key,
            method = %method,
            size_mb = format!("{:.1}", estimate.size_mb),
            "method selected"
        );

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        let dest = dest
            .unwrap_or_else(|| self.config.scratch_dir.join(scratch_file_name(key.as_str())));

        let primary_url = self.url_for(method, url, &estimate);
        match self
            .downloader(method)
            .download(&primary_url, &dest)
            .await
        {
            Ok(outcome) => Ok(Ingested {
                file_path: dest,
                size_bytes: outcome.size_bytes,
                method,
            }),
            Err(first_error) => {
                let fallback = method.fallback();
                warn!(
                    key = %key,
                    failed_method = %method,
                    fallback_method = %fallback,
                    error = %first_error,
                    "download failed, attempting fallback method"
                );

                let fallback_url = self.url_for(fallback, url, &estimate);
                match self
                    .downloader(fallback)
                    .download(&fallback_url, &dest)
                    .await
                {
                    Ok(outcome) => Ok(Ingested {
                        file_path: dest,
                        size_bytes: outcome.size_bytes,
                        method: fallback,
                    }),
                    Err(second_error) => {
                        let (stream_error, heavyweight_error) = match method {
                            IngestMethod::Stream => {
                                (failure_reason(&first_error), failure_reason(&second_error))
                            },
                            IngestMethod::Heavyweight => {
                                (failure_reason(&second_error), failure_reason(&first_error))
                            },
                        };
                        Err(IngestError::AllMethodsExhausted {
                            stream_error,
                            heavyweight_error,
                        })
                    },
                }
            },
        }
    }

    fn downloader(&self, method: IngestMethod) -> &Arc<dyn MediaDownloader> {
        match method {
            IngestMethod::Stream => &self.stream,
            IngestMethod::Heavyweight => &self.heavyweight,
        }
    }

    /// Resolve the URL each method should fetch
    ///
    /// The stream method wants the direct-download endpoint the probe
    /// confirmed; the heavyweight tool resolves share links itself and gets
    /// the original.
    fn url_for(&self, method: IngestMethod, original: &str, estimate: &SizeEstimate) -> String {
        match method {
            IngestMethod::Stream if estimate.size_mb > 0.0 => estimate.probed_url.clone(),
            _ => original.to_string(),
        }
    }
}

fn failure_reason(error: &IngestError) -> String {
    match error {
        IngestError::TransferFailed { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{FilesystemStats, VolumeStats};
    use crate::download::DownloadOutcome;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeStats {
        free_mb: f64,
    }

    #[async_trait]
    impl FilesystemStats for FakeStats {
        async fn stats(&self, _path: &Path) -> anyhow::Result<VolumeStats> {
            Ok(VolumeStats {
                total_mb: 200_000.0,
                used_mb: 200_000.0 - self.free_mb,
                free_mb: self.free_mb,
            })
        }
    }

    struct FailingStats;

    #[async_trait]
    impl FilesystemStats for FailingStats {
        async fn stats(&self, _path: &Path) -> anyhow::Result<VolumeStats> {
            Err(anyhow::anyhow!("df unavailable"))
        }
    }

    struct FakeProbe {
        estimate: SizeEstimate,
    }

    #[async_trait]
    impl SizeProber for FakeProbe {
        async fn estimate(&self, _url: &str) -> SizeEstimate {
            self.estimate.clone()
        }
    }

    struct FakeDownloader {
        method: IngestMethod,
        succeed: bool,
        calls: AtomicUsize,
    }

    impl FakeDownloader {
        fn new(method: IngestMethod, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                method,
                succeed,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaDownloader for FakeDownloader {
        async fn download(&self, _url: &str, dest: &Path) -> Result<DownloadOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                let body = vec![0u8; 2 * 1024 * 1024];
                tokio::fs::write(dest, &body).await?;
                Ok(DownloadOutcome {
                    size_bytes: body.len() as u64,
                })
            } else {
                Err(IngestError::TransferFailed {
                    method: self.method,
                    reason: format!("{} simulated failure", self.method),
                })
            }
        }
    }

    fn estimate(size_mb: f64, content_type: Option<&str>) -> SizeEstimate {
        let config = PipelineConfig::default();
        let (is_large, needs_heavyweight) =
            crate::probe::classify_size(size_mb, content_type, &config);
        SizeEstimate {
            size_mb,
            content_type: content_type.map(str::to_string),
            probed_url: "https://resolved.example/direct".to_string(),
            is_large,
            needs_heavyweight,
        }
    }

    struct Fixture {
        orchestrator: IngestionOrchestrator,
        stream: Arc<FakeDownloader>,
        heavyweight: Arc<FakeDownloader>,
        _scratch: tempfile::TempDir,
    }

    fn fixture(
        estimate: SizeEstimate,
        free_mb: f64,
        stream_ok: bool,
        heavyweight_ok: bool,
    ) -> Fixture {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.scratch_dir = scratch.path().to_path_buf();
        let config = Arc::new(config);

        let stream = FakeDownloader::new(IngestMethod::Stream, stream_ok);
        let heavyweight = FakeDownloader::new(IngestMethod::Heavyweight, heavyweight_ok);
        let orchestrator = IngestionOrchestrator::with_parts(
            Arc::clone(&config),
            ResourceLock::new(Duration::from_secs(1800)),
            Arc::new(DiskGuard::new(Arc::new(FakeStats { free_mb }), config)),
            Arc::new(FakeProbe { estimate }),
            stream.clone(),
            heavyweight.clone(),
        );

        Fixture {
            orchestrator,
            stream,
            heavyweight,
            _scratch: scratch,
        }
    }

    const URL: &str = "https://drive.google.com/file/d/1aBcDeFgHiJkLmNoPqRsT/view";

    #[tokio::test]
    async fn test_small_file_uses_stream() {
        let fx = fixture(estimate(10.0, Some("video/mp4")), 100_000.0, true, true);
        let result = fx.orchestrator.ingest(URL, None).await;

        assert!(result.success);
        assert_eq!(result.method_used, MethodUsed::Stream);
        assert_eq!(fx.stream.call_count(), 1);
        assert_eq!(fx.heavyweight.call_count(), 0);

        let path = result.file_path.unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("vg-"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_unknown_size_goes_heavyweight_first() {
        let fx = fixture(estimate(0.0, None), 100_000.0, true, true);
        let result = fx.orchestrator.ingest(URL, None).await;

        assert!(result.success);
        assert_eq!(result.method_used, MethodUsed::Heavyweight);
        assert_eq!(fx.stream.call_count(), 0);
        assert_eq!(fx.heavyweight.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_failure_falls_back_to_heavyweight() {
        let fx = fixture(estimate(10.0, Some("video/mp4")), 100_000.0, false, true);
        let result = fx.orchestrator.ingest(URL, None).await;

        assert!(result.success);
        assert_eq!(result.method_used, MethodUsed::Heavyweight);
        assert_eq!(fx.stream.call_count(), 1);
        assert_eq!(fx.heavyweight.call_count(), 1);
    }

    #[tokio::test]
    async fn test_both_methods_fail_exhausts_and_releases_lock() {
        let fx = fixture(estimate(10.0, Some("video/mp4")), 100_000.0, false, false);
        let outcome = fx.orchestrator.run(URL, None).await;

        match outcome {
            Err(IngestError::AllMethodsExhausted {
                stream_error,
                heavyweight_error,
            }) => {
                assert!(stream_error.contains("stream simulated failure"));
                assert!(heavyweight_error.contains("heavyweight simulated failure"));
            },
            other => panic!("unexpected outcome: {:?}", other),
        }

        // Exactly one fallback attempt, then give up
        assert_eq!(fx.stream.call_count(), 1);
        assert_eq!(fx.heavyweight.call_count(), 1);

        // Lock released on the failure path
        let key = ResourceKey::derive(URL);
        assert!(!fx.orchestrator.lock().is_locked(key.as_str()));
        assert!(fx.orchestrator.lock().acquire(key.as_str()));
    }

    #[tokio::test]
    async fn test_lock_contention_rejected_without_downloading() {
        let fx = fixture(estimate(10.0, Some("video/mp4")), 100_000.0, true, true);
        let key = ResourceKey::derive(URL);
        assert!(fx.orchestrator.lock().acquire(key.as_str()));

        let outcome = fx.orchestrator.run(URL, None).await;
        match outcome {
            Err(IngestError::LockContention { key: contended }) => {
                assert_eq!(contended, key.as_str());
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fx.stream.call_count(), 0);
        assert_eq!(fx.heavyweight.call_count(), 0);

        // The pre-existing holder keeps the lock
        assert!(fx.orchestrator.lock().is_locked(key.as_str()));
    }

    #[tokio::test]
    async fn test_admission_denied_releases_lock() {
        // 300 MB free on a 200 GB volume is far past the critical threshold
        let fx = fixture(estimate(10.0, Some("video/mp4")), 300.0, true, true);
        let outcome = fx.orchestrator.run(URL, None).await;

        assert!(matches!(outcome, Err(IngestError::AdmissionDenied { .. })));
        assert_eq!(fx.stream.call_count(), 0);

        let key = ResourceKey::derive(URL);
        assert!(!fx.orchestrator.lock().is_locked(key.as_str()));
    }

    #[tokio::test]
    async fn test_unavailable_disk_stats_rejects_and_releases_lock() {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.scratch_dir = scratch.path().to_path_buf();
        let config = Arc::new(config);

        let stream = FakeDownloader::new(IngestMethod::Stream, true);
        let heavyweight = FakeDownloader::new(IngestMethod::Heavyweight, true);
        let orchestrator = IngestionOrchestrator::with_parts(
            Arc::clone(&config),
            ResourceLock::new(Duration::from_secs(1800)),
            Arc::new(DiskGuard::new(Arc::new(FailingStats), config)),
            Arc::new(FakeProbe {
                estimate: estimate(10.0, Some("video/mp4")),
            }),
            stream.clone(),
            heavyweight.clone(),
        );

        let err = orchestrator.run(URL, None).await.unwrap_err();
        assert!(err.is_rejection());
        assert!(matches!(err, IngestError::DiskUnavailable));
        assert_eq!(stream.call_count(), 0);
        assert_eq!(heavyweight.call_count(), 0);

        let key = ResourceKey::derive(URL);
        assert!(!orchestrator.lock().is_locked(key.as_str()));
    }

    #[tokio::test]
    async fn test_explicit_destination_is_honored() {
        let fx = fixture(estimate(10.0, Some("video/mp4")), 100_000.0, true, true);
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("chosen.mp4");

        let result = fx.orchestrator.ingest(URL, Some(dest.clone())).await;
        assert!(result.success);
        assert_eq!(result.file_path.unwrap(), dest);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_recommended_method_is_advisory_only() {
        let fx = fixture(estimate(0.0, None), 100_000.0, true, true);
        let method = fx.orchestrator.recommended_method(URL).await;
        assert_eq!(method, IngestMethod::Heavyweight);

        // No lock taken, no download attempted
        let key = ResourceKey::derive(URL);
        assert!(!fx.orchestrator.lock().is_locked(key.as_str()));
        assert_eq!(fx.heavyweight.call_count(), 0);
    }

    #[tokio::test]
    async fn test_recommended_method_stream_for_small() {
        let fx = fixture(estimate(10.0, Some("video/mp4")), 100_000.0, true, true);
        assert_eq!(
            fx.orchestrator.recommended_method(URL).await,
            IngestMethod::Stream
        );
    }
}
