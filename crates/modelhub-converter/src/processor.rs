//! Conversion processor: pipeline orchestration with timeout, cancellation,
//! guaranteed scratch cleanup, and metrics collection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConverterConfig, TintFailurePolicy};
use crate::discovery;
use crate::error::ConversionError;
use crate::executor::ConverterExecutor;
use crate::filesystem::{FsUtils, ScratchGuard};
use crate::metrics::{ConversionMetrics, MetricsSnapshot};
use crate::models::{
    ArtifactKind, ConversionOutcome, ConversionRequest, ConverterOutput, TintOutcome,
};
use crate::repackage;
use crate::tint::{ColorApplier, MaterialTint};

/// The FBX → GLB conversion processor.
///
/// Cheap to clone; clones share the concurrency limit and metrics.
#[derive(Clone)]
pub struct ConversionProcessor {
    /// Parent of all scratch directories.
    scratch_root: PathBuf,
    /// Converter configuration.
    config: ConverterConfig,
    /// Launches FBX2glTF.
    executor: ConverterExecutor,
    /// Post-processes material colors.
    applier: Arc<dyn ColorApplier>,
    /// Global limit on concurrently running conversions.
    global_limiter: Arc<Semaphore>,
    /// Metrics collector.
    metrics: Arc<ConversionMetrics>,
}

impl fmt::Debug for ConversionProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionProcessor")
            .field("scratch_root", &self.scratch_root)
            .field("config", &self.config)
            .field("available_slots", &self.global_limiter.available_permits())
            .finish_non_exhaustive()
    }
}

impl ConversionProcessor {
    /// Create a processor using the default material tint.
    pub fn new(config: ConverterConfig, scratch_root: PathBuf) -> Result<Self, ConversionError> {
        Self::with_color_applier(config, scratch_root, Arc::new(MaterialTint))
    }

    /// Create a processor with a custom color applier.
    pub fn with_color_applier(
        config: ConverterConfig,
        scratch_root: PathBuf,
        applier: Arc<dyn ColorApplier>,
    ) -> Result<Self, ConversionError> {
        std::fs::create_dir_all(&scratch_root)?;

        Ok(Self {
            executor: ConverterExecutor::from_config(&config),
            global_limiter: Arc::new(Semaphore::new(config.max_concurrent_conversions)),
            metrics: Arc::new(ConversionMetrics::new()),
            applier,
            config,
            scratch_root,
        })
    }

    /// Convert one FBX file into `<output_dir>/<stem>.glb`.
    ///
    /// Scratch directories are removed on every path once created,
    /// including errors, timeouts and cancellation.
    #[instrument(
        skip_all,
        fields(
            request_id = %request.request_id,
            source = %request.source_path.display()
        )
    )]
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        cancel: CancellationToken,
    ) -> Result<ConversionOutcome, ConversionError> {
        self.metrics.record_started();
        let start = Instant::now();

        let result = self.run_pipeline(request, &cancel, start).await;

        match &result {
            Ok(outcome) => {
                self.metrics.record_success(
                    start.elapsed(),
                    outcome.output_bytes,
                    outcome.artifact == ArtifactKind::GltfBin,
                );
                self.metrics.record_tint(&outcome.tint);
                info!(
                    glb = %outcome.glb_path.display(),
                    artifact = %outcome.artifact,
                    tint = %outcome.tint,
                    warnings = outcome.warnings.len(),
                    duration_ms = outcome.duration_ms,
                    "Conversion completed"
                );
            }
            Err(ConversionError::ConverterTimeout { .. }) => self.metrics.record_timeout(),
            Err(ConversionError::Cancelled) => self.metrics.record_cancelled(),
            Err(e) => {
                self.metrics.record_failure();
                error!(stage = e.stage(), error = %e, "Conversion failed");
            }
        }

        result
    }

    /// Convert several files concurrently, bounded by the global limit.
    ///
    /// Results are returned in request order; one failure does not affect
    /// the others.
    pub async fn convert_batch(
        &self,
        requests: Vec<ConversionRequest>,
        cancel: CancellationToken,
    ) -> Vec<Result<ConversionOutcome, ConversionError>> {
        let tasks = requests.into_iter().map(|request| {
            let processor = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { processor.convert(&request, cancel).await })
        });

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.map_err(ConversionError::from).and_then(|r| r))
            .collect()
    }

    /// Validation, workspace setup, and the cleanup guarantee.
    async fn run_pipeline(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
        start: Instant,
    ) -> Result<ConversionOutcome, ConversionError> {
        let final_path = self.validate_request(request).await?;

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConversionError::Cancelled),
            permit = self.global_limiter.acquire() => {
                permit.map_err(|_| ConversionError::SemaphoreClosed {
                    reason: "global conversion semaphore".to_string(),
                })?
            }
        };

        FsUtils::ensure_output_dirs(&request.output_dir).await?;

        let scratch_dir = self.scratch_root.join(FsUtils::scratch_dir_name());
        let guard = ScratchGuard::new([
            scratch_dir.clone(),
            discovery::output_dir_for(&scratch_dir),
        ]);
        tokio::fs::create_dir_all(&scratch_dir).await?;
        debug!(scratch_dir = %scratch_dir.display(), "Created scratch directory");

        let result = self
            .run_in_workspace(request, &scratch_dir, &final_path, cancel, start)
            .await;

        guard.cleanup().await;

        result
    }

    /// Source, naming and tool checks. Returns the final GLB path.
    async fn validate_request(
        &self,
        request: &ConversionRequest,
    ) -> Result<PathBuf, ConversionError> {
        let is_file = tokio::fs::metadata(&request.source_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ConversionError::SourceNotFound {
                path: request.source_path.clone(),
            });
        }

        let final_path = FsUtils::final_glb_path(&request.source_path, &request.output_dir)?;

        if !tokio::fs::try_exists(self.executor.program())
            .await
            .unwrap_or(false)
        {
            return Err(ConversionError::ToolMissing {
                path: self.executor.program().to_path_buf(),
            });
        }

        Ok(final_path)
    }

    /// Convert, discover, normalize, tint.
    async fn run_in_workspace(
        &self,
        request: &ConversionRequest,
        scratch_dir: &Path,
        final_path: &Path,
        cancel: &CancellationToken,
        start: Instant,
    ) -> Result<ConversionOutcome, ConversionError> {
        let report = self
            .executor
            .run(&request.source_path, scratch_dir, cancel)
            .await?;
        let mut warnings = report.warnings;

        if cancel.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }

        let discovered = discovery::discover(scratch_dir).await?;
        if discovered.degraded {
            warnings.push(format!(
                "Converter output found in {} instead of {}",
                scratch_dir.display(),
                discovery::output_dir_for(scratch_dir).display()
            ));
        }

        let artifact = self
            .normalize(&discovered.output, scratch_dir, final_path)
            .await?;

        let (tint, output_bytes) = match self.finish(request, final_path, &mut warnings).await {
            Ok(done) => done,
            Err(e) => {
                FsUtils::remove_file_best_effort(final_path).await;
                return Err(e);
            }
        };

        Ok(ConversionOutcome {
            request_id: request.request_id,
            glb_path: final_path.to_path_buf(),
            artifact,
            tint,
            warnings,
            converter_exit_code: report.exit_code,
            output_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        })
    }

    /// Size check and tint on the final GLB. Returns the tint outcome and the
    /// final size. The caller removes the GLB on error.
    async fn finish(
        &self,
        request: &ConversionRequest,
        final_path: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<(TintOutcome, u64), ConversionError> {
        let size = FsUtils::file_size(final_path).await?;
        if size < self.config.min_output_bytes {
            return Err(ConversionError::OutputTooSmall {
                path: final_path.to_path_buf(),
                size,
            });
        }

        let tint = self.apply_tint(request, final_path, warnings).await?;
        Ok((tint, FsUtils::file_size(final_path).await?))
    }

    /// Produce the final GLB from whatever the converter left behind.
    async fn normalize(
        &self,
        output: &ConverterOutput,
        scratch_dir: &Path,
        final_path: &Path,
    ) -> Result<ArtifactKind, ConversionError> {
        match output {
            ConverterOutput::Glb(path) => {
                FsUtils::copy_atomic(path, final_path)
                    .await
                    .map_err(|source| ConversionError::Copy {
                        from: path.clone(),
                        to: final_path.to_path_buf(),
                        source,
                    })?;
                debug!(from = %path.display(), to = %final_path.display(), "Copied GLB");
                Ok(ArtifactKind::Glb)
            }
            ConverterOutput::GltfBin(path) => {
                repackage::repackage(path, final_path).await?;
                Ok(ArtifactKind::GltfBin)
            }
            ConverterOutput::NotFound => Err(ConversionError::NoOutputProduced {
                scratch_dir: scratch_dir.to_path_buf(),
            }),
        }
    }

    /// Run the color applier and classify its failure.
    async fn apply_tint(
        &self,
        request: &ConversionRequest,
        final_path: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<TintOutcome, ConversionError> {
        let Some(tint) = request.effective_tint() else {
            return Ok(TintOutcome::NotRequested);
        };

        let err = match self.applier.apply_tint(final_path, tint).await {
            Ok(()) => return Ok(TintOutcome::Applied),
            Err(e) => e,
        };
        let reason = err.to_string();

        if err.is_format_related() {
            warn!(
                glb = %final_path.display(),
                error = %reason,
                "Could not read GLB for tinting, returning untinted model"
            );
            warnings.push(format!("Tint skipped: {reason}"));
            return Ok(TintOutcome::SkippedUnreadable { reason });
        }

        match self.config.tint_failure_policy {
            TintFailurePolicy::Lenient => {
                error!(
                    glb = %final_path.display(),
                    error = %reason,
                    "Tint failed, returning untinted model"
                );
                warnings.push(format!("Tint failed: {reason}"));
                Ok(TintOutcome::Failed { reason })
            }
            TintFailurePolicy::Strict => Err(ConversionError::TintFailed {
                path: final_path.to_path_buf(),
                reason,
            }),
        }
    }

    /// Converter configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Parent directory of scratch workspaces.
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Free conversion slots.
    pub fn available_slots(&self) -> usize {
        self.global_limiter.available_permits()
    }

    /// Metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
