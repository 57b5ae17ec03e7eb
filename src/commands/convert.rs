//! `modelhub convert`: run the FBX → GLB pipeline over one or more files.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::output::{self, OutputFormat};
use crate::settings::Settings;
use modelhub_converter::{
    ConversionError, ConversionOutcome, ConversionProcessor, ConversionRequest, Tint,
    TintFailurePolicy,
};
use modelhub_core::error::AppError;

/// Arguments for the convert command
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// FBX files to convert
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output directory (defaults to storage.output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Tint as r,g,b with components in [0, 1]
    #[arg(long, conflicts_with = "color")]
    pub tint: Option<String>,

    /// Tint as a #RRGGBB hex color
    #[arg(long)]
    pub color: Option<String>,

    /// Fail the conversion when the tint cannot be applied
    #[arg(long)]
    pub strict_tint: bool,

    /// Converter timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl ConvertArgs {
    /// The requested tint, if any.
    fn parse_tint(&self) -> Result<Option<Tint>, ConversionError> {
        match (&self.tint, &self.color) {
            (Some(triple), _) => triple.parse().map(Some),
            (None, Some(hex)) => Tint::from_hex(hex).map(Some),
            (None, None) => Ok(None),
        }
    }
}

/// Conversion display row
#[derive(Debug, Serialize, Tabled)]
struct ConversionRow {
    /// Source file
    source: String,
    /// Status
    status: String,
    /// Output GLB
    output: String,
    /// Converter layout
    artifact: String,
    /// Tint result
    tint: String,
    /// Output size
    size: String,
    /// Duration
    duration: String,
}

/// JSON report for one file
#[derive(Debug, Serialize)]
struct ConversionReport {
    source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<ConversionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
}

/// Execute the convert command
pub async fn execute(
    args: &ConvertArgs,
    settings: Settings,
    format: OutputFormat,
) -> Result<(), AppError> {
    let mut config = settings.converter;
    if let Some(timeout) = args.timeout {
        config.timeout_seconds = timeout;
    }
    if args.strict_tint {
        config.tint_failure_policy = TintFailurePolicy::Strict;
    }
    config
        .validate()
        .map_err(|e| AppError::validation(format!("Invalid converter configuration: {}", e)))?;

    let tint = args.parse_tint()?;
    config.resolve_converter_path()?;
    tracing::info!(converter = %config.converter_summary(), "Converter ready");

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| settings.storage.output_dir.clone());
    let processor = ConversionProcessor::new(config, settings.storage.effective_scratch_root())?;

    let requests: Vec<ConversionRequest> = args
        .files
        .iter()
        .map(|file| {
            let request = ConversionRequest::new(file.clone(), output_dir.clone());
            match tint {
                Some(t) => request.with_tint(t),
                None => request,
            }
        })
        .collect();

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling conversions");
            ctrl_c_cancel.cancel();
        }
    });

    let results = processor.convert_batch(requests, cancel).await;
    ctrl_c.abort();

    let total = results.len();
    let mut failures: Vec<ConversionError> = Vec::new();
    let mut rows = Vec::with_capacity(total);
    let mut reports = Vec::with_capacity(total);

    for (source, result) in args.files.iter().zip(results) {
        match result {
            Ok(outcome) => {
                rows.push(ConversionRow {
                    source: source.display().to_string(),
                    status: "ok".to_string(),
                    output: outcome.glb_path.display().to_string(),
                    artifact: outcome.artifact.to_string(),
                    tint: outcome.tint.to_string(),
                    size: output::format_bytes(outcome.output_bytes),
                    duration: format!("{} ms", outcome.duration_ms),
                });
                reports.push(ConversionReport {
                    source: source.clone(),
                    outcome: Some(outcome),
                    error: None,
                    stage: None,
                });
            }
            Err(e) => {
                rows.push(ConversionRow {
                    source: source.display().to_string(),
                    status: format!("failed ({})", e.stage()),
                    output: "-".to_string(),
                    artifact: "-".to_string(),
                    tint: "-".to_string(),
                    size: "-".to_string(),
                    duration: "-".to_string(),
                });
                reports.push(ConversionReport {
                    source: source.clone(),
                    outcome: None,
                    error: Some(e.to_string()),
                    stage: Some(e.stage()),
                });
                failures.push(e);
            }
        }
    }

    match format {
        OutputFormat::Table => {
            output::print_list(&rows, format);
            for report in &reports {
                if let Some(outcome) = &report.outcome {
                    for warning in &outcome.warnings {
                        output::print_warning(&format!("{}: {}", report.source.display(), warning));
                    }
                }
                if let Some(error) = &report.error {
                    output::print_error(&format!("{}: {}", report.source.display(), error));
                }
            }
        }
        OutputFormat::Json => output::print_json(&reports),
    }

    let snapshot = processor.metrics_snapshot();
    tracing::debug!(
        succeeded = snapshot.conversions_succeeded,
        failed = snapshot.conversions_failed,
        cancelled = snapshot.conversions_cancelled,
        p50_ms = ?snapshot.duration_p50_ms,
        "Batch finished"
    );

    match failures.len() {
        0 => {
            if format == OutputFormat::Table {
                output::print_success(&format!("Converted {} file(s)", total));
            }
            Ok(())
        }
        1 if total == 1 => Err(failures.remove(0).into()),
        n => Err(AppError::internal(format!(
            "{} of {} conversions failed",
            n, total
        ))),
    }
}
