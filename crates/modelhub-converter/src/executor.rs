//! FBX2glTF process execution.
//!
//! Runs the converter as a child process with placeholder substitution,
//! timeout, cancellation and output capturing. A non-zero exit status or an
//! error marker on stderr is reported as a warning, not a failure: FBX2glTF
//! frequently complains about unsupported features while still producing a
//! usable model.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConverterConfig;
use crate::error::ConversionError;

/// Marker that flags converter stderr as suspicious (matched case-insensitively).
const STDERR_ERROR_MARKER: &str = "error";

/// Maximum number of stderr characters copied into a warning.
const MAX_WARNING_CHARS: usize = 500;

/// What happened when the converter ran to completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Exit code, `None` if terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Non-fatal problems worth surfacing.
    pub warnings: Vec<String>,
    /// Wall-clock run time.
    pub duration_ms: u64,
}

/// Executor for the external converter.
#[derive(Debug, Clone)]
pub struct ConverterExecutor {
    program: PathBuf,
    args_template: Vec<String>,
    timeout: Duration,
    capture_output: bool,
}

impl ConverterExecutor {
    /// Create an executor from explicit settings.
    pub fn new(program: PathBuf, args_template: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args_template,
            timeout,
            capture_output: true,
        }
    }

    /// Create an executor from converter configuration.
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            program: config.converter_path.clone(),
            args_template: config.converter_args.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            capture_output: config.capture_output,
        }
    }

    /// The executable that will be launched.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Substitute `{input}` and `{output}` placeholders in the argument template.
    pub fn substitute_args(&self, input_path: &Path, output_dir: &Path) -> Vec<String> {
        let input_str = input_path.to_string_lossy();
        let output_str = output_dir.to_string_lossy();

        self.args_template
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input_str)
                    .replace("{output}", &output_str)
            })
            .collect()
    }

    /// Run the converter on `input_path`, pointing it at `output_dir`.
    ///
    /// Fails only if the process cannot be launched, times out, or is
    /// cancelled. In the latter two cases the child is killed.
    pub async fn run(
        &self,
        input_path: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, ConversionError> {
        if cancel.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }

        let args = self.substitute_args(input_path, output_dir);

        let (stdout_cfg, stderr_cfg) = if self.capture_output {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::null(), Stdio::null())
        };

        let mut cmd = Command::new(&self.program);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(stdout_cfg)
            .stderr(stderr_cfg)
            .kill_on_drop(true);

        debug!(
            converter = %self.program.display(),
            args = ?args,
            timeout_s = self.timeout.as_secs(),
            "Spawning converter process"
        );

        let start = Instant::now();
        let child = cmd.spawn().map_err(|source| {
            error!(
                converter = %self.program.display(),
                error = %source,
                "Failed to launch converter"
            );
            ConversionError::ProcessLaunch {
                path: self.program.clone(),
                source,
            }
        })?;

        // Dropping the wait future drops the child, which kills it.
        tokio::select! {
            result = child.wait_with_output() => {
                let output = result?;
                let duration_ms = start.elapsed().as_millis() as u64;
                let report = Self::build_report(
                    output.status.code(),
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                    duration_ms,
                );

                for warning in &report.warnings {
                    warn!(converter = %self.program.display(), "{warning}");
                }
                info!(
                    exit_code = ?report.exit_code,
                    elapsed_ms = duration_ms,
                    "Converter finished"
                );
                Ok(report)
            }
            _ = tokio::time::sleep(self.timeout) => {
                error!(
                    timeout_s = self.timeout.as_secs(),
                    "Converter timed out, killing"
                );
                Err(ConversionError::ConverterTimeout {
                    timeout_seconds: self.timeout.as_secs(),
                })
            }
            _ = cancel.cancelled() => {
                info!("Conversion cancelled, killing converter");
                Err(ConversionError::Cancelled)
            }
        }
    }

    /// Turn raw process results into a report, deriving warnings.
    fn build_report(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    ) -> ExecutionReport {
        let mut warnings = Vec::new();

        match exit_code {
            Some(0) => {}
            Some(code) => warnings.push(format!("Converter exited with code {code}")),
            None => warnings.push("Converter was terminated by a signal".to_string()),
        }

        if stderr.to_lowercase().contains(STDERR_ERROR_MARKER) {
            let excerpt: String = stderr.trim().chars().take(MAX_WARNING_CHARS).collect();
            warnings.push(format!("Converter reported: {excerpt}"));
        }

        ExecutionReport {
            exit_code,
            stdout,
            stderr,
            warnings,
            duration_ms,
        }
    }
}
