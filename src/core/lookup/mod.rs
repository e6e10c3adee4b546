#![allow(clippy::result_large_err)]

use crate::core::command::{CommandExecutionRequest, CommandRunner, TokioCommandRunner};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything the lookup script reads from its environment.
#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub geolink_list_template: PathBuf,
    pub xtf_path: PathBuf,
    pub result_path: PathBuf,
    pub host: String,
    pub region: String,
    pub fallback_office_name: String,
    pub fallback_office_url: String,
}

/// Runs the external document lookup (`python3 oereblex.download.py` by default).
pub struct ExternalLookup {
    program: String,
    script: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl ExternalLookup {
    pub fn new(program: impl Into<String>, script: PathBuf) -> Self {
        Self::with_runner(program, script, Arc::new(TokioCommandRunner))
    }

    pub fn with_runner(
        program: impl Into<String>,
        script: PathBuf,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        ExternalLookup {
            program: program.into(),
            script,
            runner,
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Returns the bytes the script wrote to `result_path`.
    pub async fn run(&self, request: &LookupRequest) -> Result<Vec<u8>, AppError> {
        if let Some(parent) = request.result_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let command = CommandExecutionRequest::new(&self.program)
            .arg(self.script.to_string_lossy())
            .env(
                "GEOLINK_LIST_TRAFO_PATH",
                request.geolink_list_template.to_string_lossy(),
            )
            .env("XTF_PATH", request.xtf_path.to_string_lossy())
            .env("RESULT_FILE_PATH", request.result_path.to_string_lossy())
            .env("OEREBLEX_HOST", &request.host)
            .env("OEREBLEX_CANTON", &request.region)
            .env("DUMMY_OFFICE_NAME", &request.fallback_office_name)
            .env("DUMMY_OFFICE_URL", &request.fallback_office_url);

        let output = self.runner.run(&command).await?;
        let combined = output.combined_output();

        if !output.success() {
            tracing::error!(exit_code = output.exit_code, output = %combined, "lookup script failed");
            let mut err = AppError::new(
                ErrorCategory::LookupError,
                format!(
                    "{} exited with code {}",
                    command.display(),
                    output.exit_code
                ),
            )
            .with_code("LKP-001");
            err.add_context("output", &combined);
            return Err(err);
        }
        tracing::info!(output = %combined, "lookup script finished");

        fs::read(&request.result_path).map_err(|io| {
            let mut err = AppError::new(
                ErrorCategory::LookupError,
                format!(
                    "lookup script did not produce {}: {}",
                    request.result_path.display(),
                    io
                ),
            )
            .with_code("LKP-002");
            err.add_context("output", &combined);
            err
        })
    }
}
