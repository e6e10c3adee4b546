#![allow(clippy::result_large_err)]

use crate::core::command::{CommandExecutionRequest, CommandRunner, TokioCommandRunner};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

/// XSLT string parameters in the order they are passed.
pub type TransformParams = IndexMap<String, String>;

/// Applies a named template to an input file. No retries, no partial output.
#[async_trait]
pub trait Transformer: Send + Sync + 'static {
    async fn transform(
        &self,
        template: &Path,
        input: &Path,
        params: &TransformParams,
    ) -> Result<Vec<u8>, AppError>;
}

/// Runs `xsltproc --stringparam k v ... template input` and returns stdout.
pub struct XsltprocTransformer {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl XsltprocTransformer {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_runner(program, Arc::new(TokioCommandRunner))
    }

    pub fn with_runner(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        XsltprocTransformer {
            program: program.into(),
            runner,
        }
    }

    fn request(&self, template: &Path, input: &Path, params: &TransformParams) -> CommandExecutionRequest {
        let mut request = CommandExecutionRequest::new(&self.program);
        for (key, value) in params {
            request = request.arg("--stringparam").arg(key).arg(value);
        }
        request
            .arg(template.to_string_lossy())
            .arg(input.to_string_lossy())
    }
}

#[async_trait]
impl Transformer for XsltprocTransformer {
    async fn transform(
        &self,
        template: &Path,
        input: &Path,
        params: &TransformParams,
    ) -> Result<Vec<u8>, AppError> {
        if !template.is_file() {
            return Err(AppError::new(
                ErrorCategory::TransformError,
                format!("template {} does not exist", template.display()),
            )
            .with_code("TRF-002"));
        }

        let request = self.request(template, input, params);
        tracing::debug!(command = %request.display(), "running xslt processor");
        let output = self.runner.run(&request).await?;

        if !output.success() {
            let mut err = AppError::new(
                ErrorCategory::TransformError,
                format!(
                    "{} exited with code {}: {}",
                    self.program,
                    output.exit_code,
                    output.stderr_text().trim()
                ),
            )
            .with_code("TRF-001");
            err.add_context("template", &template.display().to_string());
            return Err(err);
        }

        Ok(output.stdout)
    }
}
