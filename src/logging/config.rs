#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::logging::layers::console::ConsoleOutput;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::filter::Directive;

const DEFAULT_LEVEL: &str = "info";

/// `[logging]` section of the service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory of mgdm2oereb.log; defaults to `~/.mgdm2oereb/logs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_level")]
    pub default_level: String,

    #[serde(default = "default_enable_file")]
    pub enable_file: bool,

    #[serde(default)]
    pub console_output: ConsoleOutput,
}

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

fn default_enable_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            default_level: default_level(),
            enable_file: default_enable_file(),
            console_output: ConsoleOutput::default(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        Directive::from_str(&self.default_level).map_err(|_| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!(
                    "logging.default_level must be a valid tracing directive, got '{}'",
                    self.default_level
                ),
            )
            .with_code("CFG-004")
        })?;
        Ok(())
    }
}
