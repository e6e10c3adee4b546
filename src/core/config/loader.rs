#![allow(clippy::result_large_err)]

use super::ServiceConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "mgdm2oereb.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path (explicit, `MGDM2OEREB_CONFIG`, or ./mgdm2oereb.toml),
    /// read it if present, apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<ServiceConfig, AppError> {
        let path = Self::resolve_path(explicit);
        let mut config = Self::load_from_file(&path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);
        Self::validate_config(&config)?;

        Ok(config)
    }

    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match env::var("MGDM2OEREB_CONFIG") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<ServiceConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: ServiceConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("CFG-001")
        })?;

        Ok(Some(config))
    }

    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut ServiceConfig) {
        if let Some(data_dir) = non_empty_var("MGDM2OEREB_DATA") {
            config.paths.data_dir = PathBuf::from(data_dir);
        }

        if let Some(job_dir) = non_empty_var("MGDM2OEREB_JOB") {
            config.paths.job_dir = PathBuf::from(job_dir);
        }

        if let Some(trafo_root) = non_empty_var("MGDM2OEREB_PATH") {
            config.paths.trafo_root = PathBuf::from(trafo_root);
        }

        if let Some(service_url) = non_empty_var("ILIVALIDATOR_SERVICE") {
            config.validation.service_url = service_url;
        }

        if let Some(poll_interval) = non_empty_var("MGDM2OEREB_POLL_INTERVAL") {
            config.validation.poll_interval = poll_interval;
        }

        if let Some(max_wait) = non_empty_var("MGDM2OEREB_VALIDATION_MAX_WAIT") {
            config.validation.max_wait = max_wait;
        }

        if let Some(result_xtf) = non_empty_var("MGDM2OEREB_RESULT_XTF_NAME") {
            config.names.result_xtf = result_xtf;
        }

        if let Some(lookup_result) = non_empty_var("MGDM2OEREB_RESULT_OEREBLEX_XML_NAME") {
            config.names.lookup_result = lookup_result;
        }

        if let Some(script) = non_empty_var("MGDM2OEREB_OEREBLEX_TRAFO_PY") {
            config.lookup.script = PathBuf::from(script);
        }

        if let Some(output_dir) = non_empty_var("MGDM2OEREB_OUTPUT_DIR") {
            config.jobs.output_dir = Some(PathBuf::from(output_dir));
        }

        if let Some(level) = non_empty_var("MGDM2OEREB_LOG_LEVEL") {
            config.logging.default_level = level;
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "MGDM2OEREB_CONFIG - Path of the configuration file (default: ./mgdm2oereb.toml)",
            "MGDM2OEREB_DATA - Directory published artifacts are written to (default: /data)",
            "MGDM2OEREB_JOB - Root of the per-job working directories (default: /job)",
            "MGDM2OEREB_PATH - Transformation asset root, xsl/ lives below it (default: /mgdm2oereb)",
            "ILIVALIDATOR_SERVICE - Base URL of the validation service",
            "MGDM2OEREB_POLL_INTERVAL - Validation status poll interval (default: 1s)",
            "MGDM2OEREB_VALIDATION_MAX_WAIT - Upper bound for validation polling (default: 30m)",
            "MGDM2OEREB_RESULT_XTF_NAME - Name of the transformation result (default: OeREBKRMtrsfr_V2_0.xtf)",
            "MGDM2OEREB_RESULT_OEREBLEX_XML_NAME - Name of the lookup result (default: oereblex.xml)",
            "MGDM2OEREB_OEREBLEX_TRAFO_PY - Lookup script path (default: oereblex.download.py)",
            "MGDM2OEREB_OUTPUT_DIR - Directory job result documents are written to",
            "MGDM2OEREB_LOG_LEVEL - Default tracing directive when RUST_LOG is unset (default: info)",
        ]
    }

    /// Validate configuration values
    pub fn validate_config(config: &ServiceConfig) -> Result<(), AppError> {
        if config.paths.results_prefix.trim().is_empty() {
            return Err(invalid("paths.results_prefix cannot be empty"));
        }

        if config.names.result_xtf.trim().is_empty() {
            return Err(invalid("names.result_xtf cannot be empty"));
        }

        if config.names.lookup_result.trim().is_empty() {
            return Err(invalid("names.lookup_result cannot be empty"));
        }

        let service_url = Url::parse(&config.validation.service_url).map_err(|err| {
            invalid(format!(
                "validation.service_url is not a valid URL '{}': {}",
                config.validation.service_url, err
            ))
        })?;
        if !matches!(service_url.scheme(), "http" | "https") {
            return Err(invalid("validation.service_url must use http or https"));
        }

        let poll_interval = config.validation.poll_interval()?;
        let max_wait = config.validation.max_wait()?;
        if max_wait < poll_interval {
            return Err(invalid(
                "validation.max_wait must not be shorter than validation.poll_interval",
            ));
        }

        if config.transform.program.trim().is_empty() {
            return Err(invalid("transform.program cannot be empty"));
        }

        if config.lookup.program.trim().is_empty() {
            return Err(invalid("lookup.program cannot be empty"));
        }

        config.logging.validate()?;

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn invalid<T: Into<String>>(message: T) -> AppError {
    AppError::new(ErrorCategory::ConfigurationError, message).with_code("CFG-003")
}
