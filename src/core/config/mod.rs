#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::logging::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration loaded from mgdm2oereb.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// Filesystem layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Configurable artifact names
    #[serde(default)]
    pub names: NamesConfig,

    /// External validation service
    #[serde(default)]
    pub validation: ValidationConfig,

    /// XSLT processor
    #[serde(default)]
    pub transform: TransformConfig,

    /// External lookup script
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Job bookkeeping
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Stage list overrides
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory published artifacts are written to
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root of the per-job working directories
    #[serde(default = "default_job_dir")]
    pub job_dir: PathBuf,

    /// Installation root of the transformation assets (xsl/ lives below it)
    #[serde(default = "default_trafo_root")]
    pub trafo_root: PathBuf,

    /// URL prefix under which published artifacts are served
    #[serde(default = "default_results_prefix")]
    pub results_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamesConfig {
    #[serde(default = "default_result_xtf")]
    pub result_xtf: String,

    #[serde(default = "default_lookup_result")]
    pub lookup_result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Base URL of the validation service; uploads go to `{service_url}/upload`
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Wait between two status checks (humantime, e.g. "1s", "500ms")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Upper bound for the whole polling loop (humantime)
    #[serde(default = "default_max_wait")]
    pub max_wait: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default = "default_transform_program")]
    pub program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_program")]
    pub program: String,

    /// Script path; relative paths resolve against `paths.trafo_root`
    #[serde(default = "default_lookup_script")]
    pub script: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStoreKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobsConfig {
    #[serde(default)]
    pub store: JobStoreKind,

    /// Directory of the file-backed job store (default: `{job_dir}/jobs`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Directory result documents are written to (default: `{job_dir}/results`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_stages: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_stages: Option<Vec<String>>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_job_dir() -> PathBuf {
    PathBuf::from("/job")
}

fn default_trafo_root() -> PathBuf {
    PathBuf::from("/mgdm2oereb")
}

fn default_results_prefix() -> String {
    "mgdm2oereb_results".to_string()
}

fn default_result_xtf() -> String {
    "OeREBKRMtrsfr_V2_0.xtf".to_string()
}

fn default_lookup_result() -> String {
    "oereblex.xml".to_string()
}

fn default_service_url() -> String {
    "http://ilivalidator-service:8080/api/v1".to_string()
}

fn default_poll_interval() -> String {
    "1s".to_string()
}

fn default_max_wait() -> String {
    "30m".to_string()
}

fn default_transform_program() -> String {
    "xsltproc".to_string()
}

fn default_lookup_program() -> String {
    "python3".to_string()
}

fn default_lookup_script() -> PathBuf {
    PathBuf::from("oereblex.download.py")
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            data_dir: default_data_dir(),
            job_dir: default_job_dir(),
            trafo_root: default_trafo_root(),
            results_prefix: default_results_prefix(),
        }
    }
}

impl Default for NamesConfig {
    fn default() -> Self {
        NamesConfig {
            result_xtf: default_result_xtf(),
            lookup_result: default_lookup_result(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            service_url: default_service_url(),
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            program: default_transform_program(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            program: default_lookup_program(),
            script: default_lookup_script(),
        }
    }
}

impl PathsConfig {
    pub fn xsl_dir(&self) -> PathBuf {
        self.trafo_root.join("xsl")
    }
}

impl ValidationConfig {
    pub fn poll_interval(&self) -> Result<Duration, AppError> {
        parse_duration("validation.poll_interval", &self.poll_interval)
    }

    pub fn max_wait(&self) -> Result<Duration, AppError> {
        parse_duration("validation.max_wait", &self.max_wait)
    }
}

impl ServiceConfig {
    pub fn lookup_script_path(&self) -> PathBuf {
        if self.lookup.script.is_absolute() {
            self.lookup.script.clone()
        } else {
            self.paths.trafo_root.join(&self.lookup.script)
        }
    }

    pub fn job_store_dir(&self) -> PathBuf {
        self.jobs
            .store_dir
            .clone()
            .unwrap_or_else(|| self.paths.job_dir.join("jobs"))
    }

    pub fn job_output_dir(&self) -> PathBuf {
        self.jobs
            .output_dir
            .clone()
            .unwrap_or_else(|| self.paths.job_dir.join("results"))
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration, AppError> {
    humantime::parse_duration(raw.trim()).map_err(|err| {
        AppError::new(
            ErrorCategory::ConfigurationError,
            format!("{} is not a valid duration '{}': {}", field, raw, err),
        )
        .with_code("CFG-002")
    })
}


pub mod loader;

pub use loader::ConfigLoader;
