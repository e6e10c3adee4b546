#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const BASE_PROCESS_ID: &str = "mgdm2oereb";
pub const EXTENDED_PROCESS_ID: &str = "mgdm2oereb-oereblex";

/// Request payload as it arrives, before any field is checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParameters {
    pub zip_file: Option<String>,
    pub theme_code: Option<String>,
    pub model_name: Option<String>,
    pub catalog: Option<String>,
    pub target_basket_id: Option<String>,
    pub input_validation: Option<bool>,
    #[serde(alias = "oereblex_host")]
    pub external_host: Option<String>,
    #[serde(alias = "oereblex_canton")]
    pub external_region: Option<String>,
    #[serde(alias = "dummy_office_name")]
    pub fallback_office_name: Option<String>,
    #[serde(alias = "dummy_office_url")]
    pub fallback_office_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("Cannot process without a {0}")]
    Missing(&'static str),
    #[error("catalog is not a valid URL '{value}': {reason}")]
    InvalidCatalog { value: String, reason: String },
    #[error("parameters must be a JSON object: {0}")]
    Malformed(String),
    #[error("{field} must not contain path separators, '..' or NUL, got '{value}'")]
    UnsafeName { field: &'static str, value: String },
}

impl From<ParameterError> for AppError {
    fn from(err: ParameterError) -> Self {
        let code = match err {
            ParameterError::Missing(_) => "PAR-001",
            ParameterError::InvalidCatalog { .. } => "PAR-002",
            ParameterError::Malformed(_) => "PAR-003",
            ParameterError::UnsafeName { .. } => "PAR-004",
        };
        AppError::new(ErrorCategory::ConfigurationError, err.to_string()).with_code(code)
    }
}

/// Validated input of one base-variant job.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub zip_file: String,
    pub theme_code: String,
    pub model_name: String,
    pub catalog: Url,
    pub target_basket_id: Option<String>,
    pub input_validation: bool,
}

/// Base parameters plus what the external lookup needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedParameters {
    pub base: Parameters,
    pub external_host: String,
    pub external_region: String,
    pub fallback_office_name: String,
    pub fallback_office_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobParameters {
    Base(Parameters),
    Extended(ExtendedParameters),
}

impl JobParameters {
    pub fn base(&self) -> &Parameters {
        match self {
            JobParameters::Base(params) => params,
            JobParameters::Extended(params) => &params.base,
        }
    }

    pub fn extended(&self) -> Option<&ExtendedParameters> {
        match self {
            JobParameters::Base(_) => None,
            JobParameters::Extended(params) => Some(params),
        }
    }

    pub fn variant(&self) -> PipelineVariant {
        match self {
            JobParameters::Base(_) => PipelineVariant::Base,
            JobParameters::Extended(_) => PipelineVariant::Extended,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    #[default]
    Base,
    Extended,
}

impl PipelineVariant {
    pub fn process_id(&self) -> &'static str {
        match self {
            PipelineVariant::Base => BASE_PROCESS_ID,
            PipelineVariant::Extended => EXTENDED_PROCESS_ID,
        }
    }

    /// Check every required field of this variant. Nothing is written before this passes.
    pub fn parse_parameters(&self, raw: &Value) -> Result<JobParameters, ParameterError> {
        if !raw.is_object() {
            return Err(ParameterError::Malformed(format!("got {}", kind_of(raw))));
        }
        let raw: RawParameters = serde_json::from_value(raw.clone())
            .map_err(|err| ParameterError::Malformed(err.to_string()))?;

        let base = Parameters::from_raw(&raw)?;
        match self {
            PipelineVariant::Base => Ok(JobParameters::Base(base)),
            PipelineVariant::Extended => Ok(JobParameters::Extended(ExtendedParameters {
                base,
                external_host: required(&raw.external_host, "external_host")?,
                external_region: required(&raw.external_region, "external_region")?,
                fallback_office_name: required(
                    &raw.fallback_office_name,
                    "fallback_office_name",
                )?,
                fallback_office_url: required(&raw.fallback_office_url, "fallback_office_url")?,
            })),
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineVariant::Base => write!(f, "base"),
            PipelineVariant::Extended => write!(f, "extended"),
        }
    }
}

impl FromStr for PipelineVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "base" | BASE_PROCESS_ID => Ok(PipelineVariant::Base),
            "extended" | EXTENDED_PROCESS_ID => Ok(PipelineVariant::Extended),
            other => Err(format!(
                "unknown pipeline variant '{}'; supported values are base, extended",
                other
            )),
        }
    }
}

impl Parameters {
    fn from_raw(raw: &RawParameters) -> Result<Self, ParameterError> {
        let zip_file = required(&raw.zip_file, "zip_file")?;
        let theme_code = file_name_safe(required(&raw.theme_code, "theme_code")?, "theme_code")?;
        let model_name = required(&raw.model_name, "model_name")?;
        let catalog_raw = required(&raw.catalog, "catalog")?;
        let catalog =
            Url::parse(&catalog_raw).map_err(|err| ParameterError::InvalidCatalog {
                value: catalog_raw.clone(),
                reason: err.to_string(),
            })?;

        let target_basket_id = raw
            .target_basket_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| file_name_safe(id.to_string(), "target_basket_id"))
            .transpose()?;

        Ok(Parameters {
            zip_file,
            theme_code,
            model_name,
            catalog,
            target_basket_id,
            input_validation: raw.input_validation.unwrap_or(true),
        })
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ParameterError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ParameterError::Missing(field))
}

/// Both values become segments of artifact file names.
fn file_name_safe(value: String, field: &'static str) -> Result<String, ParameterError> {
    if value.contains(['/', '\\', '\0']) || value.contains("..") {
        return Err(ParameterError::UnsafeName { field, value });
    }
    Ok(value)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
