#![allow(clippy::result_large_err)]

//! Client for the external INTERLIS validation service.
//!
//! Protocol: multipart upload to `{service_url}/upload`; a `201` carries a `statusUrl` that is
//! polled until the job reaches a terminal state, after which the log behind `logUrl` decides
//! the outcome. The service reports rejection only inside the log text.

use crate::core::config::ValidationConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Marker the validator writes into the log of a rejected file.
pub const VALIDATION_FAILED_MARKER: &str = "...validation failed";

#[derive(Debug, Clone)]
pub struct ValidationSettings {
    pub service_url: Url,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl ValidationSettings {
    pub fn from_config(config: &ValidationConfig) -> Result<Self, AppError> {
        let service_url = Url::parse(&config.service_url).map_err(|err| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!(
                    "validation.service_url is not a valid URL '{}': {}",
                    config.service_url, err
                ),
            )
            .with_code("CFG-003")
        })?;
        Ok(ValidationSettings {
            service_url,
            poll_interval: config.poll_interval()?,
            max_wait: config.max_wait()?,
        })
    }
}

/// `failed` is true when the service rejected the file or could not take it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub failed: bool,
    pub log: Vec<u8>,
}

impl ValidationOutcome {
    fn rejected(message: String) -> Self {
        ValidationOutcome {
            failed: true,
            log: message.into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationJobStatus {
    Enqueued,
    Processing,
    Completed,
    CompletedWithErrors,
    Unknown(String),
}

impl ValidationJobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "enqueued" => ValidationJobStatus::Enqueued,
            "processing" => ValidationJobStatus::Processing,
            "completed" => ValidationJobStatus::Completed,
            "completedWithErrors" => ValidationJobStatus::CompletedWithErrors,
            other => ValidationJobStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ValidationJobStatus::Enqueued | ValidationJobStatus::Processing
        )
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "statusUrl")]
    status_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(rename = "logUrl", default)]
    log_url: Option<String>,
}

pub struct ValidationClient {
    http: reqwest::Client,
    settings: ValidationSettings,
}

impl ValidationClient {
    pub fn new(settings: ValidationSettings) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mgdm2oereb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("failed to build http client: {}", err),
                )
            })?;
        Ok(ValidationClient { http, settings })
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Submit `content` under `display_name` and wait for the verdict.
    ///
    /// `all_objects_accessible` is forwarded as the validator's strictness switch.
    pub async fn validate(
        &self,
        content: Vec<u8>,
        display_name: &str,
        all_objects_accessible: bool,
    ) -> Result<ValidationOutcome, AppError> {
        let upload_url = self.upload_url()?;
        let form = Form::new()
            .part(
                "file",
                Part::bytes(content).file_name(display_name.to_string()),
            )
            .text("allObjectsAccessible", all_objects_accessible.to_string());

        let response = self
            .http
            .post(upload_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| transport_error(&upload_url, err))?;

        let status = response.status();
        tracing::debug!(url = %upload_url, status = status.as_u16(), "validation upload answered");
        match status {
            StatusCode::CREATED => {}
            StatusCode::BAD_REQUEST => {
                return Ok(ValidationOutcome::rejected(format!(
                    "Some error happened: {}",
                    status.as_u16()
                )))
            }
            StatusCode::PAYLOAD_TOO_LARGE => {
                return Ok(ValidationOutcome::rejected(format!(
                    "File was too large: {}",
                    status.as_u16()
                )))
            }
            other => {
                return Ok(ValidationOutcome::rejected(format!(
                    "could not talk to validation service: {}",
                    other.as_u16()
                )))
            }
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|err| protocol_error(format!("upload response without statusUrl: {}", err)))?;
        let status_url = self.resolve(&upload.status_url)?;
        self.poll(status_url).await
    }

    async fn poll(&self, status_url: Url) -> Result<ValidationOutcome, AppError> {
        let deadline = Instant::now() + self.settings.max_wait;
        let mut last_status: Option<ValidationJobStatus> = None;

        loop {
            let response = self
                .http
                .get(status_url.clone())
                .send()
                .await
                .map_err(|err| transport_error(&status_url, err))?;
            let body: StatusResponse = response.json().await.map_err(|err| {
                protocol_error(format!("undecodable status from {}: {}", status_url, err))
            })?;

            let status = ValidationJobStatus::parse(&body.status);
            if last_status.as_ref() != Some(&status) {
                tracing::info!(status = %body.status, url = %status_url, "validation job status");
                last_status = Some(status.clone());
            }

            match status {
                ValidationJobStatus::Completed | ValidationJobStatus::CompletedWithErrors => {
                    let log_ref = body.log_url.ok_or_else(|| {
                        protocol_error(format!("status '{}' without logUrl", body.status))
                    })?;
                    let log_url = self.resolve(&log_ref)?;
                    return self.fetch_log(log_url).await;
                }
                ValidationJobStatus::Enqueued | ValidationJobStatus::Processing => {
                    if Instant::now() + self.settings.poll_interval > deadline {
                        return Err(AppError::new(
                            ErrorCategory::TimeoutError,
                            format!(
                                "validation did not finish within {}",
                                humantime::format_duration(self.settings.max_wait)
                            ),
                        )
                        .with_code("VAL-004"));
                    }
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
                ValidationJobStatus::Unknown(other) => {
                    tracing::error!(status = %other, "unknown validation service status");
                    return Err(AppError::new(
                        ErrorCategory::ProtocolError,
                        format!("unknown status of validation service: {}", other),
                    )
                    .with_code("VAL-002"));
                }
            }
        }
    }

    async fn fetch_log(&self, log_url: Url) -> Result<ValidationOutcome, AppError> {
        let response = self
            .http
            .get(log_url.clone())
            .send()
            .await
            .map_err(|err| transport_error(&log_url, err))?;
        if !response.status().is_success() {
            return Err(AppError::new(
                ErrorCategory::ValidationServiceError,
                format!(
                    "validation log {} answered {}",
                    log_url,
                    response.status().as_u16()
                ),
            )
            .with_code("VAL-005"));
        }
        let log = response
            .bytes()
            .await
            .map_err(|err| transport_error(&log_url, err))?
            .to_vec();
        let failed = String::from_utf8_lossy(&log).contains(VALIDATION_FAILED_MARKER);
        Ok(ValidationOutcome { failed, log })
    }

    fn upload_url(&self) -> Result<Url, AppError> {
        let raw = format!(
            "{}/upload",
            self.settings.service_url.as_str().trim_end_matches('/')
        );
        Url::parse(&raw).map_err(|err| protocol_error(format!("bad upload url {}: {}", raw, err)))
    }

    /// Absolute references are used as they are; relative ones resolve against the service base.
    fn resolve(&self, reference: &str) -> Result<Url, AppError> {
        if let Ok(absolute) = Url::parse(reference) {
            return Ok(absolute);
        }
        let mut base = self.settings.service_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(reference)
            .map_err(|err| protocol_error(format!("bad reference '{}': {}", reference, err)))
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> AppError {
    AppError::with_source(
        ErrorCategory::ValidationServiceError,
        format!("validation service unreachable at {}", url),
        Box::new(err),
    )
    .with_code("VAL-001")
}

fn protocol_error(message: String) -> AppError {
    AppError::new(ErrorCategory::ProtocolError, message).with_code("VAL-003")
}
