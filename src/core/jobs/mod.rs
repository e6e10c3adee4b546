#![allow(clippy::result_large_err)]

//! Job lifecycle: one persisted record per pipeline run.
//!
//! `submit` drives a record through `accepted -> running -> successful | failed` and always
//! leaves it terminal, even when the processor errors out.

pub mod store;

pub use store::{validate_job_id, FileJobStore, JobStore, MemoryJobStore};

use crate::core::config::{JobStoreKind, ServiceConfig};
use crate::core::error::AppError;
use crate::core::pipeline::result::{MSG_KEY, STATUS_KEY};
use crate::core::processor::{Processor, ProcessorOutput, RESULT_MIMETYPE};
use crate::core::types::ErrorCategory;
use crate::utils::write_json_pretty;
use chrono::Utc;
use mgdm2oereb_types::{JobRecord, JobStatus};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const COMPLETED_MESSAGE: &str = "Job complete";
pub const RUNNING_MESSAGE: &str = "Job running";
pub const WRITING_MESSAGE: &str = "Writing job output";
pub const DISMISSED_MESSAGE: &str = "Job dismissed";
pub const OUTPUT_WRITE_FAILED_MESSAGE: &str = "Job output could not be written";
pub const FATAL_MESSAGE: &str = "ProcessingError: job aborted by an unexpected error";

pub const PROGRESS_RUNNING: u8 = 5;
pub const PROGRESS_WRITING: u8 = 95;
pub const PROGRESS_DONE: u8 = 100;

/// Stored result of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub mimetype: String,
    pub content: Vec<u8>,
}

pub struct JobManager {
    store: Arc<dyn JobStore>,
    output_dir: Option<PathBuf>,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>, output_dir: Option<PathBuf>) -> Self {
        JobManager { store, output_dir }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, AppError> {
        let store: Arc<dyn JobStore> = match config.jobs.store {
            JobStoreKind::File => Arc::new(FileJobStore::new(config.job_store_dir())?),
            JobStoreKind::Memory => Arc::new(MemoryJobStore::new()),
        };
        Ok(JobManager::new(store, Some(config.job_output_dir())))
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Run one job to completion.
    ///
    /// Invalid parameters are returned as an error before any record exists. Everything that
    /// goes wrong afterwards ends up in the returned record.
    pub async fn submit(
        &self,
        processor: &dyn Processor,
        job_id: &str,
        raw: &Value,
    ) -> Result<JobRecord, AppError> {
        validate_job_id(job_id)?;
        let params = processor.prepare(raw)?;
        let process_id = processor.id();

        self.store.add(JobRecord::accepted(job_id, process_id))?;
        tracing::info!(job_id, process_id, status = %JobStatus::Accepted, "job accepted");

        self.store.update(job_id, &mut |record| {
            record.status = JobStatus::Running;
            record.progress = PROGRESS_RUNNING;
            record.message = RUNNING_MESSAGE.to_string();
        })?;
        tracing::info!(job_id, process_id, status = %JobStatus::Running, "job running");

        let (status, message, written) = match processor.execute(job_id, &params).await {
            Ok(output) => self.conclude(job_id, process_id, output),
            Err(err) => {
                tracing::error!(
                    job_id,
                    process_id,
                    code = %err.code,
                    error = %err,
                    context = ?err.context,
                    "job aborted"
                );
                let document = json!({ "code": err.code, "description": err.message });
                let written = self
                    .write_output(job_id, process_id, &document)
                    .unwrap_or_else(|write_err| {
                        tracing::error!(job_id, error = %write_err, "failed to write job output");
                        None
                    });
                (JobStatus::Failed, FATAL_MESSAGE.to_string(), written)
            }
        };

        let mut finish = |record: &mut JobRecord| {
            record.status = status;
            record.message = message.clone();
            record.progress = PROGRESS_DONE;
            record.ended_at = Some(Utc::now());
            if let Some(location) = &written {
                record.result_location = Some(location.clone());
                record.result_mimetype = Some(RESULT_MIMETYPE.to_string());
            }
        };
        let record = match self.store.update(job_id, &mut finish) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(job_id, error = %err, "terminal job update failed, retrying once");
                self.store.update(job_id, &mut finish)?
            }
        };
        tracing::info!(job_id, process_id, status = %record.status, msg = %record.message, "job finished");
        Ok(record)
    }

    fn conclude(
        &self,
        job_id: &str,
        process_id: &str,
        output: ProcessorOutput,
    ) -> (JobStatus, String, Option<PathBuf>) {
        let written = match self.write_output(job_id, process_id, &output.outputs) {
            Ok(written) => written,
            Err(err) => {
                tracing::error!(job_id, error = %err, "failed to write job output");
                return (
                    JobStatus::Failed,
                    format!("{}: {}", OUTPUT_WRITE_FAILED_MESSAGE, err.message),
                    None,
                );
            }
        };
        if output.outputs.get(STATUS_KEY).and_then(Value::as_str) == Some(JobStatus::Failed.as_str()) {
            let message = output
                .outputs
                .get(MSG_KEY)
                .and_then(Value::as_str)
                .unwrap_or("Job failed")
                .to_string();
            (JobStatus::Failed, message, written)
        } else {
            (JobStatus::Successful, COMPLETED_MESSAGE.to_string(), written)
        }
    }

    /// Persist `document` as `{output_dir}/{process_id}-{job_id}.json`, when configured.
    fn write_output(
        &self,
        job_id: &str,
        process_id: &str,
        document: &Value,
    ) -> Result<Option<PathBuf>, AppError> {
        let Some(dir) = self.output_dir.as_ref() else {
            return Ok(None);
        };
        let path = dir.join(format!("{}-{}.json", process_id, job_id));

        let progress = self.store.update(job_id, &mut |record| {
            record.progress = PROGRESS_WRITING;
            record.message = WRITING_MESSAGE.to_string();
        });
        if let Err(err) = progress {
            tracing::warn!(job_id, error = %err, "could not record output progress");
        }

        write_json_pretty(&path, document).map_err(|mut err| {
            err.add_context("path", &path.display().to_string());
            err
        })?;
        Ok(Some(path))
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, AppError> {
        self.store.get(job_id)
    }

    /// All records, oldest first.
    pub fn list_jobs(&self) -> Result<Vec<JobRecord>, AppError> {
        let mut records = self.store.list()?;
        records.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        Ok(records)
    }

    /// Mark a job dismissed and drop its stored result.
    pub fn dismiss_job(&self, job_id: &str) -> Result<Option<JobRecord>, AppError> {
        let Some(record) = self.store.get(job_id)? else {
            return Ok(None);
        };
        if let Some(location) = &record.result_location {
            remove_result(location)?;
        }
        let record = self.store.update(job_id, &mut |record| {
            record.status = JobStatus::Dismissed;
            record.message = DISMISSED_MESSAGE.to_string();
            record.result_location = None;
            record.result_mimetype = None;
            if record.ended_at.is_none() {
                record.ended_at = Some(Utc::now());
            }
        })?;
        tracing::info!(job_id, status = %record.status, "job dismissed");
        Ok(Some(record))
    }

    pub fn delete_job(&self, job_id: &str) -> Result<bool, AppError> {
        if let Some(location) = self
            .store
            .get(job_id)?
            .and_then(|record| record.result_location)
        {
            remove_result(&location)?;
        }
        let removed = self.store.remove(job_id)?;
        if removed {
            tracing::info!(job_id, "job deleted");
        }
        Ok(removed)
    }

    /// `None` when the job, its result location or the file behind it is missing.
    pub fn get_job_result(&self, job_id: &str) -> Result<Option<JobResult>, AppError> {
        let Some(record) = self.store.get(job_id)? else {
            return Ok(None);
        };
        let Some(location) = record.result_location else {
            return Ok(None);
        };
        if !location.exists() {
            return Ok(None);
        }
        let content = fs::read(&location).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", location.display(), err),
            )
        })?;
        Ok(Some(JobResult {
            mimetype: record
                .result_mimetype
                .unwrap_or_else(|| RESULT_MIMETYPE.to_string()),
            content,
        }))
    }
}

fn remove_result(location: &Path) -> Result<(), AppError> {
    match fs::remove_file(location) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::new(
            ErrorCategory::IoError,
            format!("failed to remove {}: {}", location.display(), err),
        )),
    }
}
