//! Serializable job bookkeeping types shared by the job store and the query surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle status of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Running,
    Successful,
    Failed,
    Dismissed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Accepted => "accepted",
            JobStatus::Running => "running",
            JobStatus::Successful => "successful",
            JobStatus::Failed => "failed",
            JobStatus::Dismissed => "dismissed",
        }
    }

    /// Terminal states are never left again except through an explicit dismissal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Successful | JobStatus::Failed | JobStatus::Dismissed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "accepted" => Ok(JobStatus::Accepted),
            "running" => Ok(JobStatus::Running),
            "successful" => Ok(JobStatus::Successful),
            "failed" => Ok(JobStatus::Failed),
            "dismissed" => Ok(JobStatus::Dismissed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Persisted record describing one job and where its result lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub identifier: String,
    pub process_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message: String,
    pub progress: u8,
    pub result_location: Option<PathBuf>,
    pub result_mimetype: Option<String>,
}

impl JobRecord {
    /// Fresh record in the `accepted` state.
    pub fn accepted(identifier: impl Into<String>, process_id: impl Into<String>) -> Self {
        JobRecord {
            identifier: identifier.into(),
            process_id: process_id.into(),
            status: JobStatus::Accepted,
            started_at: Utc::now(),
            ended_at: None,
            message: "Job accepted and ready for execution".to_string(),
            progress: 0,
            result_location: None,
            result_mimetype: None,
        }
    }
}
