use crate::core::pipeline::PipelineVariant;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct SubmitArgs {
    /// JSON file holding the job parameters
    #[arg(long, value_name = "FILE")]
    pub params: PathBuf,

    /// Pipeline variant: base or extended (default: base)
    #[arg(long, default_value = "base", value_name = "VARIANT")]
    pub variant: PipelineVariant,

    /// Job identifier to use instead of a generated UUID
    #[arg(long, value_name = "ID")]
    pub job_id: Option<String>,
}

#[derive(Args)]
pub struct JobsArgs {
    /// Emit either terminal-friendly text or machine-readable JSON
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct JobArgs {
    /// Identifier of the job
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
}

#[derive(Args)]
pub struct ArtifactsArgs {
    /// Substring of the published file names, usually a job id or basket id
    #[arg(value_name = "NEEDLE")]
    pub needle: String,
}

#[derive(Clone, Copy, clap::ValueEnum, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per job
    Text,
    /// Pretty JSON array of job records
    Json,
}
