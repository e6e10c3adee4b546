pub mod args;
pub mod commands;

pub use args::{ArtifactsArgs, JobArgs, JobsArgs, OutputFormat, SubmitArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
JOB COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "mgdm2oereb")]
#[command(version = crate::VERSION)]
#[command(about = "Transform MGDM INTERLIS packages into OeREBKRM transfer files")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: submit a job, inspect its status, fetch the result, then dismiss it."
)]
pub struct Args {
    /// Path to the service config (default: $MGDM2OEREB_CONFIG or ./mgdm2oereb.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Run one transformation job",
        long_about = "Submit validates the parameters, runs the staged pipeline of the chosen variant and records the job.",
        after_help = "Example:\n    mgdm2oereb submit --params job.json --variant extended"
    )]
    Submit(SubmitArgs),
    #[command(
        about = "List recorded jobs",
        after_help = "Example:\n    mgdm2oereb jobs --format json"
    )]
    Jobs(JobsArgs),
    #[command(
        about = "Show the record of one job",
        after_help = "Example:\n    mgdm2oereb status 1b4e28ba-2fa1-11d2-883f-0016d3cca427"
    )]
    Status(JobArgs),
    #[command(about = "Print the stored result document of a job")]
    Result(JobArgs),
    #[command(about = "Dismiss a job and drop its result document")]
    Dismiss(JobArgs),
    #[command(about = "Remove a job record")]
    Delete(JobArgs),
    #[command(
        about = "Find published artifacts",
        long_about = "Artifacts lists published files whose names contain the given job id or basket id.",
        after_help = "Example:\n    mgdm2oereb artifacts 1b4e28ba"
    )]
    Artifacts(ArtifactsArgs),
}

impl Command {
    /// Commands whose output is meant to be piped.
    pub fn writes_stdout(&self) -> bool {
        matches!(
            self,
            Command::Result(_) | Command::Status(_) | Command::Jobs(_) | Command::Submit(_)
        )
    }
}

pub async fn run(args: Args) -> crate::Result<()> {
    let config = crate::core::ConfigLoader::load(args.config.as_deref())?;
    let _guard = crate::logging::init(&config, args.command.writes_stdout())?;

    match args.command {
        Command::Submit(submit_args) => commands::submit(&config, submit_args).await,
        Command::Jobs(jobs_args) => commands::jobs(&config, jobs_args).await,
        Command::Status(job_args) => commands::status(&config, job_args).await,
        Command::Result(job_args) => commands::result(&config, job_args).await,
        Command::Dismiss(job_args) => commands::dismiss(&config, job_args).await,
        Command::Delete(job_args) => commands::delete(&config, job_args).await,
        Command::Artifacts(artifacts_args) => commands::artifacts(&config, artifacts_args).await,
    }
}
