use crate::{
    cli::args::{ArtifactsArgs, JobArgs, JobsArgs, OutputFormat, SubmitArgs},
    core::{artifacts, JobManager, ProcessorSet, ServiceConfig},
    Result,
};
use anyhow::{anyhow, Context};
use mgdm2oereb_types::JobRecord;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;

fn print_record(record: &JobRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

pub async fn submit(config: &ServiceConfig, args: SubmitArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.params)
        .with_context(|| format!("failed to read {}", args.params.display()))?;
    let params: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", args.params.display()))?;
    let job_id = args
        .job_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let processors = ProcessorSet::from_config(Arc::new(config.clone()))?;
    let processor = processors
        .for_variant(args.variant)
        .ok_or_else(|| anyhow!("no processor registered for variant {}", args.variant))?;
    let manager = JobManager::from_config(config)?;

    tracing::info!(job_id = %job_id, process_id = processor.id(), "submitting job");
    let record = manager.submit(processor.as_ref(), &job_id, &params).await?;
    print_record(&record)
}

pub async fn jobs(config: &ServiceConfig, args: JobsArgs) -> Result<()> {
    let records = JobManager::from_config(config)?.list_jobs()?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No jobs recorded");
            }
            for record in records {
                println!(
                    "{}  {:<20} {:<10} {:>3}%  {}",
                    record.identifier,
                    record.process_id,
                    record.status.as_str(),
                    record.progress,
                    record.message
                );
            }
        }
    }
    Ok(())
}

pub async fn status(config: &ServiceConfig, args: JobArgs) -> Result<()> {
    match JobManager::from_config(config)?.get_job(&args.job_id)? {
        Some(record) => print_record(&record),
        None => Err(anyhow!("job {} not found", args.job_id)),
    }
}

pub async fn result(config: &ServiceConfig, args: JobArgs) -> Result<()> {
    let result = JobManager::from_config(config)?
        .get_job_result(&args.job_id)?
        .ok_or_else(|| anyhow!("no result stored for job {}", args.job_id))?;
    tracing::debug!(job_id = %args.job_id, mimetype = %result.mimetype, "printing job result");
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&result.content)?;
    stdout.flush()?;
    Ok(())
}

pub async fn dismiss(config: &ServiceConfig, args: JobArgs) -> Result<()> {
    match JobManager::from_config(config)?.dismiss_job(&args.job_id)? {
        Some(record) => {
            println!("Job {} {}", record.identifier, record.status);
            Ok(())
        }
        None => Err(anyhow!("job {} not found", args.job_id)),
    }
}

pub async fn delete(config: &ServiceConfig, args: JobArgs) -> Result<()> {
    if JobManager::from_config(config)?.delete_job(&args.job_id)? {
        println!("Job {} deleted", args.job_id);
        Ok(())
    } else {
        Err(anyhow!("job {} not found", args.job_id))
    }
}

pub async fn artifacts(config: &ServiceConfig, args: ArtifactsArgs) -> Result<()> {
    let found = artifacts::discover(&config.paths.data_dir, &args.needle)?;
    if found.is_empty() {
        println!("No published artifacts match '{}'", args.needle);
    }
    for path in found {
        if let Some(name) = path.file_name() {
            println!(
                "/{}/{}",
                config.paths.results_prefix,
                name.to_string_lossy()
            );
        }
    }
    Ok(())
}
