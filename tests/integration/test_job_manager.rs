use async_trait::async_trait;
use mgdm2oereb::core::error::AppError;
use mgdm2oereb::core::jobs::{
    FileJobStore, JobManager, JobStore, MemoryJobStore, COMPLETED_MESSAGE, FATAL_MESSAGE,
};
use mgdm2oereb::core::pipeline::{JobParameters, PipelineVariant};
use mgdm2oereb::core::processor::{Processor, ProcessorOutput, RESULT_MIMETYPE};
use mgdm2oereb::core::types::ErrorCategory;
use mgdm2oereb_types::JobStatus;
use serde_json::{json, Value};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Echoes a result derived from the theme code: `fail` fails, `crash` errors.
#[derive(Default)]
struct ScriptedProcessor {
    executions: AtomicUsize,
}

#[async_trait]
impl Processor for ScriptedProcessor {
    fn id(&self) -> &'static str {
        "mgdm2oereb"
    }

    fn prepare(&self, raw: &Value) -> Result<JobParameters, AppError> {
        Ok(PipelineVariant::Base.parse_parameters(raw)?)
    }

    async fn execute(
        &self,
        job_id: &str,
        params: &JobParameters,
    ) -> Result<ProcessorOutput, AppError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let outputs = match params.base().theme_code.as_str() {
            "crash" => return Err(AppError::new(ErrorCategory::IoError, "disk full")),
            "fail" => json!({
                "theme_code": "fail",
                "status": "failed",
                "msg": "Validation of input file failed.",
                "task": "validate-input",
            }),
            theme => json!({
                "theme_code": theme,
                "transformation_result": format!("/mgdm2oereb_results/{}.xtf", job_id),
            }),
        };
        Ok(ProcessorOutput {
            mimetype: RESULT_MIMETYPE.to_string(),
            outputs,
        })
    }
}

fn params(theme: &str) -> Value {
    json!({
        "zip_file": "UEsFBg==",
        "theme_code": theme,
        "model_name": "Planungszonen_V1_1",
        "catalog": "https://example.org/catalog.xml",
    })
}

fn file_manager(temp: &TempDir) -> JobManager {
    let store = FileJobStore::new(temp.path().join("jobs")).unwrap();
    JobManager::new(Arc::new(store), Some(temp.path().join("results")))
}

#[tokio::test]
async fn test_successful_job_persists_result_document() {
    let temp = TempDir::new().unwrap();
    let manager = file_manager(&temp);
    let processor = ScriptedProcessor::default();

    let record = manager
        .submit(&processor, "job-ok", &params("ch.Planungszonen"))
        .await
        .unwrap();

    assert_eq!(record.status, JobStatus::Successful);
    assert_eq!(record.message, COMPLETED_MESSAGE);
    assert_eq!(record.progress, 100);
    assert!(record.ended_at.unwrap() >= record.started_at);
    assert_eq!(record.result_mimetype.as_deref(), Some("application/json"));

    let location = temp.path().join("results").join("mgdm2oereb-job-ok.json");
    assert_eq!(record.result_location.as_deref(), Some(location.as_path()));
    let written = fs::read_to_string(&location).unwrap();
    assert!(written.starts_with("{\n  \"theme_code\""));

    let result = manager.get_job_result("job-ok").unwrap().unwrap();
    assert_eq!(result.mimetype, "application/json");
    let document: Value = serde_json::from_slice(&result.content).unwrap();
    assert_eq!(
        document["transformation_result"],
        "/mgdm2oereb_results/job-ok.xtf"
    );

    let stored = manager.get_job("job-ok").unwrap().unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn test_failed_outputs_carry_the_stage_message() {
    let temp = TempDir::new().unwrap();
    let manager = file_manager(&temp);
    let record = manager
        .submit(&ScriptedProcessor::default(), "job-fail", &params("fail"))
        .await
        .unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.message, "Validation of input file failed.");
    assert!(manager.get_job_result("job-fail").unwrap().is_some());
}

#[tokio::test]
async fn test_unexpected_error_leaves_a_failed_record() {
    let temp = TempDir::new().unwrap();
    let manager = file_manager(&temp);
    let record = manager
        .submit(&ScriptedProcessor::default(), "job-crash", &params("crash"))
        .await
        .unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.message, FATAL_MESSAGE);
    assert!(record.ended_at.is_some());

    let result = manager.get_job_result("job-crash").unwrap().unwrap();
    let document: Value = serde_json::from_slice(&result.content).unwrap();
    assert_eq!(document["description"], "disk full");
}

#[tokio::test]
async fn test_invalid_parameters_create_nothing() {
    let temp = TempDir::new().unwrap();
    let manager = file_manager(&temp);
    let processor = ScriptedProcessor::default();
    let mut raw = params("ch.Planungszonen");
    raw.as_object_mut().unwrap().remove("catalog");

    let err = manager.submit(&processor, "job-bad", &raw).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigurationError);
    assert_eq!(err.message, "Cannot process without a catalog");
    assert_eq!(processor.executions.load(Ordering::SeqCst), 0);
    assert!(manager.get_job("job-bad").unwrap().is_none());
    assert!(manager.list_jobs().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_job_id_is_rejected() {
    let manager = JobManager::new(Arc::new(MemoryJobStore::new()), None);
    let processor = ScriptedProcessor::default();
    manager
        .submit(&processor, "job-1", &params("ch.A"))
        .await
        .unwrap();
    let err = manager
        .submit(&processor, "job-1", &params("ch.A"))
        .await
        .unwrap_err();
    assert_eq!(err.code, "JOB-003");
    assert_eq!(processor.executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_without_output_dir_no_result_is_available() {
    let manager = JobManager::new(Arc::new(MemoryJobStore::new()), None);
    let record = manager
        .submit(&ScriptedProcessor::default(), "job-mem", &params("ch.A"))
        .await
        .unwrap();
    assert_eq!(record.status, JobStatus::Successful);
    assert!(record.result_location.is_none());
    assert!(manager.get_job_result("job-mem").unwrap().is_none());
    assert!(manager.get_job_result("unknown").unwrap().is_none());
}

#[tokio::test]
async fn test_dismiss_and_delete() {
    let temp = TempDir::new().unwrap();
    let manager = file_manager(&temp);
    let processor = ScriptedProcessor::default();
    manager
        .submit(&processor, "job-a", &params("ch.A"))
        .await
        .unwrap();
    manager
        .submit(&processor, "job-b", &params("ch.B"))
        .await
        .unwrap();

    let listed: Vec<String> = manager
        .list_jobs()
        .unwrap()
        .into_iter()
        .map(|record| record.identifier)
        .collect();
    assert_eq!(listed, vec!["job-a", "job-b"]);

    let location = temp.path().join("results").join("mgdm2oereb-job-a.json");
    assert!(location.exists());
    let dismissed = manager.dismiss_job("job-a").unwrap().unwrap();
    assert_eq!(dismissed.status, JobStatus::Dismissed);
    assert!(!location.exists());
    assert!(manager.get_job_result("job-a").unwrap().is_none());

    assert!(manager.delete_job("job-b").unwrap());
    assert!(!manager.delete_job("job-b").unwrap());
    assert!(manager.dismiss_job("job-b").unwrap().is_none());
    assert_eq!(manager.list_jobs().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_jobs_share_one_file_store() {
    let temp = TempDir::new().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(FileJobStore::new(temp.path().join("jobs")).unwrap());
    let manager = Arc::new(JobManager::new(store.clone(), Some(temp.path().join("results"))));
    let processor = Arc::new(ScriptedProcessor::default());

    let mut handles = Vec::new();
    for n in 0..8 {
        let manager = manager.clone();
        let processor = processor.clone();
        handles.push(tokio::spawn(async move {
            manager
                .submit(processor.as_ref(), &format!("job-{}", n), &params("ch.A"))
                .await
        }));
    }
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Successful);
    }

    assert_eq!(store.list().unwrap().len(), 8);
    assert_eq!(processor.executions.load(Ordering::SeqCst), 8);
}
