use async_trait::async_trait;
use chrono::Utc;
use mgdm2oereb::core::artifacts::{ArtifactKind, ArtifactManager, ArtifactSet};
use mgdm2oereb::core::config::{NamesConfig, PipelineConfig};
use mgdm2oereb::core::error::AppError;
use mgdm2oereb::core::pipeline::{
    JobParameters, PartialResult, Pipeline, PipelineResult, PipelineState, PipelineVariant,
    Stage, StageId, StageRegistry,
};
use mgdm2oereb::core::types::ErrorCategory;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

enum Behaviour {
    Emit(PartialResult),
    Raise,
    WriteSnippet,
}

struct FakeStage {
    id: StageId,
    behaviour: Behaviour,
    runs: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<PipelineResult>>>,
}

impl FakeStage {
    fn new(id: StageId, behaviour: Behaviour) -> Self {
        FakeStage {
            id,
            behaviour,
            runs: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Stage for FakeStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(
        &self,
        _params: &JobParameters,
        artifacts: &mut ArtifactSet,
        result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(result.clone());
        match &self.behaviour {
            Behaviour::Emit(partial) => Ok(partial.clone()),
            Behaviour::Raise => Err(AppError::new(ErrorCategory::IoError, "disk full")),
            Behaviour::WriteSnippet => {
                artifacts.save_working(ArtifactKind::JsonSnippet, b"{}")?;
                Ok(PartialResult::new())
            }
        }
    }
}

struct Fixture {
    _temp: TempDir,
    params: JobParameters,
    artifacts: ArtifactSet,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let params = PipelineVariant::Base
        .parse_parameters(&json!({
            "zip_file": "UEsFBg==",
            "theme_code": "ch.Planungszonen",
            "model_name": "Planungszonen_V1_1",
            "catalog": "https://example.org/catalog.xml",
        }))
        .unwrap();
    let manager = ArtifactManager::new(
        "job-1",
        Utc::now(),
        temp.path().join("working_job-1"),
        temp.path().join("data"),
        "mgdm2oereb_results",
    );
    let artifacts = ArtifactSet::allocate(manager, &NamesConfig::default(), &params);
    Fixture {
        _temp: temp,
        params,
        artifacts,
    }
}

#[tokio::test]
async fn test_failed_partial_stops_the_run() {
    let mut fx = fixture();
    let first = FakeStage::new(
        StageId::ExtractInputZip,
        Behaviour::Emit(PartialResult::new().with("input_xtf", "/r/input.xtf")),
    );
    let second = FakeStage::new(
        StageId::FetchCatalog,
        Behaviour::Emit(PartialResult::failed("Catalogue could not be downloaded. Response was: gone")),
    );
    let third = FakeStage::new(StageId::ApplyTransform, Behaviour::Emit(PartialResult::new()));
    let third_runs = third.runs.clone();

    let pipeline = Pipeline::new(vec![Arc::new(first), Arc::new(second), Arc::new(third)]);
    let outcome = pipeline.run(&fx.params, &mut fx.artifacts).await.unwrap();

    assert_eq!(outcome.state, PipelineState::Failed { index: 1 });
    assert_eq!(third_runs.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.history.len(), 2);

    let result = outcome.result.to_value();
    assert_eq!(
        result,
        json!({
            "theme_code": "ch.Planungszonen",
            "target_basket_id": null,
            "input_xtf": "/r/input.xtf",
            "status": "failed",
            "msg": "Catalogue could not be downloaded. Response was: gone",
            "task": "fetch-catalog",
            "step": 2,
        })
    );
}

#[tokio::test]
async fn test_stage_supplied_task_is_kept() {
    let mut fx = fixture();
    let stage = FakeStage::new(
        StageId::ValidateOutput,
        Behaviour::Emit(PartialResult::failed("nope").with("task", "custom")),
    );
    let outcome = Pipeline::new(vec![Arc::new(stage)])
        .run(&fx.params, &mut fx.artifacts)
        .await
        .unwrap();
    assert_eq!(outcome.result.get_str("task"), Some("custom"));
    assert_eq!(outcome.result.get("step"), Some(&Value::from(1)));
}

#[tokio::test]
async fn test_stages_see_the_accumulated_result() {
    let mut fx = fixture();
    let first = FakeStage::new(
        StageId::ExtractInputZip,
        Behaviour::Emit(PartialResult::new().with("theme_code", "overwritten")),
    );
    let second = FakeStage::new(StageId::ValidateInput, Behaviour::Emit(PartialResult::new()));
    let seen = second.seen.clone();

    let outcome = Pipeline::new(vec![Arc::new(first), Arc::new(second)])
        .run(&fx.params, &mut fx.artifacts)
        .await
        .unwrap();

    assert!(outcome.is_completed());
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].get_str("theme_code"), Some("overwritten"));
    assert_eq!(outcome.result.get_str("theme_code"), Some("overwritten"));
}

#[tokio::test]
async fn test_errors_propagate_with_stage_context() {
    let mut fx = fixture();
    let stage = FakeStage::new(StageId::ApplyTransform, Behaviour::Raise);
    let err = Pipeline::new(vec![Arc::new(stage)])
        .run(&fx.params, &mut fx.artifacts)
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::IoError);
    assert_eq!(
        err.context.get("stage").map(String::as_str),
        Some("apply-transform")
    );
    assert_eq!(err.context.get("step").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_snippets_are_published_only_on_success() {
    let mut fx = fixture();
    let writer = FakeStage::new(StageId::BuildStatusSnippet, Behaviour::WriteSnippet);
    let outcome = Pipeline::new(vec![Arc::new(writer)])
        .run(&fx.params, &mut fx.artifacts)
        .await
        .unwrap();
    assert!(outcome
        .result
        .get_str("json_snippet")
        .unwrap()
        .starts_with("/mgdm2oereb_results/"));

    let mut fx = fixture();
    let writer = FakeStage::new(StageId::BuildStatusSnippet, Behaviour::WriteSnippet);
    let failing = FakeStage::new(
        StageId::ValidateOutput,
        Behaviour::Emit(PartialResult::failed("Validation of output file failed.")),
    );
    let outcome = Pipeline::new(vec![Arc::new(writer), Arc::new(failing)])
        .run(&fx.params, &mut fx.artifacts)
        .await
        .unwrap();
    assert!(outcome.result.get("json_snippet").is_none());
    assert!(fx
        .artifacts
        .get(ArtifactKind::JsonSnippet)
        .unwrap()
        .published_path()
        .is_none());
}

#[test]
fn test_configured_stage_lists_override_defaults() {
    let mut builder = StageRegistry::builder();
    builder
        .register(FakeStage::new(StageId::ExtractInputZip, Behaviour::Emit(PartialResult::new())))
        .register(FakeStage::new(StageId::ApplyTransform, Behaviour::Emit(PartialResult::new())));
    let registry = builder.build();

    let config = PipelineConfig {
        base_stages: Some(vec!["extract-input-zip".into(), "apply-transform".into()]),
        extended_stages: None,
    };
    let pipeline = Pipeline::for_variant(&registry, PipelineVariant::Base, &config).unwrap();
    assert_eq!(pipeline.stage_names(), vec!["extract-input-zip", "apply-transform"]);

    let err = Pipeline::for_variant(&registry, PipelineVariant::Extended, &config)
        .err()
        .unwrap();
    assert_eq!(err.code, "PIP-002");
}
