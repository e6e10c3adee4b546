#![allow(clippy::result_large_err)]

//! Ordered stage execution with short-circuit on the first failed partial.

pub mod parameters;
pub mod result;
pub mod stage;
pub mod stages;

pub use parameters::{ExtendedParameters, JobParameters, Parameters, PipelineVariant};
pub use result::{PartialResult, PipelineResult};
pub use stage::{Stage, StageId, StageRegistry, StageRegistryBuilder, StageServices};

use crate::core::artifacts::ArtifactSet;
use crate::core::config::PipelineConfig;
use crate::core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Running { index: usize },
    Failed { index: usize },
    Completed,
}

/// What one stage contributed, kept for auditing.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: String,
    pub step: usize,
    pub partial: PartialResult,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub result: PipelineResult,
    pub history: Vec<StageRecord>,
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == PipelineState::Completed
    }
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Pipeline { stages }
    }

    /// Stage list of `variant`, taken from `[pipeline]` when configured.
    pub fn for_variant(
        registry: &StageRegistry,
        variant: PipelineVariant,
        config: &PipelineConfig,
    ) -> Result<Self, AppError> {
        let configured = match variant {
            PipelineVariant::Base => config.base_stages.clone(),
            PipelineVariant::Extended => config.extended_stages.clone(),
        };
        let names = configured.unwrap_or_else(|| {
            StageId::defaults_for(variant)
                .into_iter()
                .map(|id| id.as_str().to_string())
                .collect()
        });
        Ok(Pipeline::new(registry.resolve(&names)?))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
    ) -> Result<PipelineOutcome, AppError> {
        let base = params.base();
        let job_id = artifacts.manager().job_id().to_string();
        let mut result =
            PipelineResult::initial(&base.theme_code, base.target_basket_id.as_deref());
        let mut history = Vec::with_capacity(self.stages.len());
        let mut state = PipelineState::Pending;
        tracing::debug!(job_id = %job_id, ?state, stages = ?self.stage_names(), "pipeline prepared");

        for (index, stage) in self.stages.iter().enumerate() {
            state = PipelineState::Running { index };
            let step = index + 1;
            let name = stage.name();
            let started = Instant::now();
            tracing::debug!(job_id = %job_id, ?state, stage = name, "stage started");

            let mut partial = stage.run(params, artifacts, &result).await.map_err(|mut err| {
                err.add_context("stage", name);
                err.add_context("step", &step.to_string());
                err
            })?;
            let failed = partial.is_failed();
            if failed {
                partial.stamp(name, step);
            }
            result = result.merge(&partial);

            let duration = started.elapsed();
            tracing::info!(
                job_id = %job_id,
                stage = name,
                step,
                status = if failed { "failed" } else { "ok" },
                duration_ms = duration.as_millis() as u64,
                "stage finished"
            );
            history.push(StageRecord {
                stage: name.to_string(),
                step,
                partial,
                duration,
            });

            if failed {
                state = PipelineState::Failed { index };
                tracing::warn!(
                    job_id = %job_id,
                    stage = name,
                    msg = result.message().unwrap_or_default(),
                    "pipeline stopped"
                );
                return Ok(PipelineOutcome {
                    state,
                    result,
                    history,
                });
            }
        }

        let mut completion = PartialResult::new();
        for (key, location) in artifacts.publish_deferred()? {
            completion.insert(key, location);
        }
        result = result.merge(&completion);
        state = PipelineState::Completed;
        tracing::info!(job_id = %job_id, ?state, keys = result.len(), "pipeline completed");

        Ok(PipelineOutcome {
            state,
            result,
            history,
        })
    }
}
