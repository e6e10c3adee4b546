#![allow(clippy::result_large_err)]

use crate::core::artifacts::{ArtifactKind, ArtifactSet};
use crate::core::error::AppError;
use crate::core::pipeline::parameters::JobParameters;
use crate::core::pipeline::result::{PartialResult, PipelineResult};
use crate::core::pipeline::stage::{Stage, StageId, StageServices};
use async_trait::async_trait;
use std::sync::Arc;

pub const INPUT_REJECTED: &str = "Validation of input file failed.";
pub const OUTPUT_REJECTED: &str = "Validation of output file failed.";

/// Validates the extracted input unless the job opted out.
pub struct ValidateInput {
    services: Arc<StageServices>,
}

impl ValidateInput {
    pub fn new(services: Arc<StageServices>) -> Self {
        ValidateInput { services }
    }
}

#[async_trait]
impl Stage for ValidateInput {
    fn id(&self) -> StageId {
        StageId::ValidateInput
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        _result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        if !params.base().input_validation {
            tracing::debug!("input validation disabled for this job");
            return Ok(PartialResult::new());
        }

        let content = artifacts.read_working(ArtifactKind::InputXtf)?;
        let outcome = self
            .services
            .validator
            .validate(content, &self.services.config.names.result_xtf, false)
            .await?;
        let location = artifacts.save_and_publish(ArtifactKind::InputValidationLog, &outcome.log)?;

        let partial =
            PartialResult::new().with(ArtifactKind::InputValidationLog.result_key(), location);
        if outcome.failed {
            return Ok(partial.fail(INPUT_REJECTED));
        }
        Ok(partial)
    }
}

/// Validates the transformation result in strict mode.
pub struct ValidateOutput {
    services: Arc<StageServices>,
}

impl ValidateOutput {
    pub fn new(services: Arc<StageServices>) -> Self {
        ValidateOutput { services }
    }
}

#[async_trait]
impl Stage for ValidateOutput {
    fn id(&self) -> StageId {
        StageId::ValidateOutput
    }

    async fn run(
        &self,
        _params: &JobParameters,
        artifacts: &mut ArtifactSet,
        _result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        let content = artifacts.read_working(ArtifactKind::TransformResult)?;
        let outcome = self
            .services
            .validator
            .validate(content, &self.services.config.names.result_xtf, true)
            .await?;
        let location =
            artifacts.save_and_publish(ArtifactKind::OutputValidationLog, &outcome.log)?;

        let partial = PartialResult::new()
            .with(ArtifactKind::OutputValidationLog.result_key(), location)
            .with("output_validation_failed", outcome.failed);
        if outcome.failed {
            return Ok(partial.fail(OUTPUT_REJECTED));
        }
        Ok(partial)
    }
}
