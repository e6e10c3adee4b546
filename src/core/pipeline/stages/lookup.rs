#![allow(clippy::result_large_err)]

use crate::core::artifacts::{ArtifactKind, ArtifactSet};
use crate::core::error::AppError;
use crate::core::lookup::LookupRequest;
use crate::core::pipeline::parameters::JobParameters;
use crate::core::pipeline::result::{PartialResult, PipelineResult};
use crate::core::pipeline::stage::{Stage, StageId, StageServices};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves legal document links through the external lookup script.
pub struct ExternalLookupStage {
    services: Arc<StageServices>,
}

impl ExternalLookupStage {
    pub fn new(services: Arc<StageServices>) -> Self {
        ExternalLookupStage { services }
    }
}

#[async_trait]
impl Stage for ExternalLookupStage {
    fn id(&self) -> StageId {
        StageId::ExternalLookup
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        _result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        let extended = params.extended().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                "external-lookup needs the extended parameter set",
            )
            .with_code("PIP-003")
        })?;
        let config = &self.services.config;

        let request = LookupRequest {
            geolink_list_template: config.paths.xsl_dir().join(format!(
                "{}.oereblex.geolink_list.xsl",
                extended.base.model_name
            )),
            xtf_path: artifacts.working_path(ArtifactKind::InputXtf)?,
            result_path: artifacts
                .manager()
                .working_dir()
                .join(&config.names.lookup_result),
            host: extended.external_host.clone(),
            region: extended.external_region.clone(),
            fallback_office_name: extended.fallback_office_name.clone(),
            fallback_office_url: extended.fallback_office_url.clone(),
        };

        let bytes = self.services.lookup.run(&request).await?;
        let location = artifacts.save_and_publish(ArtifactKind::LookupResult, &bytes)?;
        Ok(PartialResult::new().with(ArtifactKind::LookupResult.result_key(), location))
    }
}
