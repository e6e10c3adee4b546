#![allow(clippy::result_large_err)]

use crate::core::artifacts::{ArtifactKind, ArtifactSet};
use crate::core::error::AppError;
use crate::core::pipeline::parameters::JobParameters;
use crate::core::pipeline::result::{PartialResult, PipelineResult};
use crate::core::pipeline::stage::{Stage, StageId, StageServices};
use crate::core::transform::TransformParams;
use async_trait::async_trait;
use std::sync::Arc;

/// Applies `{xsl_dir}/{model}.trafo.xsl` to the input XTF.
pub struct ApplyTransform {
    services: Arc<StageServices>,
}

impl ApplyTransform {
    pub fn new(services: Arc<StageServices>) -> Self {
        ApplyTransform { services }
    }

    fn params(
        &self,
        params: &JobParameters,
        artifacts: &ArtifactSet,
    ) -> Result<TransformParams, AppError> {
        let base = params.base();
        let xsl_dir = self.services.config.paths.xsl_dir();
        let mut out = TransformParams::new();
        out.insert(
            "catalog".to_string(),
            artifacts
                .working_path(ArtifactKind::Catalog)?
                .to_string_lossy()
                .into_owned(),
        );
        out.insert("theme_code".to_string(), base.theme_code.clone());
        out.insert("model".to_string(), base.model_name.clone());
        out.insert(
            "target_basket_id".to_string(),
            base.target_basket_id.clone().unwrap_or_default(),
        );
        out.insert(
            "xsl_path".to_string(),
            xsl_dir.to_string_lossy().into_owned(),
        );
        if let Some(extended) = params.extended() {
            out.insert(
                "oereblex_output".to_string(),
                artifacts
                    .working_path(ArtifactKind::LookupResult)?
                    .to_string_lossy()
                    .into_owned(),
            );
            out.insert("oereblex_host".to_string(), extended.external_host.clone());
        }
        Ok(out)
    }
}

#[async_trait]
impl Stage for ApplyTransform {
    fn id(&self) -> StageId {
        StageId::ApplyTransform
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        _result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        let template = self
            .services
            .config
            .paths
            .xsl_dir()
            .join(format!("{}.trafo.xsl", params.base().model_name));
        let input = artifacts.working_path(ArtifactKind::InputXtf)?;
        let transform_params = self.params(params, artifacts)?;

        let bytes = match self
            .services
            .transformer
            .transform(&template, &input, &transform_params)
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(template = %template.display(), error = %err, "transformation failed");
                return Ok(PartialResult::failed(format!(
                    "Transformation failed: {}",
                    err.message
                )));
            }
        };

        let location = artifacts.save_and_publish(ArtifactKind::TransformResult, &bytes)?;
        Ok(PartialResult::new().with(ArtifactKind::TransformResult.result_key(), location))
    }
}
