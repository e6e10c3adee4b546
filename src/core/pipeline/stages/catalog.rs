#![allow(clippy::result_large_err)]

use crate::core::artifacts::{ArtifactKind, ArtifactSet};
use crate::core::error::AppError;
use crate::core::pipeline::parameters::JobParameters;
use crate::core::pipeline::result::{PartialResult, PipelineResult};
use crate::core::pipeline::stage::{Stage, StageId, StageServices};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::sync::Arc;

pub struct FetchCatalog {
    services: Arc<StageServices>,
}

impl FetchCatalog {
    pub fn new(services: Arc<StageServices>) -> Self {
        FetchCatalog { services }
    }
}

#[async_trait]
impl Stage for FetchCatalog {
    fn id(&self) -> StageId {
        StageId::FetchCatalog
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        _result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        let catalog = &params.base().catalog;
        let bytes = match self.services.catalog.fetch(catalog).await {
            Ok(bytes) => bytes,
            Err(err) if err.category == ErrorCategory::CatalogError => {
                tracing::warn!(url = %catalog, error = %err.message, "catalog download failed");
                return Ok(PartialResult::failed(err.message));
            }
            Err(err) => return Err(err),
        };
        let location = artifacts.save_and_publish(ArtifactKind::Catalog, &bytes)?;
        Ok(PartialResult::new().with(ArtifactKind::Catalog.result_key(), location))
    }
}
