#![allow(clippy::result_large_err)]

use crate::core::artifacts::ArtifactSet;
use crate::core::catalog::CatalogClient;
use crate::core::config::ServiceConfig;
use crate::core::error::AppError;
use crate::core::lookup::ExternalLookup;
use crate::core::pipeline::parameters::{JobParameters, PipelineVariant};
use crate::core::pipeline::result::{PartialResult, PipelineResult};
use crate::core::pipeline::stages;
use crate::core::transform::{Transformer, XsltprocTransformer};
use crate::core::types::ErrorCategory;
use crate::core::validation::{ValidationClient, ValidationSettings};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifiers stage lists are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    ExtractInputZip,
    ValidateInput,
    ExternalLookup,
    FetchCatalog,
    ApplyTransform,
    ValidateOutput,
    BuildSyndicationSnippet,
    BuildStatusSnippet,
}

impl StageId {
    pub const ALL: [StageId; 8] = [
        StageId::ExtractInputZip,
        StageId::ValidateInput,
        StageId::ExternalLookup,
        StageId::FetchCatalog,
        StageId::ApplyTransform,
        StageId::ValidateOutput,
        StageId::BuildSyndicationSnippet,
        StageId::BuildStatusSnippet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::ExtractInputZip => "extract-input-zip",
            StageId::ValidateInput => "validate-input",
            StageId::ExternalLookup => "external-lookup",
            StageId::FetchCatalog => "fetch-catalog",
            StageId::ApplyTransform => "apply-transform",
            StageId::ValidateOutput => "validate-output",
            StageId::BuildSyndicationSnippet => "build-syndication-snippet",
            StageId::BuildStatusSnippet => "build-status-snippet",
        }
    }

    pub fn defaults_for(variant: PipelineVariant) -> Vec<StageId> {
        let mut ids = vec![StageId::ExtractInputZip, StageId::ValidateInput];
        if variant == PipelineVariant::Extended {
            ids.push(StageId::ExternalLookup);
        }
        ids.extend([
            StageId::FetchCatalog,
            StageId::ApplyTransform,
            StageId::ValidateOutput,
            StageId::BuildSyndicationSnippet,
            StageId::BuildStatusSnippet,
        ]);
        ids
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        StageId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| format!("unknown stage '{}'", wanted))
    }
}

/// One step of a pipeline.
///
/// Expected failures come back as a partial with `status=failed`; errors are reserved for
/// conditions the job cannot recover from and travel past the engine.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn id(&self) -> StageId;

    fn name(&self) -> &'static str {
        self.id().as_str()
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        result: &PipelineResult,
    ) -> Result<PartialResult, AppError>;
}

/// Collaborators the built-in stages call out to.
pub struct StageServices {
    pub config: Arc<ServiceConfig>,
    pub validator: ValidationClient,
    pub catalog: CatalogClient,
    pub transformer: Arc<dyn Transformer>,
    pub lookup: ExternalLookup,
}

impl StageServices {
    pub fn from_config(config: Arc<ServiceConfig>) -> Result<Self, AppError> {
        let transformer: Arc<dyn Transformer> =
            Arc::new(XsltprocTransformer::new(config.transform.program.clone()));
        Self::with_transformer(config, transformer)
    }

    pub fn with_transformer(
        config: Arc<ServiceConfig>,
        transformer: Arc<dyn Transformer>,
    ) -> Result<Self, AppError> {
        let validator =
            ValidationClient::new(ValidationSettings::from_config(&config.validation)?)?;
        let lookup = ExternalLookup::new(config.lookup.program.clone(), config.lookup_script_path());
        Ok(StageServices {
            validator,
            catalog: CatalogClient::new()?,
            transformer,
            lookup,
            config,
        })
    }
}

/// Builder used to register stages before pipelines are assembled.
#[derive(Default)]
pub struct StageRegistryBuilder {
    stages: HashMap<StageId, Arc<dyn Stage>>,
}

impl StageRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A later registration under the same id replaces the earlier one.
    pub fn register<T: Stage>(&mut self, stage: T) -> &mut Self {
        let id = stage.id();
        if self.stages.insert(id, Arc::new(stage)).is_some() {
            tracing::warn!(stage = %id, "stage registered twice; keeping the later one");
        }
        self
    }

    pub fn build(self) -> StageRegistry {
        StageRegistry {
            inner: Arc::new(self.stages),
        }
    }
}

#[derive(Clone)]
pub struct StageRegistry {
    inner: Arc<HashMap<StageId, Arc<dyn Stage>>>,
}

impl StageRegistry {
    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::new()
    }

    /// Registry holding every built-in stage wired to `services`.
    pub fn builtin(services: Arc<StageServices>) -> StageRegistry {
        let mut builder = StageRegistryBuilder::new();
        stages::register_builtins(&mut builder, services);
        builder.build()
    }

    pub fn get(&self, id: StageId) -> Option<Arc<dyn Stage>> {
        self.inner.get(&id).cloned()
    }

    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Stage>>, AppError> {
        names
            .iter()
            .map(|name| {
                let id = StageId::from_str(name).map_err(|msg| {
                    AppError::new(ErrorCategory::ConfigurationError, msg).with_code("PIP-001")
                })?;
                self.get(id).ok_or_else(|| {
                    AppError::new(
                        ErrorCategory::ConfigurationError,
                        format!("stage '{}' is not registered", id),
                    )
                    .with_code("PIP-002")
                })
            })
            .collect()
    }
}
