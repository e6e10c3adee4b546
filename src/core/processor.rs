#![allow(clippy::result_large_err)]

//! Processors bind a pipeline variant to a process identifier.

use crate::core::artifacts::{ArtifactManager, ArtifactSet};
use crate::core::config::ServiceConfig;
use crate::core::error::AppError;
use crate::core::pipeline::{
    JobParameters, Pipeline, PipelineVariant, StageRegistry, StageServices,
};
use crate::core::transform::Transformer;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const RESULT_MIMETYPE: &str = "application/json";

/// Mimetype plus the accumulated pipeline result.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorOutput {
    pub mimetype: String,
    pub outputs: Value,
}

#[async_trait]
pub trait Processor: Send + Sync {
    fn id(&self) -> &'static str;

    /// Validate raw request parameters; must not touch the filesystem.
    fn prepare(&self, raw: &Value) -> Result<JobParameters, AppError>;

    async fn execute(
        &self,
        job_id: &str,
        params: &JobParameters,
    ) -> Result<ProcessorOutput, AppError>;
}

pub struct TransformProcessor {
    variant: PipelineVariant,
    config: Arc<ServiceConfig>,
    pipeline: Pipeline,
}

impl TransformProcessor {
    pub fn new(variant: PipelineVariant, config: Arc<ServiceConfig>, pipeline: Pipeline) -> Self {
        TransformProcessor {
            variant,
            config,
            pipeline,
        }
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

#[async_trait]
impl Processor for TransformProcessor {
    fn id(&self) -> &'static str {
        self.variant.process_id()
    }

    fn prepare(&self, raw: &Value) -> Result<JobParameters, AppError> {
        Ok(self.variant.parse_parameters(raw)?)
    }

    async fn execute(
        &self,
        job_id: &str,
        params: &JobParameters,
    ) -> Result<ProcessorOutput, AppError> {
        if params.variant() != self.variant {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                format!(
                    "processor {} cannot run {} parameters",
                    self.id(),
                    params.variant()
                ),
            )
            .with_code("PIP-004"));
        }

        let manager = ArtifactManager::for_job(&self.config, job_id);
        let mut artifacts = ArtifactSet::allocate(manager, &self.config.names, params);
        let outcome = self.pipeline.run(params, &mut artifacts).await?;

        Ok(ProcessorOutput {
            mimetype: RESULT_MIMETYPE.to_string(),
            outputs: outcome.result.to_value(),
        })
    }
}

/// Every processor this service offers, keyed by process id.
#[derive(Clone, Default)]
pub struct ProcessorSet {
    processors: HashMap<&'static str, Arc<dyn Processor>>,
}

impl ProcessorSet {
    pub fn from_config(config: Arc<ServiceConfig>) -> Result<Self, AppError> {
        let services = Arc::new(StageServices::from_config(config.clone())?);
        Self::with_services(config, services)
    }

    /// Same as `from_config` but with a caller supplied transformation engine.
    pub fn with_transformer(
        config: Arc<ServiceConfig>,
        transformer: Arc<dyn Transformer>,
    ) -> Result<Self, AppError> {
        let services = Arc::new(StageServices::with_transformer(config.clone(), transformer)?);
        Self::with_services(config, services)
    }

    fn with_services(
        config: Arc<ServiceConfig>,
        services: Arc<StageServices>,
    ) -> Result<Self, AppError> {
        let registry = StageRegistry::builtin(services);
        let mut set = ProcessorSet::default();
        for variant in [PipelineVariant::Base, PipelineVariant::Extended] {
            let pipeline = Pipeline::for_variant(&registry, variant, &config.pipeline)?;
            set.insert(Arc::new(TransformProcessor::new(
                variant,
                config.clone(),
                pipeline,
            )));
        }
        Ok(set)
    }

    pub fn insert(&mut self, processor: Arc<dyn Processor>) {
        self.processors.insert(processor.id(), processor);
    }

    pub fn get(&self, process_id: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(process_id).cloned()
    }

    pub fn for_variant(&self, variant: PipelineVariant) -> Option<Arc<dyn Processor>> {
        self.get(variant.process_id())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.processors.keys().copied().collect();
        ids.sort();
        ids
    }
}
