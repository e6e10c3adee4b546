pub mod artifacts;
pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod jobs;
pub mod lookup;
pub mod pipeline;
pub mod processor;
pub mod transform;
pub mod types;
pub mod validation;

pub use artifacts::{ArtifactKind, ArtifactManager, ArtifactSet};
pub use config::{ConfigLoader, ServiceConfig};
pub use error::AppError;
pub use jobs::{JobManager, JobResult};
pub use pipeline::{JobParameters, Pipeline, PipelineVariant};
pub use processor::{Processor, ProcessorOutput, ProcessorSet};
pub use types::*;
