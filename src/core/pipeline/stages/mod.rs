pub mod catalog;
pub mod extract;
pub mod lookup;
pub mod snippets;
pub mod transform;
pub mod validate;

use crate::core::pipeline::stage::{StageRegistryBuilder, StageServices};
use std::sync::Arc;

/// Register built-in stages into the supplied builder.
pub fn register_builtins(builder: &mut StageRegistryBuilder, services: Arc<StageServices>) {
    builder
        .register(extract::ExtractInputZip::new())
        .register(validate::ValidateInput::new(services.clone()))
        .register(lookup::ExternalLookupStage::new(services.clone()))
        .register(catalog::FetchCatalog::new(services.clone()))
        .register(transform::ApplyTransform::new(services.clone()))
        .register(validate::ValidateOutput::new(services))
        .register(snippets::BuildSyndicationSnippet::new())
        .register(snippets::BuildStatusSnippet::new());
}
