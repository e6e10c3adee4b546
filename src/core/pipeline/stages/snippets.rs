#![allow(clippy::result_large_err)]

//! Feed and status snippets announcing a finished transformation.
//!
//! Both stages only write working copies; the engine publishes them after the last stage.

use crate::core::artifacts::{ArtifactKind, ArtifactSet};
use crate::core::error::AppError;
use crate::core::pipeline::parameters::JobParameters;
use crate::core::pipeline::result::{PartialResult, PipelineResult};
use crate::core::pipeline::stage::{Stage, StageId};
use async_trait::async_trait;
use serde_json::{json, Value};

/// The engine stops at the first failed partial, so with the built-in stages the snippet
/// stages only ever run after a successful pipeline and this is always `true`. It turns `false`
/// only for a registered custom stage that sets `output_validation_failed` without failing.
fn transformation_successful(result: &PipelineResult) -> bool {
    !result.is_failed() && result.get("output_validation_failed") != Some(&Value::Bool(true))
}

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

pub fn rss_item(
    artifacts: &ArtifactSet,
    params: &JobParameters,
    successful: bool,
) -> String {
    let manager = artifacts.manager();
    let base = params.base();
    let link = xml_escape(&format!(
        "{}/{}/index.html",
        manager.results_prefix(),
        manager.job_id()
    ));
    let theme = xml_escape(&base.theme_code);
    let model = xml_escape(&base.model_name);
    let basket = xml_escape(base.target_basket_id.as_deref().unwrap_or("-"));
    let (state, published) = if successful {
        ("successful", "was successful and is published now")
    } else {
        ("failed", "failed and was NOT published")
    };

    format!(
        concat!(
            "<item>\n",
            "  <guid isPermaLink=\"true\">{link}</guid>\n",
            "  <title>Transformation {state} (theme: {theme}, model: {model})</title>\n",
            "  <description>The MGDM2OEREB transformation from MGDM {model} to OeREBKRM_V2_0 ",
            "for {theme} (Basket ID: {basket}) {published}.</description>\n",
            "  <link>{link}</link>\n",
            "  <pubDate>{date}</pubDate>\n",
            "</item>\n"
        ),
        link = link,
        state = state,
        theme = theme,
        model = model,
        basket = basket,
        published = published,
        date = manager.timestamp().to_rfc2822(),
    )
}

pub fn status_document(artifacts: &ArtifactSet, params: &JobParameters, successful: bool) -> Value {
    let manager = artifacts.manager();
    let base = params.base();
    json!({
        "job_id": manager.job_id(),
        "theme_code": base.theme_code,
        "target_basket_id": base.target_basket_id,
        "model": base.model_name,
        "time_stamp": manager.timestamp().to_rfc3339(),
        "successful": successful,
    })
}

#[derive(Default)]
pub struct BuildSyndicationSnippet;

impl BuildSyndicationSnippet {
    pub fn new() -> Self {
        BuildSyndicationSnippet
    }
}

#[async_trait]
impl Stage for BuildSyndicationSnippet {
    fn id(&self) -> StageId {
        StageId::BuildSyndicationSnippet
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        let item = rss_item(artifacts, params, transformation_successful(result));
        artifacts.save_working(ArtifactKind::RssSnippet, item.as_bytes())?;
        Ok(PartialResult::new())
    }
}

#[derive(Default)]
pub struct BuildStatusSnippet;

impl BuildStatusSnippet {
    pub fn new() -> Self {
        BuildStatusSnippet
    }
}

#[async_trait]
impl Stage for BuildStatusSnippet {
    fn id(&self) -> StageId {
        StageId::BuildStatusSnippet
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        let document = status_document(artifacts, params, transformation_successful(result));
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        bytes.push(b'\n');
        artifacts.save_working(ArtifactKind::JsonSnippet, &bytes)?;
        Ok(PartialResult::new())
    }
}
