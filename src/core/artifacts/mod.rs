#![allow(clippy::result_large_err)]

//! Named job files: one private working copy per artifact and at most one published copy.
//!
//! File names follow `{timestamp}.{theme_code}[.{target_basket_id}].{job_id}.{name}` so that
//! every file of a job shares a prefix and sorts by creation time.

use crate::core::config::{NamesConfig, ServiceConfig};
use crate::core::error::AppError;
use crate::core::pipeline::parameters::JobParameters;
use crate::core::types::ErrorCategory;
use crate::utils::atomic_write;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// UTC, microsecond precision, no `.` so the dotted file name stays unambiguous.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S_%6f";

pub const INPUT_ZIP: &str = "input.zip";
pub const INPUT_XTF: &str = "input.xtf";
pub const INPUT_VALIDATION_LOG: &str = "input.ili.log";
pub const OUTPUT_VALIDATION_LOG: &str = "output.ili.log";
pub const CATALOG: &str = "supplement_catalog.xtf";
pub const RSS_SNIPPET: &str = "rss.xml";
pub const JSON_SNIPPET: &str = "job.json";

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn artifact_file_name(
    timestamp: &DateTime<Utc>,
    theme_code: &str,
    target_basket_id: Option<&str>,
    job_id: &str,
    name: &str,
) -> String {
    let time_string = format_timestamp(timestamp);
    match target_basket_id {
        Some(basket) => [time_string.as_str(), theme_code, basket, job_id, name].join("."),
        None => [time_string.as_str(), theme_code, job_id, name].join("."),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub job_id: String,
    pub theme_code: String,
    pub target_basket_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    working_path: Option<PathBuf>,
    published_path: Option<PathBuf>,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        artifact_file_name(
            &self.timestamp,
            &self.theme_code,
            self.target_basket_id.as_deref(),
            &self.job_id,
            &self.name,
        )
    }

    pub fn working_path(&self) -> Option<&Path> {
        self.working_path.as_deref()
    }

    pub fn published_path(&self) -> Option<&Path> {
        self.published_path.as_deref()
    }
}

/// Allocates and writes the artifacts of exactly one job.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    job_id: String,
    timestamp: DateTime<Utc>,
    working_dir: PathBuf,
    published_dir: PathBuf,
    results_prefix: String,
}

impl ArtifactManager {
    pub fn new(
        job_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        working_dir: PathBuf,
        published_dir: PathBuf,
        results_prefix: impl Into<String>,
    ) -> Self {
        ArtifactManager {
            job_id: job_id.into(),
            timestamp,
            working_dir,
            published_dir,
            results_prefix: results_prefix.into(),
        }
    }

    /// Working files under `{job_dir}/working_{job_id}`, published files under `data_dir`.
    pub fn for_job(config: &ServiceConfig, job_id: &str) -> Self {
        ArtifactManager::new(
            job_id,
            Utc::now(),
            config.paths.job_dir.join(format!("working_{}", job_id)),
            config.paths.data_dir.clone(),
            config.paths.results_prefix.clone(),
        )
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn published_dir(&self) -> &Path {
        &self.published_dir
    }

    pub fn results_prefix(&self) -> &str {
        &self.results_prefix
    }

    pub fn create(&self, name: &str, theme_code: &str, target_basket_id: Option<&str>) -> Artifact {
        Artifact {
            name: name.to_string(),
            job_id: self.job_id.clone(),
            theme_code: theme_code.to_string(),
            target_basket_id: target_basket_id.map(str::to_string),
            timestamp: self.timestamp,
            working_path: None,
            published_path: None,
        }
    }

    pub fn save_working(&self, artifact: &mut Artifact, bytes: &[u8]) -> Result<PathBuf, AppError> {
        if artifact.working_path.is_some() {
            return Err(already_written(artifact, "working"));
        }
        let path = contained_path(&self.working_dir, artifact)?;
        atomic_write(&path, bytes)?;
        artifact.working_path = Some(path.clone());
        Ok(path)
    }

    pub fn save_published(
        &self,
        artifact: &mut Artifact,
        bytes: &[u8],
    ) -> Result<PathBuf, AppError> {
        if artifact.working_path.is_none() {
            return Err(AppError::new(
                ErrorCategory::ArtifactError,
                format!(
                    "{} cannot be published before its working copy exists",
                    artifact.file_name()
                ),
            )
            .with_code("ART-002"));
        }
        if artifact.published_path.is_some() {
            return Err(already_written(artifact, "published"));
        }
        let path = contained_path(&self.published_dir, artifact)?;
        atomic_write(&path, bytes)?;
        artifact.published_path = Some(path.clone());
        Ok(path)
    }

    /// Location advertised to clients: `/{results_prefix}/{file_name}`.
    pub fn location(&self, artifact: &Artifact) -> String {
        format!(
            "/{}/{}",
            self.results_prefix.trim_matches('/'),
            artifact.file_name()
        )
    }
}

/// `dir/{file_name}`, refusing names that would resolve anywhere but directly inside `dir`.
fn contained_path(dir: &Path, artifact: &Artifact) -> Result<PathBuf, AppError> {
    let file_name = artifact.file_name();
    let mut components = Path::new(&file_name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == file_name.as_str()
    );
    let path = dir.join(&file_name);
    if !single || file_name.contains(['\\', '\0']) || path.parent() != Some(dir) {
        let mut err = AppError::new(
            ErrorCategory::ArtifactError,
            format!(
                "artifact name '{}' does not stay inside {}",
                file_name,
                dir.display()
            ),
        )
        .with_code("ART-005");
        err.add_context("job_id", &artifact.job_id);
        return Err(err);
    }
    Ok(path)
}

fn already_written(artifact: &Artifact, copy: &str) -> AppError {
    let mut err = AppError::new(
        ErrorCategory::ArtifactError,
        format!(
            "{} copy of {} was already written",
            copy,
            artifact.file_name()
        ),
    )
    .with_code("ART-001");
    err.add_context("job_id", &artifact.job_id);
    err
}

/// Published files whose name contains `needle` (a job id or basket id), sorted by name.
pub fn discover(published_dir: &Path, needle: &str) -> Result<Vec<PathBuf>, AppError> {
    if needle.trim().is_empty() || !published_dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(published_dir).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to list {}: {}", published_dir.display(), err),
        )
    })?;
    let mut found: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().contains(needle))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    Ok(found)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    InputZip,
    InputXtf,
    InputValidationLog,
    LookupResult,
    Catalog,
    TransformResult,
    OutputValidationLog,
    RssSnippet,
    JsonSnippet,
}

impl ArtifactKind {
    /// Snippets are only published once every stage has succeeded.
    pub fn is_deferred(&self) -> bool {
        matches!(self, ArtifactKind::RssSnippet | ArtifactKind::JsonSnippet)
    }

    /// Result key the published location is reported under.
    pub fn result_key(&self) -> &'static str {
        match self {
            ArtifactKind::InputZip => "input_zip",
            ArtifactKind::InputXtf => "input_xtf",
            ArtifactKind::InputValidationLog => "input_validation_log",
            ArtifactKind::LookupResult => "oereblex_trafo_result",
            ArtifactKind::Catalog => "used_catalog",
            ArtifactKind::TransformResult => "transformation_result",
            ArtifactKind::OutputValidationLog => "output_validation_log",
            ArtifactKind::RssSnippet => "rss_snippet",
            ArtifactKind::JsonSnippet => "json_snippet",
        }
    }
}

/// The fixed artifacts of one job, all sharing job id, theme code and basket id.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    manager: ArtifactManager,
    artifacts: IndexMap<ArtifactKind, Artifact>,
}

impl ArtifactSet {
    pub fn allocate(manager: ArtifactManager, names: &NamesConfig, params: &JobParameters) -> Self {
        let base = params.base();
        let basket = base.target_basket_id.as_deref();
        let mut kinds = vec![
            (ArtifactKind::InputZip, INPUT_ZIP),
            (ArtifactKind::InputXtf, INPUT_XTF),
            (ArtifactKind::InputValidationLog, INPUT_VALIDATION_LOG),
        ];
        if params.extended().is_some() {
            kinds.push((ArtifactKind::LookupResult, names.lookup_result.as_str()));
        }
        kinds.extend([
            (ArtifactKind::Catalog, CATALOG),
            (ArtifactKind::TransformResult, names.result_xtf.as_str()),
            (ArtifactKind::OutputValidationLog, OUTPUT_VALIDATION_LOG),
            (ArtifactKind::RssSnippet, RSS_SNIPPET),
            (ArtifactKind::JsonSnippet, JSON_SNIPPET),
        ]);

        let artifacts = kinds
            .into_iter()
            .map(|(kind, name)| (kind, manager.create(name, &base.theme_code, basket)))
            .collect();

        ArtifactSet { manager, artifacts }
    }

    pub fn manager(&self) -> &ArtifactManager {
        &self.manager
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactKind, &Artifact)> {
        self.artifacts.iter()
    }

    pub fn save_working(&mut self, kind: ArtifactKind, bytes: &[u8]) -> Result<PathBuf, AppError> {
        let artifact = self.artifacts.get_mut(&kind).ok_or_else(|| not_allocated(kind))?;
        self.manager.save_working(artifact, bytes)
    }

    /// Publish and return the advertised location.
    pub fn publish(&mut self, kind: ArtifactKind, bytes: &[u8]) -> Result<String, AppError> {
        let artifact = self.artifacts.get_mut(&kind).ok_or_else(|| not_allocated(kind))?;
        self.manager.save_published(artifact, bytes)?;
        Ok(self.manager.location(artifact))
    }

    /// Working copy followed by published copy of the same bytes.
    pub fn save_and_publish(
        &mut self,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        self.save_working(kind, bytes)?;
        self.publish(kind, bytes)
    }

    pub fn working_path(&self, kind: ArtifactKind) -> Result<PathBuf, AppError> {
        let artifact = self.get(kind).ok_or_else(|| not_allocated(kind))?;
        artifact.working_path().map(Path::to_path_buf).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ArtifactError,
                format!("working copy of {} has not been written", artifact.file_name()),
            )
            .with_code("ART-003")
        })
    }

    pub fn read_working(&self, kind: ArtifactKind) -> Result<Vec<u8>, AppError> {
        let path = self.working_path(kind)?;
        fs::read(&path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
        })
    }

    pub fn location(&self, kind: ArtifactKind) -> Result<String, AppError> {
        let artifact = self.get(kind).ok_or_else(|| not_allocated(kind))?;
        Ok(self.manager.location(artifact))
    }

    /// Publish every deferred artifact that has a working copy; returns (result key, location).
    pub fn publish_deferred(&mut self) -> Result<Vec<(&'static str, String)>, AppError> {
        let pending: Vec<ArtifactKind> = self
            .artifacts
            .iter()
            .filter(|(kind, artifact)| {
                kind.is_deferred()
                    && artifact.working_path().is_some()
                    && artifact.published_path().is_none()
            })
            .map(|(kind, _)| *kind)
            .collect();

        let mut published = Vec::with_capacity(pending.len());
        for kind in pending {
            let bytes = self.read_working(kind)?;
            let location = self.publish(kind, &bytes)?;
            published.push((kind.result_key(), location));
        }
        Ok(published)
    }
}

fn not_allocated(kind: ArtifactKind) -> AppError {
    AppError::new(
        ErrorCategory::ArtifactError,
        format!("artifact {:?} is not part of this job", kind),
    )
    .with_code("ART-004")
}
