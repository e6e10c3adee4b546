use chrono::{Duration, TimeZone, Utc};
use mgdm2oereb::core::artifacts::{
    artifact_file_name, discover, ArtifactKind, ArtifactManager, ArtifactSet,
};
use mgdm2oereb::core::config::NamesConfig;
use mgdm2oereb::core::pipeline::{JobParameters, PipelineVariant};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn params(variant: PipelineVariant, basket: Option<&str>) -> JobParameters {
    let mut raw = json!({
        "zip_file": "UEsFBg==",
        "theme_code": "ch.Planungszonen",
        "model_name": "Planungszonen_V1_1",
        "catalog": "https://example.org/catalog.xml",
        "external_host": "oereblex.example.org",
        "external_region": "BL",
        "fallback_office_name": "Amt",
        "fallback_office_url": "https://amt.example.org",
    });
    if let Some(basket) = basket {
        raw["target_basket_id"] = json!(basket);
    }
    variant.parse_parameters(&raw).unwrap()
}

fn manager(temp: &TempDir, job_id: &str) -> ArtifactManager {
    ArtifactManager::new(
        job_id,
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        temp.path().join(format!("working_{}", job_id)),
        temp.path().join("data"),
        "mgdm2oereb_results",
    )
}

#[test]
fn test_file_names_sort_by_creation_time() {
    let first = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
    let later = first + Duration::microseconds(1);
    let next_day = first + Duration::seconds(1);

    let mut names = vec![
        artifact_file_name(&next_day, "ch.T", None, "c", "input.xtf"),
        artifact_file_name(&later, "ch.T", None, "b", "input.xtf"),
        artifact_file_name(&first, "ch.T", None, "a", "input.xtf"),
    ];
    names.sort();
    assert!(names[0].contains(".a."));
    assert!(names[1].contains(".b."));
    assert!(names[2].starts_with("2024-01-10_000000_000000"));
}

#[test]
fn test_file_name_is_deterministic() {
    let at = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
    let a = artifact_file_name(&at, "ch.T", Some("b1"), "job", "rss.xml");
    let b = artifact_file_name(&at, "ch.T", Some("b1"), "job", "rss.xml");
    assert_eq!(a, b);
    assert_eq!(a, "2024-02-03_040506_000000.ch.T.b1.job.rss.xml");
}

#[test]
fn test_lookup_artifact_only_for_extended_jobs() {
    let temp = TempDir::new().unwrap();
    let names = NamesConfig::default();

    let base = ArtifactSet::allocate(
        manager(&temp, "job-1"),
        &names,
        &params(PipelineVariant::Base, None),
    );
    assert!(base.get(ArtifactKind::LookupResult).is_none());
    assert_eq!(base.iter().count(), 8);

    let extended = ArtifactSet::allocate(
        manager(&temp, "job-2"),
        &names,
        &params(PipelineVariant::Extended, None),
    );
    let lookup = extended.get(ArtifactKind::LookupResult).unwrap();
    assert_eq!(lookup.name, "oereblex.xml");
    assert_eq!(extended.iter().count(), 9);
}

#[test]
fn test_members_share_job_identity() {
    let temp = TempDir::new().unwrap();
    let set = ArtifactSet::allocate(
        manager(&temp, "job-3"),
        &NamesConfig::default(),
        &params(PipelineVariant::Base, Some("2771")),
    );
    for (_, artifact) in set.iter() {
        assert_eq!(artifact.job_id, "job-3");
        assert_eq!(artifact.theme_code, "ch.Planungszonen");
        assert_eq!(artifact.target_basket_id.as_deref(), Some("2771"));
        assert!(artifact
            .file_name()
            .starts_with("2024-06-01_120000_000000.ch.Planungszonen.2771.job-3."));
    }
}

#[test]
fn test_deferred_snippets_publish_once() {
    let temp = TempDir::new().unwrap();
    let mut set = ArtifactSet::allocate(
        manager(&temp, "job-4"),
        &NamesConfig::default(),
        &params(PipelineVariant::Base, None),
    );
    set.save_working(ArtifactKind::RssSnippet, b"<item/>").unwrap();
    set.save_and_publish(ArtifactKind::InputXtf, b"<TRANSFER/>")
        .unwrap();

    let published = set.publish_deferred().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "rss_snippet");
    assert!(published[0].1.starts_with("/mgdm2oereb_results/"));
    assert!(set.publish_deferred().unwrap().is_empty());

    let found = discover(&temp.path().join("data"), "job-4").unwrap();
    assert_eq!(found.len(), 2);
    let rss = found
        .iter()
        .find(|path| path.to_string_lossy().ends_with("rss.xml"))
        .unwrap();
    assert_eq!(fs::read(rss).unwrap(), b"<item/>");
}

#[test]
fn test_reading_unwritten_artifact_fails() {
    let temp = TempDir::new().unwrap();
    let set = ArtifactSet::allocate(
        manager(&temp, "job-5"),
        &NamesConfig::default(),
        &params(PipelineVariant::Base, None),
    );
    assert_eq!(
        set.read_working(ArtifactKind::Catalog).unwrap_err().code,
        "ART-003"
    );
    assert_eq!(
        set.working_path(ArtifactKind::LookupResult)
            .unwrap_err()
            .code,
        "ART-004"
    );
}
