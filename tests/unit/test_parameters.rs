use mgdm2oereb::core::error::AppError;
use mgdm2oereb::core::pipeline::parameters::ParameterError;
use mgdm2oereb::core::pipeline::PipelineVariant;
use mgdm2oereb::core::types::ErrorCategory;
use serde_json::{json, Value};

fn payload() -> Value {
    json!({
        "zip_file": "UEsFBg==",
        "theme_code": "ch.Planungszonen",
        "model_name": "Planungszonen_V1_1",
        "catalog": "https://example.org/catalog.xml",
        "target_basket_id": "2771",
        "input_validation": false,
    })
}

#[test]
fn test_each_required_field_is_named_when_missing() {
    for field in ["zip_file", "theme_code", "model_name", "catalog"] {
        let mut raw = payload();
        raw.as_object_mut().unwrap().remove(field);
        let err = PipelineVariant::Base.parse_parameters(&raw).unwrap_err();
        assert_eq!(err.to_string(), format!("Cannot process without a {}", field));
    }
}

#[test]
fn test_blank_required_field_counts_as_missing() {
    let mut raw = payload();
    raw["theme_code"] = json!("   ");
    let err = PipelineVariant::Base.parse_parameters(&raw).unwrap_err();
    assert!(matches!(err, ParameterError::Missing("theme_code")));
}

#[test]
fn test_optional_fields_are_carried() {
    let params = PipelineVariant::Base.parse_parameters(&payload()).unwrap();
    let base = params.base();
    assert_eq!(base.target_basket_id.as_deref(), Some("2771"));
    assert!(!base.input_validation);
    assert_eq!(base.catalog.host_str(), Some("example.org"));
    assert!(params.extended().is_none());
}

#[test]
fn test_extended_variant_requires_lookup_fields() {
    let err = PipelineVariant::Extended
        .parse_parameters(&payload())
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot process without a external_host");

    let mut raw = payload();
    raw["external_host"] = json!("oereblex.example.org");
    raw["external_region"] = json!("BL");
    raw["fallback_office_name"] = json!("Amt");
    let err = PipelineVariant::Extended.parse_parameters(&raw).unwrap_err();
    assert_eq!(err.to_string(), "Cannot process without a fallback_office_url");
}

#[test]
fn test_invalid_catalog_and_non_object_payloads() {
    let mut raw = payload();
    raw["catalog"] = json!("not a url");
    let err: AppError = PipelineVariant::Base
        .parse_parameters(&raw)
        .unwrap_err()
        .into();
    assert_eq!(err.category, ErrorCategory::ConfigurationError);
    assert_eq!(err.code, "PAR-002");

    let err: AppError = PipelineVariant::Base
        .parse_parameters(&json!(["zip_file"]))
        .unwrap_err()
        .into();
    assert_eq!(err.code, "PAR-003");
}

#[test]
fn test_variant_names() {
    assert_eq!(
        "extended".parse::<PipelineVariant>().unwrap(),
        PipelineVariant::Extended
    );
    assert_eq!(
        "mgdm2oereb-oereblex".parse::<PipelineVariant>().unwrap(),
        PipelineVariant::Extended
    );
    assert_eq!(
        "mgdm2oereb".parse::<PipelineVariant>().unwrap(),
        PipelineVariant::Base
    );
    assert!("oereblex".parse::<PipelineVariant>().is_err());
    assert_eq!(PipelineVariant::Extended.to_string(), "extended");
}

#[test]
fn test_names_that_would_escape_the_results_directory() {
    let mut raw = payload();
    raw["theme_code"] = json!("x/../../..");
    let err: AppError = PipelineVariant::Base
        .parse_parameters(&raw)
        .unwrap_err()
        .into();
    assert_eq!(err.category, ErrorCategory::ConfigurationError);
    assert_eq!(err.code, "PAR-004");

    let mut raw = payload();
    raw["target_basket_id"] = json!("../escape");
    let err = PipelineVariant::Base.parse_parameters(&raw).unwrap_err();
    assert!(matches!(
        err,
        ParameterError::UnsafeName {
            field: "target_basket_id",
            ..
        }
    ));
}
