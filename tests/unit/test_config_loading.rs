use mgdm2oereb::core::config::{ConfigLoader, JobStoreKind};
use mgdm2oereb::core::types::ErrorCategory;
use mgdm2oereb::logging::ConsoleOutput;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn clear_service_env() {
    for v in &[
        "MGDM2OEREB_CONFIG",
        "MGDM2OEREB_DATA",
        "MGDM2OEREB_JOB",
        "MGDM2OEREB_PATH",
        "ILIVALIDATOR_SERVICE",
        "MGDM2OEREB_POLL_INTERVAL",
        "MGDM2OEREB_VALIDATION_MAX_WAIT",
        "MGDM2OEREB_RESULT_XTF_NAME",
        "MGDM2OEREB_RESULT_OEREBLEX_XML_NAME",
        "MGDM2OEREB_OEREBLEX_TRAFO_PY",
        "MGDM2OEREB_OUTPUT_DIR",
        "MGDM2OEREB_LOG_LEVEL",
    ] {
        env::remove_var(v);
    }
}

/// Every section of the service config read from one file
#[test]
#[serial]
fn test_full_config_file() {
    clear_service_env();
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("mgdm2oereb.toml");
    let config_content = r#"
[paths]
data_dir = "/srv/data"
job_dir = "/srv/job"
trafo_root = "/opt/mgdm2oereb"
results_prefix = "results"

[names]
result_xtf = "Result.xtf"
lookup_result = "lookup.xml"

[validation]
service_url = "https://validator.example.org/api/v1"
poll_interval = "500ms"
max_wait = "5m"

[transform]
program = "/usr/local/bin/xsltproc"

[lookup]
program = "python3.11"
script = "scripts/download.py"

[jobs]
store = "memory"
output_dir = "/srv/outputs"

[pipeline]
base_stages = ["extract-input-zip", "fetch-catalog", "apply-transform"]

[logging]
default_level = "mgdm2oereb=debug"
enable_file = false
console_output = "stdout"
"#;
    fs::write(&config_path, config_content).unwrap();

    let config = ConfigLoader::load(Some(&config_path)).unwrap();

    assert_eq!(config.paths.data_dir, PathBuf::from("/srv/data"));
    assert_eq!(config.paths.xsl_dir(), PathBuf::from("/opt/mgdm2oereb/xsl"));
    assert_eq!(config.paths.results_prefix, "results");
    assert_eq!(config.names.result_xtf, "Result.xtf");
    assert_eq!(config.names.lookup_result, "lookup.xml");
    assert_eq!(
        config.validation.poll_interval().unwrap(),
        Duration::from_millis(500)
    );
    assert_eq!(config.validation.max_wait().unwrap(), Duration::from_secs(300));
    assert_eq!(config.transform.program, "/usr/local/bin/xsltproc");
    assert_eq!(
        config.lookup_script_path(),
        PathBuf::from("/opt/mgdm2oereb/scripts/download.py")
    );
    assert_eq!(config.jobs.store, JobStoreKind::Memory);
    assert_eq!(config.job_output_dir(), PathBuf::from("/srv/outputs"));
    assert_eq!(config.job_store_dir(), PathBuf::from("/srv/job/jobs"));
    assert_eq!(config.pipeline.base_stages.as_ref().unwrap().len(), 3);
    assert!(config.pipeline.extended_stages.is_none());
    assert!(!config.logging.enable_file);
    assert_eq!(config.logging.console_output, ConsoleOutput::Stdout);
}

#[test]
#[serial]
fn test_defaults_without_file() {
    clear_service_env();
    let temp_dir = TempDir::new().unwrap();
    let config = ConfigLoader::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();

    assert_eq!(config.paths.job_dir, PathBuf::from("/job"));
    assert_eq!(config.paths.results_prefix, "mgdm2oereb_results");
    assert_eq!(
        config.validation.service_url,
        "http://ilivalidator-service:8080/api/v1"
    );
    assert_eq!(config.validation.poll_interval().unwrap(), Duration::from_secs(1));
    assert_eq!(
        config.validation.max_wait().unwrap(),
        Duration::from_secs(30 * 60)
    );
    assert_eq!(config.transform.program, "xsltproc");
    assert_eq!(
        config.lookup_script_path(),
        PathBuf::from("/mgdm2oereb/oereblex.download.py")
    );
    assert_eq!(config.jobs.store, JobStoreKind::File);
    assert_eq!(config.job_output_dir(), PathBuf::from("/job/results"));
}

#[test]
#[serial]
fn test_legacy_environment_names() {
    clear_service_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("MGDM2OEREB_JOB", "/tmp/job");
    env::set_var("MGDM2OEREB_PATH", "/tmp/trafo");
    env::set_var("ILIVALIDATOR_SERVICE", "http://localhost:9000/api/v1");
    env::set_var("MGDM2OEREB_RESULT_OEREBLEX_XML_NAME", "links.xml");
    env::set_var("MGDM2OEREB_OEREBLEX_TRAFO_PY", "/abs/lookup.py");
    env::set_var("MGDM2OEREB_OUTPUT_DIR", "/tmp/out");
    env::set_var("MGDM2OEREB_LOG_LEVEL", "warn");

    let config = ConfigLoader::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();
    clear_service_env();

    assert_eq!(config.paths.job_dir, PathBuf::from("/tmp/job"));
    assert_eq!(config.paths.xsl_dir(), PathBuf::from("/tmp/trafo/xsl"));
    assert_eq!(config.validation.service_url, "http://localhost:9000/api/v1");
    assert_eq!(config.names.lookup_result, "links.xml");
    assert_eq!(config.lookup_script_path(), PathBuf::from("/abs/lookup.py"));
    assert_eq!(config.job_output_dir(), PathBuf::from("/tmp/out"));
    assert_eq!(config.logging.default_level, "warn");
}

#[test]
#[serial]
fn test_invalid_values_are_configuration_errors() {
    clear_service_env();
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("mgdm2oereb.toml");

    fs::write(&config_path, "[validation]\npoll_interval = \"soon\"\n").unwrap();
    let err = ConfigLoader::load(Some(&config_path)).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigurationError);
    assert_eq!(err.code, "CFG-002");

    fs::write(&config_path, "[validation]\nservice_url = \"ftp://validator\"\n").unwrap();
    let err = ConfigLoader::load(Some(&config_path)).unwrap_err();
    assert_eq!(err.code, "CFG-003");

    fs::write(&config_path, "[logging]\ndefault_level = \"mgdm2oereb=loud\"\n").unwrap();
    let err = ConfigLoader::load(Some(&config_path)).unwrap_err();
    assert_eq!(err.code, "CFG-004");

    fs::write(&config_path, "[jobs]\nstore = \"redis\"\n").unwrap();
    let err = ConfigLoader::load(Some(&config_path)).unwrap_err();
    assert_eq!(err.code, "CFG-001");
}
