//! Config Validation Tests
//!
//! Typo detection, operational range warnings and hard validation errors,
//! exercised through the public config API.

use depwarden::config::validation::{
    known_config_keys, suggest_correction, validate_operational_ranges, validate_unknown_keys,
};
use depwarden::config::{ConfigError, WardenConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_threshold_warns_with_suggestion() {
    let toml_str = r#"
[monitor]
failure_treshold = 4
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("failure_treshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("monitor.failure_threshold")
    );
}

#[test]
fn unknown_section_is_reported() {
    let warnings = validate_unknown_keys("[dashboard]\nport = 8080\n");
    assert!(warnings.iter().any(|w| w.field == "dashboard"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[monitor]
interval_secs = 90
failure_threshold = 3
log_dir = "/var/log/depwarden"

[runtime]
binary = "docker"
settle_secs = 15

[database]
env_file = "/srv/app/.env"
plugin_denylist = ["legacy_metrics"]

[[network.mirrors]]
url = "https://mirror.internal"
name = "Internal"
priority = 1
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn distant_typo_gets_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("monitor.zzzzzzzzzzzz", &known), None);
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn partial_file_keeps_defaults_elsewhere() {
    let config = WardenConfig::from_toml_str("[pull]\nmax_retries = 7\n").unwrap();
    assert_eq!(config.pull.max_retries, 7);
    assert_eq!(config.pull.backoff_base_secs, 2);
    assert_eq!(config.monitor.failure_threshold, 3);
    assert_eq!(config.database.connection_key, "DATABASE_URL");
}

#[test]
fn load_from_file_reports_path_on_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("depwarden.toml");
    std::fs::write(&path, "[monitor\ninterval_secs = 60\n").unwrap();

    match WardenConfig::load_from_file(&path) {
        Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn round_trip_through_toml_preserves_values() {
    let mut config = WardenConfig::default();
    config.monitor.interval_secs = 120;
    config.database.plugin_denylist = vec!["legacy_metrics".to_string()];

    let text = config.to_toml().unwrap();
    let back = WardenConfig::from_toml_str(&text).unwrap();

    assert_eq!(back.monitor.interval_secs, 120);
    assert_eq!(back.database.plugin_denylist, vec!["legacy_metrics"]);
    assert_eq!(back.network.mirrors.len(), config.network.mirrors.len());
}

#[test]
fn interval_shorter_than_probe_run_is_rejected() {
    let err = WardenConfig::from_toml_str("[monitor]\ninterval_secs = 5\n").unwrap_err();
    assert!(err.to_string().contains("worst-case probe duration"));
}

// ============================================================================
// Operational Ranges
// ============================================================================

#[test]
fn defaults_have_no_range_warnings() {
    assert!(validate_operational_ranges(&WardenConfig::default()).is_empty());
}

#[test]
fn empty_mirror_list_warns_but_loads() {
    let mut config = WardenConfig::default();
    config.network.mirrors.clear();
    assert!(config.validate().is_ok());

    let warnings = validate_operational_ranges(&config);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "network.mirrors");
}
