//! # Configuration Loading Tests
//!
//! File-based loading of the alias table, pattern config and forwarder
//! allowlist, including the fail-fast paths.

use chat_orders::{
    CompanyAliasTable, ConfigError, ForwarderConfig, OrderParser, QuantityPatternConfig,
};
use std::io::Write;
use tempfile::NamedTempFile;

const PATTERNS: &str = include_str!("../config/quantity_patterns.json");

fn write_temp(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Bundled patterns with one top-level key removed
fn patterns_without(key: &str) -> String {
    let mut value: serde_json::Value = serde_json::from_str(PATTERNS).unwrap();
    value.as_object_mut().unwrap().remove(key);
    value.to_string()
}

#[test]
fn test_parser_from_files() {
    let aliases = write_temp(
        r#"{
            "Green Grocer": ["greengrocer", "the grocer", "/^gg\\b.*$/i"],
            "Harbour Cafe": ["harbour", "harbor cafe"],
            "auto_corrections": { "harbr": "Harbour Cafe" }
        }"#,
    );
    let patterns = write_temp(PATTERNS);

    let parser = OrderParser::from_config(
        CompanyAliasTable::from_file(aliases.path()).unwrap(),
        &QuantityPatternConfig::from_file(patterns.path()).unwrap(),
    )
    .unwrap();

    assert_eq!(
        parser.aliases().canonicalize("GG Sea Point").as_deref(),
        Some("Green Grocer")
    );
    assert_eq!(
        parser.aliases().canonicalize("harbr").as_deref(),
        Some("Harbour Cafe")
    );

    let batch = parser.resolve_batch(vec![
        Some("[09:00] Order Desk → 4kg butternut".to_string()),
        Some("[09:01] Order Desk → the grocer".to_string()),
    ]);
    assert_eq!(batch.orders[0].company_name, "Green Grocer");
    assert_eq!(batch.orders[0].items_text, vec!["4kg butternut"]);
}

#[test]
fn test_missing_file_reports_path() {
    let result = CompanyAliasTable::from_file("/nonexistent/company_aliases.json");
    match result {
        Err(ConfigError::Io { path, .. }) => {
            assert!(path.ends_with("company_aliases.json"));
        }
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn test_required_pattern_keys_fail_fast() {
    for key in ["weight_units", "count_units", "container_units", "group_units", "command_patterns"] {
        let file = write_temp(&patterns_without(key));
        let result = QuantityPatternConfig::from_file(file.path());
        assert!(
            matches!(result, Err(ConfigError::Json(_))),
            "missing {key} should be rejected"
        );
    }
}

#[test]
fn test_empty_vocabulary_fails_fast() {
    let mut value: serde_json::Value = serde_json::from_str(PATTERNS).unwrap();
    value["group_units"] = serde_json::json!([]);
    let file = write_temp(&value.to_string());

    let result = QuantityPatternConfig::from_file(file.path());
    assert!(matches!(result, Err(ConfigError::EmptyVocabulary("group_units"))));
}

#[test]
fn test_forwarders_from_file() {
    let file = write_temp(r#"{ "forwarders": ["Order Desk"] }"#);
    let config = ForwarderConfig::from_file(file.path()).unwrap();

    assert!(config.is_forwarder("order desk"));
    assert!(!config.is_forwarder("Chef Anna"));
    assert_eq!(config.timeout_ms(), 300_000);
}

#[test]
fn test_malformed_json_is_rejected() {
    let file = write_temp("{ not json");
    assert!(matches!(
        CompanyAliasTable::from_file(file.path()),
        Err(ConfigError::Json(_))
    ));
}
