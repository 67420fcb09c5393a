//! Translation settings loaded from YAML files and the environment.

use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use exprmap::{ConfigError, TranslationConfig};

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_from_yaml_file() {
    let file = yaml_file("max_expression_depth: 32\nlog_translations: true\n");
    let config = TranslationConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.max_expression_depth, 32);
    assert!(config.log_translations);
}

#[test]
fn test_missing_keys_use_defaults() {
    let file = yaml_file("log_translations: true\n");
    let config = TranslationConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(
        config.max_expression_depth,
        TranslationConfig::default().max_expression_depth
    );
}

#[test]
fn test_invalid_yaml_values() {
    let file = yaml_file("max_expression_depth: 0\n");
    assert!(matches!(
        TranslationConfig::from_yaml_file(file.path()),
        Err(ConfigError::Validation(_))
    ));

    let file = yaml_file("max_expression_depth: [1, 2]\n");
    assert!(matches!(
        TranslationConfig::from_yaml_file(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
#[serial]
fn test_environment_defaults() {
    std::env::remove_var("EXPRMAP_MAX_DEPTH");
    std::env::remove_var("EXPRMAP_LOG_TRANSLATIONS");
    assert_eq!(
        TranslationConfig::from_env().unwrap(),
        TranslationConfig::default()
    );
}

#[test]
#[serial]
fn test_environment_validation() {
    std::env::set_var("EXPRMAP_MAX_DEPTH", "20000");
    let result = TranslationConfig::from_env();
    std::env::remove_var("EXPRMAP_MAX_DEPTH");
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}
