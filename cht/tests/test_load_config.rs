use cht::load_config::{load_config, load_config_file, CONFIG_ENV};
use cht_core::contract::ProductId;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A full config overrides output_dir and the named product only.
#[test]
fn test_load_config_with_product_overrides() {
    let file = config_file(
        r#"
output_dir: ./tmp/exports
products:
  "101":
    extension: csv
    delimiter: "|"
    key_field: company_number
    deletion_marker:
      field: action
      value: X
"#,
    );
    let config = load_config_file(file.path()).expect("Config should load");
    assert_eq!(config.output_dir, PathBuf::from("./tmp/exports"));

    let catalog = config.catalog();
    let updates = catalog.settings(ProductId::Prod101);
    assert_eq!(updates.extension, "csv");
    assert_eq!(updates.delimiter, b'|');
    assert_eq!(updates.key_field.as_deref(), Some("company_number"));
    assert_eq!(updates.deletion_marker.as_ref().unwrap().value, "X");
    assert_eq!(catalog.settings(ProductId::Prod183).extension, "dat");
}

#[test]
fn test_load_config_defaults_output_dir() {
    let file = config_file("products: {}\n");
    let config = load_config_file(file.path()).unwrap();
    assert_eq!(config.output_dir, PathBuf::from("."));
    assert!(config.products.is_empty());
}

#[test]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");
    let msg = load_config_file(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn test_load_config_rejects_unknown_product() {
    let file = config_file("products:\n  \"999\":\n    extension: txt\n");
    assert!(load_config_file(file.path()).is_err());
}

#[test]
fn test_load_config_rejects_multi_character_delimiter() {
    let file = config_file("products:\n  \"183\":\n    extension: dat\n    delimiter: \"||\"\n");
    assert!(load_config_file(file.path()).is_err());
}

#[test]
fn test_load_config_missing_file_is_read_error() {
    let msg = load_config_file("/definitely/not/here.yaml")
        .unwrap_err()
        .to_string();
    assert!(msg.contains("Failed to read config file"), "{msg}");
}

#[test]
#[serial]
fn test_load_config_falls_back_to_env_then_defaults() {
    let file = config_file("output_dir: /from/env\n");
    env::set_var(CONFIG_ENV, file.path());
    let config = load_config(None).unwrap();
    assert_eq!(config.output_dir, PathBuf::from("/from/env"));

    let explicit = config_file("output_dir: /explicit\n");
    let config = load_config(Some(explicit.path())).unwrap();
    assert_eq!(config.output_dir, PathBuf::from("/explicit"));

    env::remove_var(CONFIG_ENV);
    let config = load_config(None).unwrap();
    assert_eq!(config.output_dir, PathBuf::from("."));
}
