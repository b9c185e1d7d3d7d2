//! Tests for configuration validation

use std::collections::HashMap;

use metered_admission::config::admission::{ENV_ALLOW_DOWNLOADS, ENV_AUTHORITY, ENV_MAX_ACTIVE};
use metered_admission::config::{AdmissionConfig, AuthorityBackendConfig};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_default_is_disabled() {
    let config = AdmissionConfig::default();
    assert_eq!(config.authority, AuthorityBackendConfig::Disabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_max_active_is_invalid() {
    let config = AdmissionConfig {
        authority: AuthorityBackendConfig::InMemory {
            allow_downloads: true,
            max_active: Some(0),
        },
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "authority": {
            "backend": "in_memory",
            "max_active": 2
        }
    }"#;

    let config = AdmissionConfig::from_json_str(json).unwrap();
    assert_eq!(
        config.authority,
        AuthorityBackendConfig::InMemory {
            allow_downloads: true,
            max_active: Some(2),
        }
    );
}

#[test]
fn test_config_from_json_rejects_unknown_backend() {
    let json = r#"{ "authority": { "backend": "carrier_pigeon" } }"#;
    assert!(AdmissionConfig::from_json_str(json).is_err());
}

#[test]
fn test_config_from_lookup() {
    let config = AdmissionConfig::from_lookup(lookup(&[
        (ENV_AUTHORITY, "in_memory"),
        (ENV_ALLOW_DOWNLOADS, "false"),
        (ENV_MAX_ACTIVE, "3"),
    ]))
    .unwrap();
    assert_eq!(
        config.authority,
        AuthorityBackendConfig::InMemory {
            allow_downloads: false,
            max_active: Some(3),
        }
    );

    let config = AdmissionConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config.authority, AuthorityBackendConfig::Disabled);
}

#[test]
fn test_config_from_lookup_errors() {
    assert!(AdmissionConfig::from_lookup(lookup(&[(ENV_AUTHORITY, "mogwai")])).is_err());
    assert!(AdmissionConfig::from_lookup(lookup(&[
        (ENV_AUTHORITY, "in_memory"),
        (ENV_MAX_ACTIVE, "lots"),
    ]))
    .is_err());
    assert!(AdmissionConfig::from_lookup(lookup(&[
        (ENV_AUTHORITY, "in_memory"),
        (ENV_MAX_ACTIVE, "0"),
    ]))
    .is_err());
}

#[test]
fn test_config_from_missing_file() {
    let err = AdmissionConfig::from_file("/nonexistent/admission.json").unwrap_err();
    assert!(format!("{err:#}").contains("reading admission config"));
}
