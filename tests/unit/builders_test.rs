//! Tests for builder modules

use std::sync::Arc;

use metered_admission::builders::{build_admission, build_builtin_admission};
use metered_admission::config::{AdmissionConfig, AuthorityBackendConfig};
use metered_admission::core::{AdmissionError, Authority, DownloadAdmission};
use metered_admission::infra::InMemoryAuthority;

#[test]
fn test_disabled_backend_always_grants() {
    let admission = build_builtin_admission(&AdmissionConfig::default()).unwrap();
    let handle = admission.request_admission_for_item(Some(5_000_000), None).unwrap();
    assert!(handle.is_empty());
    assert!(admission.release_admission(&handle, None).is_ok());
}

#[test]
fn test_in_memory_backend_creates_entries() {
    let config = AdmissionConfig {
        authority: AuthorityBackendConfig::InMemory {
            allow_downloads: true,
            max_active: None,
        },
    };
    let admission = build_builtin_admission(&config).unwrap();
    let handle = admission.request_admission_for_item(Some(1), None).unwrap();
    assert!(!handle.is_empty());
    admission.release_admission(&handle, None).unwrap();
}

#[test]
fn test_external_backend_uses_factory() {
    let authority = InMemoryAuthority::default();
    let provided = authority.clone();
    let config = AdmissionConfig {
        authority: AuthorityBackendConfig::External,
    };

    let admission = build_admission(&config, move |_| {
        let authority: Arc<dyn Authority> = Arc::new(provided);
        Ok(authority)
    })
    .unwrap();
    let handle = admission.request_admission_for_item(None, None).unwrap();
    assert_eq!(authority.entries().len(), 1);
    admission.release_admission(&handle, None).unwrap();
}

#[test]
fn test_external_backend_without_factory_fails() {
    let config = AdmissionConfig {
        authority: AuthorityBackendConfig::External,
    };
    assert!(matches!(
        build_builtin_admission(&config),
        Err(AdmissionError::Configuration(_))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = AdmissionConfig {
        authority: AuthorityBackendConfig::InMemory {
            allow_downloads: true,
            max_active: Some(0),
        },
    };
    assert!(matches!(
        build_builtin_admission(&config),
        Err(AdmissionError::Configuration(_))
    ));
}
