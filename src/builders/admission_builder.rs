//! Build the admission strategy from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::{AdmissionConfig, AuthorityBackendConfig};
use crate::core::{AdmissionError, AlwaysGrant, Authority, AuthorityAdmission, DownloadAdmission};
use crate::infra::InMemoryAuthority;

/// Select the admission strategy once, at process configuration time.
///
/// `authority_factory` is only called for
/// [`AuthorityBackendConfig::External`].
///
/// # Errors
///
/// `AdmissionError::Configuration` if the configuration is invalid, or any
/// error returned by `authority_factory`.
pub fn build_admission<FA>(
    cfg: &AdmissionConfig,
    authority_factory: FA,
) -> Result<Arc<dyn DownloadAdmission>, AdmissionError>
where
    FA: FnOnce(&AdmissionConfig) -> Result<Arc<dyn Authority>, AdmissionError>,
{
    cfg.validate().map_err(AdmissionError::Configuration)?;

    let admission: Arc<dyn DownloadAdmission> = match &cfg.authority {
        AuthorityBackendConfig::Disabled => {
            info!("download admission: no scheduling authority, all downloads allowed");
            Arc::new(AlwaysGrant)
        }
        AuthorityBackendConfig::InMemory { .. } => {
            let policy = cfg.authority.in_memory_policy().unwrap_or_default();
            info!(
                allow_downloads = policy.allow_downloads,
                max_active = ?policy.max_active,
                "download admission: in-memory scheduling authority"
            );
            Arc::new(AuthorityAdmission::new(Arc::new(InMemoryAuthority::new(policy))))
        }
        AuthorityBackendConfig::External => {
            info!("download admission: external scheduling authority");
            Arc::new(AuthorityAdmission::new(authority_factory(cfg)?))
        }
    };
    Ok(admission)
}

/// [`build_admission`] for configurations that never use an external authority.
///
/// # Errors
///
/// `AdmissionError::Configuration` if the configuration is invalid or selects
/// [`AuthorityBackendConfig::External`].
pub fn build_builtin_admission(
    cfg: &AdmissionConfig,
) -> Result<Arc<dyn DownloadAdmission>, AdmissionError> {
    build_admission(cfg, |_| {
        Err(AdmissionError::Configuration(
            "external authority selected but none was provided".into(),
        ))
    })
}
