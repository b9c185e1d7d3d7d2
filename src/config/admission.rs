//! Admission configuration: which scheduling authority gates downloads.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;
use crate::infra::AuthorityPolicy;

/// Environment variable selecting the authority backend.
pub const ENV_AUTHORITY: &str = "METERED_ADMISSION_AUTHORITY";
/// Environment variable for the in-memory backend's `allow_downloads`.
pub const ENV_ALLOW_DOWNLOADS: &str = "METERED_ADMISSION_ALLOW_DOWNLOADS";
/// Environment variable for the in-memory backend's `max_active`.
pub const ENV_MAX_ACTIVE: &str = "METERED_ADMISSION_MAX_ACTIVE";

/// Scheduling authority backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum AuthorityBackendConfig {
    /// No authority; every request is granted immediately.
    Disabled,
    /// In-process authority.
    InMemory {
        /// Whether downloads are allowed at startup.
        #[serde(default = "default_allow_downloads")]
        allow_downloads: bool,
        /// Maximum number of concurrently granted entries.
        #[serde(default)]
        max_active: Option<usize>,
    },
    /// Authority supplied by the embedding application.
    External,
}

const fn default_allow_downloads() -> bool {
    true
}

/// Root admission configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Authority backend.
    pub authority: AuthorityBackendConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            authority: AuthorityBackendConfig::Disabled,
        }
    }
}

impl AuthorityBackendConfig {
    /// Policy for the in-memory backend, `None` for other backends.
    #[must_use]
    pub const fn in_memory_policy(&self) -> Option<AuthorityPolicy> {
        match *self {
            Self::InMemory {
                allow_downloads,
                max_active,
            } => Some(AuthorityPolicy {
                allow_downloads,
                max_active,
            }),
            Self::Disabled | Self::External => None,
        }
    }
}

impl AdmissionConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if let AuthorityBackendConfig::InMemory {
            max_active: Some(0),
            ..
        } = self.authority
        {
            return Err("max_active must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse admission configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("reading admission config {}", path.display()))?;
        Self::from_json_str(&input)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading admission config {}", path.display()))
    }

    /// Build configuration from the process environment, after loading a
    /// `.env` file if one exists.
    ///
    /// An unset [`ENV_AUTHORITY`] selects [`AuthorityBackendConfig::Disabled`].
    ///
    /// # Errors
    ///
    /// Fails on an unreadable or malformed `.env` file, unknown backend
    /// names or malformed values.
    pub fn from_env() -> AppResult<Self> {
        ignore_missing_env_file(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Fails on unknown backend names or malformed values.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = lookup(ENV_AUTHORITY).unwrap_or_else(|| "disabled".into());
        let authority = match backend.trim() {
            "disabled" | "none" | "" => AuthorityBackendConfig::Disabled,
            "external" => AuthorityBackendConfig::External,
            "in_memory" | "memory" => {
                let allow_downloads = lookup(ENV_ALLOW_DOWNLOADS)
                    .map(|v| v.trim().parse::<bool>())
                    .transpose()
                    .with_context(|| format!("parsing {ENV_ALLOW_DOWNLOADS}"))?
                    .unwrap_or(true);
                let max_active = lookup(ENV_MAX_ACTIVE)
                    .map(|v| v.trim().parse::<usize>())
                    .transpose()
                    .with_context(|| format!("parsing {ENV_MAX_ACTIVE}"))?;
                AuthorityBackendConfig::InMemory {
                    allow_downloads,
                    max_active,
                }
            }
            other => anyhow::bail!("unknown {ENV_AUTHORITY} value `{other}`"),
        };

        let cfg = Self { authority };
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

/// A missing `.env` file is normal; any other failure to load one is not.
fn ignore_missing_env_file<T>(result: Result<T, dotenvy::Error>) -> AppResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(error) if error.not_found() => Ok(()),
        Err(error) => Err(error).context("loading .env file"),
    }
}
