//! Configuration management for Tourmaline
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (TML_* prefix, highest precedence)
//! 2. tourmaline.local.toml (gitignored, local overrides)
//! 3. tourmaline.toml (git-tracked, project config)
//! 4. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod loader;

pub use loader::ConfigLoader;

/// Main Tourmaline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TourmalineConfig {
    pub security: SecurityConfig,
    pub store: StoreConfig,
    pub audit: AuditConfig,
}

/// Master key and KDF settings.
///
/// The passphrase itself never appears in config files; only the name of
/// the environment variable that carries it does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Environment variable holding the master passphrase.
    pub passphrase_env: String,
    /// Salt for master key derivation.
    pub kdf_salt: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            passphrase_env: "TOURMALINE_MASTER_PASSPHRASE".to_string(),
            kdf_salt: "tourmaline".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bound on synchronous store calls; exceeding it is an execution
    /// error, never a denial.
    pub statement_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Default cap on audit projection results.
    pub default_limit: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { default_limit: 20 }
    }
}

impl TourmalineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TourmalineConfig::default();
        assert_eq!(
            config.security.passphrase_env,
            "TOURMALINE_MASTER_PASSPHRASE"
        );
        assert_eq!(config.store.statement_timeout_ms, 5_000);
        assert_eq!(config.audit.default_limit, 20);
    }
}
