//! Configuration loader
//!
//! Layers an optional YAML/TOML file under `COMPLIANCE__*` environment
//! variables, then validates the result.

use config::{Config, Environment, File};
use std::path::Path;
use tracing::info;

use super::AuditConfig;
use crate::error::ComplianceError;

pub const ENV_PREFIX: &str = "COMPLIANCE";

impl AuditConfig {
    /// Load configuration from an optional file plus the environment.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `COMPLIANCE__SCORING__DMCA_FAILURE_PENALTY=0.2`.
    pub fn load(path: Option<&Path>) -> Result<Self, ComplianceError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ComplianceError::ConfigError(format!(
                    "Configuration file not found: {:?}",
                    path
                )));
            }
            info!("Loading audit configuration from: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AuditConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            "Audit configuration loaded (version: {}, jurisdiction: {})",
            config.system_version, config.jurisdiction
        );
        Ok(config)
    }
}
