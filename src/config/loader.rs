//! Configuration Loader
//!
//! Merges built-in defaults, an optional configuration file and environment
//! variables, then validates the result.

use super::error::ConfigResult;
use super::PmConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Environment variable prefix, e.g. `PM_SCHEDULER__LOGGING__JSON=true`
pub const ENV_PREFIX: &str = "PM_SCHEDULER";

/// File looked up (with any supported extension) when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "config/pm-scheduler";

/// Builder for loading [`PmConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    environment: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of the default location. The file must exist.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Use these variables instead of the process environment
    pub fn with_environment(mut self, variables: HashMap<String, String>) -> Self {
        self.environment = Some(variables);
        self
    }

    /// Load and validate configuration
    pub fn load(self) -> ConfigResult<PmConfig> {
        let file = match &self.file {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(self.environment);

        let config: PmConfig = Config::builder()
            .add_source(Config::try_from(&PmConfig::default())?)
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            config = %config.sanitized(),
            file = ?self.file,
            "Configuration loaded"
        );
        Ok(config)
    }
}
