//! # PM Scheduler Configuration Validator
//!
//! Loads the layered configuration exactly as the engine would, validates it and
//! prints the result with database credentials masked.
//!
//! ```text
//! pm-config-validator [CONFIG_FILE]
//! ```
//!
//! Without an argument the default `config/pm-scheduler.*` file is used when
//! present. Exits non-zero when loading or validation fails.

use anyhow::{Context, Result};
use clap::Parser;
use pm_scheduler::config::ConfigLoader;
use pm_scheduler::logging::init_structured_logging;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pm-config-validator")]
#[command(about = "Validate PM scheduler configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file to validate (default: config/pm-scheduler.*)
    config_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config_file {
        loader = loader.with_file(path);
    }

    let config = loader.load().with_context(|| match &cli.config_file {
        Some(path) => format!("invalid configuration in {}", path.display()),
        None => "invalid configuration".to_string(),
    })?;

    init_structured_logging(&config.logging);
    info!(file = ?cli.config_file, "Configuration is valid");

    let rendered = serde_json::to_string_pretty(&config.sanitized())
        .context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_file_is_optional() {
        let cli = Cli::try_parse_from(["pm-config-validator"]).unwrap();
        assert!(cli.config_file.is_none());

        let cli = Cli::try_parse_from(["pm-config-validator", "config/plant.toml"]).unwrap();
        assert_eq!(cli.config_file, Some(PathBuf::from("config/plant.toml")));
    }

    #[test]
    fn test_extra_arguments_are_rejected() {
        let result = Cli::try_parse_from(["pm-config-validator", "a.toml", "b.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_version_flag_is_supported() {
        let err = Cli::try_parse_from(["pm-config-validator", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
