//! Configuration IO helpers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::{config_dir, home_dir};
use tracing::info;

use crate::config::{ConfigError, OrchestratorConfig, validate_config};

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "SPARTA_CONFIG_PATH";

/// Environment variables that override individual service URLs.
const NLP_AGENT_URL_ENV: &str = "NLP_AGENT_URL";
const SYNTHESIS_AGENT_URL_ENV: &str = "SYNTHESIS_AGENT_URL";
const RTL_GENERATOR_URL_ENV: &str = "RTL_GENERATOR_URL";
const EMULATOR_URL_ENV: &str = "EMULATOR_URL";

/// Returns the default path for the orchestrator configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sparta")
        .join("orchestrator.json")
}

/// Loads configuration from the default path.
pub fn load_config() -> Result<OrchestratorConfig, ConfigError> {
    load_config_from_path(&default_config_path())
}

/// Loads configuration from `path`, applies environment overrides, and validates.
///
/// A missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        info!(path = %path.display(), "no config file found; using defaults");
        OrchestratorConfig::default()
    };

    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Replace service URLs with any non-empty environment overrides.
pub fn apply_env_overrides(config: &mut OrchestratorConfig) {
    let services = &mut config.services;
    for (variable, target) in [
        (NLP_AGENT_URL_ENV, &mut services.nlp_agent_url),
        (SYNTHESIS_AGENT_URL_ENV, &mut services.synthesis_agent_url),
        (RTL_GENERATOR_URL_ENV, &mut services.rtl_generator_url),
        (EMULATOR_URL_ENV, &mut services.emulator_url),
    ] {
        if let Ok(value) = env::var(variable)
            && !value.trim().is_empty()
        {
            *target = value.trim().to_string();
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
