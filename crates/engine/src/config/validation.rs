//! Configuration validation.

use std::net::SocketAddr;

use sparta_api::validate_base_url;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::OrchestratorConfig;

/// Validate the entire orchestrator configuration.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), ValidationError> {
    let services = &config.services;
    for (service, url) in [
        ("nlpAgentUrl", &services.nlp_agent_url),
        ("synthesisAgentUrl", &services.synthesis_agent_url),
        ("rtlGeneratorUrl", &services.rtl_generator_url),
        ("emulatorUrl", &services.emulator_url),
    ] {
        validate_base_url(url).map_err(|error| ValidationError::InvalidServiceUrl {
            service,
            reason: error.to_string(),
        })?;
        debug!(service, url = %url, "validated service url");
    }

    let execution = &config.execution;
    require_positive("execution.stageTimeoutMs", execution.stage_timeout_ms)?;
    require_positive("execution.maxConcurrentStageCalls", execution.max_concurrent_stage_calls as u64)?;
    if execution.max_concurrent_stage_calls > Semaphore::MAX_PERMITS {
        return Err(ValidationError::TooLarge {
            field: "execution.maxConcurrentStageCalls",
            max: Semaphore::MAX_PERMITS as u64,
        });
    }
    require_positive("execution.retry.maxAttempts", u64::from(execution.retry.max_attempts))?;
    require_positive("stages.emulationCycles", config.stages.emulation_cycles)?;

    if config.stages.language.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "stages.language",
        });
    }

    config
        .http_server
        .bind_address
        .parse::<SocketAddr>()
        .map_err(|error| ValidationError::InvalidBindAddress {
            address: config.http_server.bind_address.clone(),
            reason: error.to_string(),
        })?;

    Ok(())
}

fn require_positive(field: &'static str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::ZeroValue { field });
    }
    Ok(())
}

/// Validation errors for orchestrator configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid URL for '{service}': {reason}")]
    InvalidServiceUrl { service: &'static str, reason: String },

    #[error("'{field}' must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("'{field}' must not exceed {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("'{field}' must not be empty")]
    EmptyField { field: &'static str },

    #[error("Invalid bind address '{address}': {reason}")]
    InvalidBindAddress { address: String, reason: String },
}
