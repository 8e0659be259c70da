use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::validation::ValidationError;
use crate::workflow::{EngineSettings, RetryPolicy};

pub const DEFAULT_NLP_AGENT_URL: &str = "http://localhost:8010";
pub const DEFAULT_SYNTHESIS_AGENT_URL: &str = "http://localhost:8011";
pub const DEFAULT_RTL_GENERATOR_URL: &str = "http://localhost:8021";
pub const DEFAULT_EMULATOR_URL: &str = "http://localhost:8020";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct OrchestratorConfig {
    pub services: ServiceEndpoints,
    pub execution: ExecutionConfig,
    pub stages: StageDefaults,
    pub http_server: HttpServerConfig,
}

/// Base URLs of the downstream stage services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceEndpoints {
    pub nlp_agent_url: String,
    pub synthesis_agent_url: String,
    pub rtl_generator_url: String,
    pub emulator_url: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            nlp_agent_url: DEFAULT_NLP_AGENT_URL.to_string(),
            synthesis_agent_url: DEFAULT_SYNTHESIS_AGENT_URL.to_string(),
            rtl_generator_url: DEFAULT_RTL_GENERATOR_URL.to_string(),
            emulator_url: DEFAULT_EMULATOR_URL.to_string(),
        }
    }
}

/// Limits applied to stage execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Deadline for a single stage call, in milliseconds.
    pub stage_timeout_ms: u64,
    /// Stage calls allowed in flight across all workflows.
    pub max_concurrent_stage_calls: usize,
    /// How long shutdown waits for runs before interrupting them.
    pub shutdown_grace_ms: u64,
    pub retry: RetryConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: 30_000,
            max_concurrent_stage_calls: 16,
            shutdown_grace_ms: 10_000,
            retry: RetryConfig::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            stage_timeout: Duration::from_millis(self.stage_timeout_ms),
            max_concurrent_stage_calls: self.max_concurrent_stage_calls,
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                backoff: Duration::from_millis(self.retry.backoff_ms),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per stage; 1 disables retry.
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 500,
        }
    }
}

/// Defaults for stage request fields that workflows may override through `parameters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StageDefaults {
    pub language: String,
    pub emulation_cycles: u64,
}

impl Default for StageDefaults {
    fn default() -> Self {
        Self {
            language: "systemverilog".to_string(),
            emulation_cycles: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpServerConfig {
    pub bind_address: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}
