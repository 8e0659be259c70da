//! Orchestrator configuration.
//!
//! Handles loading, environment overrides, and validation of the
//! `orchestrator.json` file (by default under the user config directory).

mod io;
mod model;
mod validation;

pub use io::{CONFIG_PATH_ENV, apply_env_overrides, default_config_path, load_config, load_config_from_path};
pub use model::{ConfigError, ExecutionConfig, HttpServerConfig, OrchestratorConfig, RetryConfig, ServiceEndpoints, StageDefaults};
pub use validation::{ValidationError, validate_config};
