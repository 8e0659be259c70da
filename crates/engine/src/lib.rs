//! # SPARTA Engine
//!
//! Runs hardware-design workflows through a fixed pipeline of remote stages:
//! natural-language parsing, architecture synthesis, RTL generation, and
//! emulation. Each workflow is created, run in the background, and observed
//! through status and result snapshots.
//!
//! ## Architecture
//!
//! - **`store`**: the only owner of workflow records; atomic, guarded mutations
//! - **`executor`**: the [`StageExecutor`] seam and the HTTP executors
//! - **`pipeline`**: the ordered stage list a run walks
//! - **`workflow`**: [`WorkflowEngine`] with the run loop, concurrency gate,
//!   retries, run supervision, and shutdown drain
//! - **`config`**: the `orchestrator.json` model, loading, and validation
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sparta_engine::{Pipeline, WorkflowEngine, WorkflowStore, config::load_config};
//! use sparta_types::CreateWorkflowRequest;
//!
//! let config = load_config()?;
//! let pipeline = Pipeline::http(&config.services, &config.stages, sparta_api::StageClient::new()?)?;
//! let engine = WorkflowEngine::new(Arc::new(WorkflowStore::new()), pipeline, config.execution.engine_settings());
//! let status = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await?;
//! println!("started {}", status.workflow_id);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod store;
pub mod workflow;

pub use error::{EngineError, StoreError};
pub use executor::{StageContext, StageExecutor, StageOutput};
pub use pipeline::{Pipeline, PipelineError, StageDescriptor};
pub use store::{Mutation, WorkflowStore};
pub use workflow::{EngineSettings, RetryPolicy, ShutdownReport, WorkflowEngine};
