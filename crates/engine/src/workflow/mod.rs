//! Workflow execution: the engine facade, the run loop, and guarded stage calls.

mod call;
mod engine;
mod runner;

pub use call::RetryPolicy;
pub use engine::{EngineSettings, ShutdownReport, WorkflowEngine, generate_workflow_id};
