//! Shared type definitions for the SPARTA orchestrator.
//!
//! - [`workflow`]: the workflow record, status and stage enums, and the views
//!   returned to API callers
//! - [`stage`]: JSON contracts of the downstream stage services
//! - [`error`]: the normalized [`RemoteError`] produced by stage calls

pub mod error;
pub mod stage;
pub mod workflow;

pub use error::{RemoteError, RemoteErrorKind};
pub use workflow::{
    CancelReceipt, CreateWorkflowRequest, JsonObject, RunStatus, StageRecord, Workflow, WorkflowResult, WorkflowStage, WorkflowStatus,
};
