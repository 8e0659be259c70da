//! Strongly typed workflow records shared by the engine and the HTTP server.
//!
//! A [`Workflow`] tracks one design request from submission to a terminal
//! state. The record owns every transition helper so the engine and the
//! cancellation path apply identical rules; callers decide *when* a transition
//! happens, the record decides *what* it changes.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{RemoteError, RemoteErrorKind};

pub mod validation;

/// Opaque key/value map used for parameters, metadata, payloads, and carry fields.
pub type JsonObject = JsonMap<String, JsonValue>;

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, run not started yet.
    Pending,
    /// The run loop is executing stages.
    Running,
    /// Every stage succeeded.
    Completed,
    /// A stage failed or the run crashed.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl RunStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a workflow in the fixed processing pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Parsing,
    Synthesis,
    Generation,
    Emulation,
    /// Sentinel reached after the last stage succeeds. Never executed.
    Complete,
}

impl WorkflowStage {
    /// Canonical execution order of the executable stages.
    pub const PIPELINE: [WorkflowStage; 4] = [
        WorkflowStage::Parsing,
        WorkflowStage::Synthesis,
        WorkflowStage::Generation,
        WorkflowStage::Emulation,
    ];

    /// Whether the stage maps to an executor call.
    pub fn is_executable(self) -> bool {
        !matches!(self, WorkflowStage::Complete)
    }

    /// Capitalized name used in error entries and logs.
    pub fn label(self) -> &'static str {
        match self {
            WorkflowStage::Parsing => "Parsing",
            WorkflowStage::Synthesis => "Synthesis",
            WorkflowStage::Generation => "Generation",
            WorkflowStage::Emulation => "Emulation",
            WorkflowStage::Complete => "Complete",
        }
    }

    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStage::Parsing => "parsing",
            WorkflowStage::Synthesis => "synthesis",
            WorkflowStage::Generation => "generation",
            WorkflowStage::Emulation => "emulation",
            WorkflowStage::Complete => "complete",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome recorded for one attempted stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageRecord {
    Completed {
        timestamp: DateTime<Utc>,
        /// Response body returned by the stage service.
        payload: JsonObject,
    },
    Failed {
        timestamp: DateTime<Utc>,
        error: String,
        error_kind: RemoteErrorKind,
    },
}

impl StageRecord {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageRecord::Completed { .. })
    }

    pub fn payload(&self) -> Option<&JsonObject> {
        match self {
            StageRecord::Completed { payload, .. } => Some(payload),
            StageRecord::Failed { .. } => None,
        }
    }
}

/// The full workflow record held by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub id: String,
    pub user_input: String,
    pub parameters: JsonObject,
    pub metadata: JsonObject,
    pub status: RunStatus,
    pub current_stage: WorkflowStage,
    pub stages_completed: Vec<WorkflowStage>,
    pub results: IndexMap<WorkflowStage, StageRecord>,
    pub errors: Vec<String>,
    pub artifacts: Vec<String>,
    pub progress_percentage: f64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Build a freshly created, pending workflow.
    pub fn new(id: impl Into<String>, user_input: impl Into<String>, parameters: JsonObject, metadata: JsonObject, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            user_input: user_input.into(),
            parameters,
            metadata,
            status: RunStatus::Pending,
            current_stage: WorkflowStage::Parsing,
            stages_completed: Vec::new(),
            results: IndexMap::new(),
            errors: Vec::new(),
            artifacts: Vec::new(),
            progress_percentage: 0.0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Advance `updated_at`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Pending -> Running. Returns false when the workflow left `Pending` already.
    pub fn begin(&mut self) -> bool {
        if self.status != RunStatus::Pending {
            return false;
        }
        self.status = RunStatus::Running;
        true
    }

    /// Mark `stage` as the one being attempted.
    pub fn enter_stage(&mut self, stage: WorkflowStage) {
        self.current_stage = stage;
    }

    /// Record a successful stage and recompute progress against `total_stages`.
    pub fn record_success(
        &mut self,
        stage: WorkflowStage,
        payload: JsonObject,
        artifacts: impl IntoIterator<Item = String>,
        total_stages: usize,
        now: DateTime<Utc>,
    ) {
        self.results.insert(stage, StageRecord::Completed { timestamp: now, payload });
        if !self.stages_completed.contains(&stage) {
            self.stages_completed.push(stage);
        }
        self.artifacts.extend(artifacts);
        self.progress_percentage = progress_for(self.stages_completed.len(), total_stages).max(self.progress_percentage);
    }

    /// Record a failed stage and move to `Failed`.
    pub fn record_failure(&mut self, stage: WorkflowStage, error: &RemoteError, now: DateTime<Utc>) {
        self.results.insert(
            stage,
            StageRecord::Failed {
                timestamp: now,
                error: error.message.clone(),
                error_kind: error.kind,
            },
        );
        self.errors.push(format!("{}: {}", stage, error.message));
        self.status = RunStatus::Failed;
    }

    /// Every stage succeeded.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.current_stage = WorkflowStage::Complete;
        self.progress_percentage = 100.0;
    }

    /// Fail for a reason not tied to a stage response (for example a crashed run).
    pub fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.status = RunStatus::Failed;
    }

    /// Force `Cancelled` from a non-terminal status. Returns false when already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RunStatus::Cancelled;
        true
    }

    /// Milliseconds elapsed between creation and the last mutation.
    pub fn execution_time_ms(&self) -> u64 {
        (self.updated_at - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn status_snapshot(&self) -> WorkflowStatus {
        WorkflowStatus {
            workflow_id: self.id.clone(),
            current_stage: self.current_stage,
            status: self.status,
            progress_percentage: self.progress_percentage,
            stages_completed: self.stages_completed.clone(),
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }

    pub fn result_snapshot(&self) -> WorkflowResult {
        WorkflowResult {
            workflow_id: self.id.clone(),
            status: self.status,
            results: self.results.clone(),
            artifacts: self.artifacts.clone(),
            errors: if self.errors.is_empty() { None } else { Some(self.errors.clone()) },
            execution_time_ms: self.execution_time_ms(),
            completed_at: self.updated_at,
        }
    }
}

fn progress_for(completed: usize, total_stages: usize) -> f64 {
    if total_stages == 0 {
        return 100.0;
    }
    ((completed as f64 / total_stages as f64) * 100.0).clamp(0.0, 100.0)
}

/// Point-in-time status view returned by create and status queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStatus {
    pub workflow_id: String,
    pub current_stage: WorkflowStage,
    pub status: RunStatus,
    pub progress_percentage: f64,
    pub stages_completed: Vec<WorkflowStage>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result view with per-stage outputs, artifacts, and errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub status: RunStatus,
    pub results: IndexMap<WorkflowStage, StageRecord>,
    pub artifacts: Vec<String>,
    pub errors: Option<Vec<String>>,
    pub execution_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// Body of a workflow creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateWorkflowRequest {
    /// Caller-chosen identifier; generated when absent.
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub user_input: String,
    #[serde(default)]
    pub parameters: Option<JsonObject>,
    #[serde(default)]
    pub metadata: Option<JsonObject>,
}

impl CreateWorkflowRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_parameters(mut self, parameters: JsonObject) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_metadata(mut self, metadata: JsonObject) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Acknowledgement returned by a successful cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancelReceipt {
    pub workflow_id: String,
    pub status: RunStatus,
}
