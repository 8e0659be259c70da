//! The workflow engine: admission, queries, cancellation, and shutdown.
//!
//! `create_workflow` stores a pending record, hands the run to a supervised
//! background task, and returns immediately. Stage failures never surface as
//! errors here; callers observe them through status and result queries.
//!
//! ## Design
//!
//! - Runs are spawned under a [`TaskTracker`], so shutdown can wait for them.
//! - Stage calls share one [`CallGate`]: a global concurrency cap, the
//!   per-stage deadline, and the shutdown token.
//! - Shutdown stops admission, waits for runs up to the grace period, then
//!   fires the token so in-flight calls fail fast and each run records the
//!   interruption before it exits.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sparta_types::workflow::validation::validate_create_request;
use sparta_types::{CancelReceipt, CreateWorkflowRequest, JsonObject, RunStatus, Workflow, WorkflowResult, WorkflowStatus};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, StoreError};
use crate::pipeline::Pipeline;
use crate::store::WorkflowStore;
use crate::workflow::call::{CallGate, RetryPolicy};
use crate::workflow::runner::{RunEnvironment, supervise_run};

/// Attempts at drawing an unused generated id before giving up.
const ID_GENERATION_ATTEMPTS: usize = 4;

/// Runtime limits for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub stage_timeout: Duration,
    pub max_concurrent_stage_calls: usize,
    pub shutdown_grace: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(30),
            max_concurrent_stage_calls: 16,
            shutdown_grace: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Summary of a completed shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// True when every run settled inside the grace period.
    pub drained: bool,
    /// Runs still active when the grace period ran out.
    pub interrupted_runs: usize,
}

pub struct WorkflowEngine {
    env: RunEnvironment,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    settings: EngineSettings,
}

impl WorkflowEngine {
    pub fn new(store: Arc<WorkflowStore>, pipeline: Pipeline, settings: EngineSettings) -> Self {
        let shutdown = CancellationToken::new();
        let gate = CallGate::new(
            settings.max_concurrent_stage_calls,
            settings.stage_timeout,
            settings.retry,
            shutdown.clone(),
        );
        Self {
            env: RunEnvironment {
                store,
                pipeline: Arc::new(pipeline),
                gate: Arc::new(gate),
            },
            tracker: TaskTracker::new(),
            shutdown,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<WorkflowStore> {
        &self.env.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether new workflows are still admitted.
    pub fn is_accepting(&self) -> bool {
        !self.tracker.is_closed()
    }

    /// Runs that have not settled yet.
    pub fn active_runs(&self) -> usize {
        self.tracker.len()
    }

    /// Validate and store a new workflow, then start its run in the background.
    ///
    /// Returns the pending status view without waiting for any stage.
    pub async fn create_workflow(&self, request: CreateWorkflowRequest) -> Result<WorkflowStatus, EngineError> {
        // Held until the run is spawned so a concurrent shutdown cannot finish
        // draining between the admission check and the spawn.
        let _admission = self.tracker.token();
        if !self.is_accepting() {
            return Err(EngineError::ShuttingDown);
        }
        validate_create_request(&request).map_err(EngineError::validation)?;

        let CreateWorkflowRequest {
            workflow_id,
            user_input,
            parameters,
            metadata,
        } = request;
        let parameters = parameters.unwrap_or_default();
        let metadata = metadata.unwrap_or_default();

        let stored = match workflow_id {
            Some(id) => {
                self.env
                    .store
                    .create(Workflow::new(id, user_input, parameters, metadata, Utc::now()))
                    .await?
            }
            None => self.store_with_generated_id(user_input, parameters, metadata).await?,
        };

        let workflow_id = stored.id.clone();
        info!(workflow_id = %workflow_id, "workflow created");
        self.tracker.spawn(supervise_run(self.env.clone(), workflow_id));
        Ok(stored.status_snapshot())
    }

    async fn store_with_generated_id(
        &self,
        user_input: String,
        parameters: JsonObject,
        metadata: JsonObject,
    ) -> Result<Workflow, EngineError> {
        for _ in 0..ID_GENERATION_ATTEMPTS {
            let workflow = Workflow::new(generate_workflow_id(), user_input.clone(), parameters.clone(), metadata.clone(), Utc::now());
            match self.env.store.create(workflow).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::Duplicate { id }) => warn!(workflow_id = %id, "generated workflow id collided; drawing another"),
                Err(other) => return Err(other.into()),
            }
        }
        Err(EngineError::internal("could not generate an unused workflow id"))
    }

    pub async fn get_workflow_status(&self, workflow_id: &str) -> Result<WorkflowStatus, EngineError> {
        Ok(self.env.store.get(workflow_id).await?.status_snapshot())
    }

    pub async fn get_workflow_result(&self, workflow_id: &str) -> Result<WorkflowResult, EngineError> {
        Ok(self.env.store.get(workflow_id).await?.result_snapshot())
    }

    /// Force a non-terminal workflow into `Cancelled`.
    ///
    /// Unknown ids and workflows that already finished both report `NotFound`.
    /// A stage call already in flight is left to finish; its outcome is discarded.
    pub async fn cancel_workflow(&self, workflow_id: &str) -> Result<CancelReceipt, EngineError> {
        let outcome = self.env.store.mutate(workflow_id, Workflow::cancel).await?;
        if !outcome.applied() {
            info!(
                workflow_id = %workflow_id,
                status = %outcome.workflow().status,
                "cancel requested for a finished workflow"
            );
            return Err(EngineError::not_found(workflow_id));
        }
        info!(workflow_id = %workflow_id, "workflow cancelled");
        Ok(CancelReceipt {
            workflow_id: workflow_id.to_string(),
            status: RunStatus::Cancelled,
        })
    }

    /// Stop admitting workflows and wait for active runs.
    ///
    /// Runs still active after `grace` have their in-flight stage calls
    /// interrupted; each records the interruption as a stage failure.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.tracker.close();
        let active = self.tracker.len();
        info!(active_runs = active, grace_ms = grace.as_millis() as u64, "engine shutting down");

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("all workflow runs settled");
            return ShutdownReport {
                drained: true,
                interrupted_runs: 0,
            };
        }

        let remaining = self.tracker.len();
        warn!(remaining_runs = remaining, "grace period elapsed; interrupting in-flight stage calls");
        self.shutdown.cancel();
        self.tracker.wait().await;
        ShutdownReport {
            drained: false,
            interrupted_runs: remaining,
        }
    }
}

/// `wf-` followed by twelve lowercase hex characters.
pub fn generate_workflow_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("wf-{}", &hex[..12])
}
