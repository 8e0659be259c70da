//! Workflow run loop and run supervision.
//!
//! A run walks the pipeline once. Every state change goes through a guarded
//! store mutation that declines to write when the workflow is already
//! terminal, so a cancellation observed at any point is final: late stage
//! results are discarded and nothing moves the workflow out of `Cancelled`.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use sparta_types::{RemoteError, RunStatus, Workflow};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::executor::{StageContext, StageOutput};
use crate::pipeline::{Pipeline, StageDescriptor};
use crate::store::{Mutation, WorkflowStore};
use crate::workflow::call::CallGate;

/// Shared handles a run needs.
#[derive(Debug, Clone)]
pub(crate) struct RunEnvironment {
    pub(crate) store: Arc<WorkflowStore>,
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) gate: Arc<CallGate>,
}

impl RunEnvironment {
    /// Apply `change` unless the workflow has reached a terminal status.
    async fn guarded<F>(&self, workflow_id: &str, change: F) -> Result<Mutation, StoreError>
    where
        F: FnOnce(&mut Workflow),
    {
        self.store
            .mutate(workflow_id, |workflow| {
                if workflow.status.is_terminal() {
                    return false;
                }
                change(workflow);
                true
            })
            .await
    }

    async fn is_terminal(&self, workflow_id: &str) -> bool {
        match self.store.get(workflow_id).await {
            Ok(workflow) => workflow.status.is_terminal(),
            Err(_) => true,
        }
    }
}

/// Drive one workflow through the pipeline and return the status it ended in.
pub(crate) async fn drive_workflow_run(env: RunEnvironment, workflow_id: String) -> Result<RunStatus, StoreError> {
    let started = env.store.mutate(&workflow_id, Workflow::begin).await?;
    if !started.applied() {
        let status = started.workflow().status;
        info!(workflow_id = %workflow_id, status = %status, "workflow left pending before its run started");
        return Ok(status);
    }
    info!(workflow_id = %workflow_id, stages = env.pipeline.len(), "workflow run started");

    let mut context = StageContext::from_workflow(started.workflow());
    let total_stages = env.pipeline.len();

    for descriptor in env.pipeline.stages() {
        let stage = descriptor.stage;
        let entered = env.guarded(&workflow_id, |workflow| workflow.enter_stage(stage)).await?;
        if !entered.applied() {
            return Ok(stopped(&workflow_id, entered));
        }

        match invoke_with_retry(&env, &workflow_id, descriptor, &context).await {
            Ok(StageOutput { payload, carry, artifacts }) => {
                let recorded = env
                    .guarded(&workflow_id, |workflow| {
                        workflow.record_success(stage, payload, artifacts, total_stages, Utc::now())
                    })
                    .await?;
                if !recorded.applied() {
                    return Ok(stopped(&workflow_id, recorded));
                }
                debug!(workflow_id = %workflow_id, stage = stage.as_str(), "stage completed");
                context.merge_carry(carry);
            }
            Err(stage_error) => {
                warn!(
                    workflow_id = %workflow_id,
                    stage = stage.as_str(),
                    kind = stage_error.kind.as_str(),
                    error = %stage_error,
                    "stage failed"
                );
                let recorded = env
                    .guarded(&workflow_id, |workflow| workflow.record_failure(stage, &stage_error, Utc::now()))
                    .await?;
                if !recorded.applied() {
                    return Ok(stopped(&workflow_id, recorded));
                }
                return Ok(RunStatus::Failed);
            }
        }
    }

    let finished = env.guarded(&workflow_id, Workflow::complete).await?;
    if !finished.applied() {
        return Ok(stopped(&workflow_id, finished));
    }
    Ok(RunStatus::Completed)
}

fn stopped(workflow_id: &str, mutation: Mutation) -> RunStatus {
    let status = mutation.workflow().status;
    info!(workflow_id = %workflow_id, status = %status, "workflow reached a terminal status outside its run; stopping");
    status
}

async fn invoke_with_retry(
    env: &RunEnvironment,
    workflow_id: &str,
    descriptor: &StageDescriptor,
    context: &StageContext,
) -> Result<StageOutput, RemoteError> {
    let policy = env.gate.retry;
    let mut attempt = 1;
    loop {
        let stage_error = match env.gate.invoke_once(descriptor, context).await {
            Ok(output) => return Ok(output),
            Err(stage_error) => stage_error,
        };
        if attempt >= policy.max_attempts || !stage_error.is_retryable() {
            return Err(stage_error);
        }

        let delay = policy.delay_after(attempt);
        warn!(
            workflow_id = %workflow_id,
            stage = descriptor.stage.as_str(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %stage_error,
            "stage attempt failed; retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = env.gate.shutdown.cancelled() => return Err(stage_error),
        }
        if env.is_terminal(workflow_id).await {
            return Err(stage_error);
        }
        attempt += 1;
    }
}

/// Run a workflow on its own task and turn a crash into a recorded failure.
pub(crate) async fn supervise_run(env: RunEnvironment, workflow_id: String) {
    let run = tokio::spawn(drive_workflow_run(env.clone(), workflow_id.clone()));
    let failure = match run.await {
        Ok(Ok(status)) => {
            info!(workflow_id = %workflow_id, status = %status, "workflow run finished");
            None
        }
        Ok(Err(store_error)) => Some(format!("internal error: {store_error}")),
        Err(join_error) => Some(describe_join_error(join_error)),
    };

    let Some(message) = failure else {
        return;
    };
    error!(workflow_id = %workflow_id, error = %message, "workflow run crashed");
    let recorded = env
        .guarded(&workflow_id, |workflow| workflow.fail(message))
        .await;
    if let Err(store_error) = recorded {
        error!(workflow_id = %workflow_id, error = %store_error, "could not record crashed run");
    }
}

fn describe_join_error(join_error: JoinError) -> String {
    if join_error.is_panic() {
        format!("internal error: workflow run panicked: {}", panic_message(join_error.into_panic()))
    } else {
        format!("internal error: workflow run aborted: {join_error}")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
