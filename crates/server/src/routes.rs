//! Route table and handlers for the workflow API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sparta_engine::WorkflowEngine;
use sparta_types::{CancelReceipt, CreateWorkflowRequest, WorkflowResult, WorkflowStatus};
use tracing::debug;

use crate::error::ApiError;

pub const SERVICE_NAME: &str = "sparta-orchestrator";

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub workflows: usize,
}

/// Build the API router around a shared engine.
pub fn router(engine: Arc<WorkflowEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workflows", post(create_workflow))
        .route("/workflows/{workflow_id}", get(workflow_status).delete(cancel_workflow))
        .route("/workflows/{workflow_id}/result", get(workflow_result))
        .with_state(engine)
}

async fn health(State(engine): State<Arc<WorkflowEngine>>) -> Json<HealthReport> {
    Json(HealthReport {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        status: if engine.is_accepting() { "healthy" } else { "shutting_down" },
        workflows: engine.store().len().await,
    })
}

async fn create_workflow(
    State(engine): State<Arc<WorkflowEngine>>,
    body: Result<Json<CreateWorkflowRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WorkflowStatus>), ApiError> {
    let Json(request) = body?;
    debug!(workflow_id = ?request.workflow_id, "create workflow requested");
    let status = engine.create_workflow(request).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

async fn workflow_status(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowStatus>, ApiError> {
    Ok(Json(engine.get_workflow_status(&workflow_id).await?))
}

async fn workflow_result(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowResult>, ApiError> {
    Ok(Json(engine.get_workflow_result(&workflow_id).await?))
}

async fn cancel_workflow(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<CancelReceipt>, ApiError> {
    Ok(Json(engine.cancel_workflow(&workflow_id).await?))
}
