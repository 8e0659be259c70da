//! HTTP API for the SPARTA workflow orchestrator.
//!
//! Exposes the engine operations as JSON endpoints:
//!
//! | method | path | operation |
//! |---|---|---|
//! | `POST` | `/workflows` | create a workflow (201) |
//! | `GET` | `/workflows/{id}` | status snapshot |
//! | `GET` | `/workflows/{id}/result` | result snapshot |
//! | `DELETE` | `/workflows/{id}` | cancel |
//! | `GET` | `/health` | liveness and workflow count |
//!
//! Failures are answered with `{"error": <code>, "message": <text>}`.

pub mod error;
pub mod http;
pub mod routes;

pub use error::ApiError;
pub use http::{OrchestratorHttpServer, RunningOrchestratorServer, resolve_bind_address};
pub use routes::{HealthReport, SERVICE_NAME, router};
