//! Stage executors: the seam between the engine and the work a stage performs.
//!
//! - [`StageExecutor`] abstracts how one stage is carried out
//! - [`StageContext`] is the read-only view an executor receives
//! - [`http`] holds the executors that call the real stage services
//!
//! An executor never touches workflow state. It returns a [`StageOutput`] or a
//! [`RemoteError`], and the engine records the outcome.

use async_trait::async_trait;
use serde_json::Value;
use sparta_types::{JsonObject, RemoteError, Workflow};

pub mod http;
pub use http::{EmulateExecutor, GenerateExecutor, ParseExecutor, SynthesizeExecutor};

/// Keys of the values that flow from one stage into the next.
pub mod carry {
    pub const PARSED_SPEC: &str = "parsed_spec";
    pub const CONSTRAINTS: &str = "constraints";
    pub const ARCHITECTURE: &str = "architecture";
    pub const RTL_CODE: &str = "rtl_code";
    pub const MODULE_NAME: &str = "module_name";
}

/// Inputs available to a stage executor.
///
/// `carry` accumulates the values earlier stages exported; a stage reads
/// only the keys it needs and treats missing keys as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageContext {
    pub workflow_id: String,
    pub user_input: String,
    pub parameters: JsonObject,
    pub metadata: JsonObject,
    pub carry: JsonObject,
}

impl StageContext {
    /// Seed a context from the creation-time fields of a workflow.
    pub fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.id.clone(),
            user_input: workflow.user_input.clone(),
            parameters: workflow.parameters.clone(),
            metadata: workflow.metadata.clone(),
            carry: JsonObject::new(),
        }
    }

    /// Fold a stage's exported values into the carry, later stages winning.
    pub fn merge_carry(&mut self, carry: JsonObject) {
        self.carry.extend(carry);
    }

    /// Carried object under `key`, or an empty object.
    pub fn carry_object(&self, key: &str) -> JsonObject {
        match self.carry.get(key) {
            Some(Value::Object(map)) => map.clone(),
            _ => JsonObject::new(),
        }
    }

    /// Carried string under `key`, or an empty string.
    pub fn carry_str(&self, key: &str) -> &str {
        self.carry.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn parameter_u64(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(Value::as_u64).filter(|value| *value > 0)
    }
}

/// Successful result of a stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    /// Stored under the stage key in the workflow's results.
    pub payload: JsonObject,
    /// Values made available to later stages.
    pub carry: JsonObject,
    /// References appended to the workflow's artifacts.
    pub artifacts: Vec<String>,
}

impl StageOutput {
    pub fn new(payload: JsonObject) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    pub fn with_carry(mut self, key: &str, value: Value) -> Self {
        self.carry.insert(key.to_string(), value);
        self
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifacts.push(artifact.into());
        self
    }
}

/// Carries out one workflow stage.
///
/// Implementations must be safe to call concurrently for different workflows.
/// Every failure, including transport errors and malformed responses, is
/// returned as a [`RemoteError`]; implementations should not panic.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, RemoteError>;
}
