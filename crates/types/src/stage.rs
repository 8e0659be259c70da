//! Request/response contracts of the downstream stage services.
//!
//! Field names match the JSON the existing services speak, so these types can
//! be swapped in front of the real agents without translation. Response types
//! are lenient (`#[serde(default)]`) where the services treat fields as optional.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::workflow::JsonObject;

/// `POST /parse` on the NLP agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseRequest {
    pub text: String,
    #[serde(default)]
    pub context: JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseResponse {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub entities: JsonObject,
    #[serde(default)]
    pub constraints: JsonObject,
    #[serde(default)]
    pub confidence: f64,
}

/// `POST /synthesize` on the synthesis agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesizeRequest {
    pub spec: JsonObject,
    #[serde(default)]
    pub constraints: JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesizeResponse {
    #[serde(default)]
    pub architecture: JsonObject,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub estimated_metrics: JsonObject,
}

/// `POST /generate` on the RTL generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateRequest {
    pub spec: JsonObject,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    #[serde(default)]
    pub code: String,
    /// Empty when the generator omits it; emulation then runs without a module.
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub language: String,
}

/// `POST /emulate` on the emulator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmulateRequest {
    pub instructions: Vec<JsonValue>,
    pub num_cycles: u64,
    #[serde(default)]
    pub config: JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmulateResponse {
    #[serde(default)]
    pub cycles_executed: u64,
    #[serde(default)]
    pub outputs: Vec<JsonValue>,
    /// The emulator names this `performance_metrics`.
    #[serde(default, alias = "performance_metrics")]
    pub metrics: JsonObject,
    /// Handle to the recorded waveform, surfaced as a workflow artifact.
    #[serde(default, alias = "waveform")]
    pub waveform_data: Option<String>,
}
