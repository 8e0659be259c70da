//! Executors that call the downstream stage services over HTTP.
//!
//! Each executor owns a [`StageClient`] handle and a validated base URL, builds
//! the service request from the [`StageContext`], and checks the response
//! against its contract before exporting carry values. The raw response object
//! is what gets stored as the stage payload.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sparta_api::{StageClient, Url};
use sparta_types::stage::{
    EmulateRequest, EmulateResponse, GenerateRequest, GenerateResponse, ParseRequest, ParseResponse, SynthesizeRequest,
    SynthesizeResponse,
};
use sparta_types::{JsonObject, RemoteError};
use tracing::debug;

use super::{StageContext, StageExecutor, StageOutput, carry};

/// Parameter key that overrides the generation language for one workflow.
pub const LANGUAGE_PARAMETER: &str = "language";
/// Parameter key that overrides the emulation cycle count for one workflow.
pub const NUM_CYCLES_PARAMETER: &str = "num_cycles";

/// NLP agent: turns the free-text request into a structured spec.
#[derive(Debug, Clone)]
pub struct ParseExecutor {
    client: StageClient,
    base_url: Url,
}

impl ParseExecutor {
    pub fn new(client: StageClient, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl StageExecutor for ParseExecutor {
    fn name(&self) -> &str {
        "nlp-agent"
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, RemoteError> {
        let request = ParseRequest {
            text: context.user_input.clone(),
            context: context.metadata.clone(),
        };
        let payload = self.client.post_json(&self.base_url, "/parse", &request).await?;
        let response: ParseResponse = decode_contract(&payload, "parse")?;
        debug!(workflow_id = %context.workflow_id, intent = %response.intent, confidence = response.confidence, "parsed design request");

        Ok(StageOutput::new(payload)
            .with_carry(carry::PARSED_SPEC, Value::Object(response.entities))
            .with_carry(carry::CONSTRAINTS, Value::Object(response.constraints)))
    }
}

/// Synthesis agent: derives an architecture from the parsed spec.
#[derive(Debug, Clone)]
pub struct SynthesizeExecutor {
    client: StageClient,
    base_url: Url,
}

impl SynthesizeExecutor {
    pub fn new(client: StageClient, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl StageExecutor for SynthesizeExecutor {
    fn name(&self) -> &str {
        "synthesis-agent"
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, RemoteError> {
        let request = SynthesizeRequest {
            spec: context.carry_object(carry::PARSED_SPEC),
            constraints: context.carry_object(carry::CONSTRAINTS),
        };
        let payload = self.client.post_json(&self.base_url, "/synthesize", &request).await?;
        let response: SynthesizeResponse = decode_contract(&payload, "synthesize")?;
        debug!(workflow_id = %context.workflow_id, components = response.components.len(), "synthesized architecture");

        Ok(StageOutput::new(payload).with_carry(carry::ARCHITECTURE, Value::Object(response.architecture)))
    }
}

/// RTL generator: emits HDL source for the architecture.
#[derive(Debug, Clone)]
pub struct GenerateExecutor {
    client: StageClient,
    base_url: Url,
    default_language: String,
}

impl GenerateExecutor {
    pub fn new(client: StageClient, base_url: Url, default_language: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            default_language: default_language.into(),
        }
    }
}

#[async_trait]
impl StageExecutor for GenerateExecutor {
    fn name(&self) -> &str {
        "rtl-generator"
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, RemoteError> {
        let language = context
            .parameter_str(LANGUAGE_PARAMETER)
            .unwrap_or(&self.default_language)
            .to_string();
        let request = GenerateRequest {
            spec: context.carry_object(carry::ARCHITECTURE),
            language,
        };
        let payload = self.client.post_json(&self.base_url, "/generate", &request).await?;
        let response: GenerateResponse = decode_contract(&payload, "generate")?;
        debug!(workflow_id = %context.workflow_id, module = %response.module_name, language = %response.language, "generated rtl");

        Ok(StageOutput::new(payload)
            .with_carry(carry::RTL_CODE, Value::String(response.code))
            .with_carry(carry::MODULE_NAME, Value::String(response.module_name)))
    }
}

/// Emulator: runs the generated module and reports metrics.
#[derive(Debug, Clone)]
pub struct EmulateExecutor {
    client: StageClient,
    base_url: Url,
    default_cycles: u64,
}

impl EmulateExecutor {
    pub fn new(client: StageClient, base_url: Url, default_cycles: u64) -> Self {
        Self {
            client,
            base_url,
            default_cycles,
        }
    }
}

#[async_trait]
impl StageExecutor for EmulateExecutor {
    fn name(&self) -> &str {
        "emulator"
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, RemoteError> {
        let mut config = JsonObject::new();
        config.insert("module".into(), Value::String(context.carry_str(carry::MODULE_NAME).to_string()));
        let request = EmulateRequest {
            instructions: Vec::new(),
            num_cycles: context.parameter_u64(NUM_CYCLES_PARAMETER).unwrap_or(self.default_cycles),
            config,
        };
        let payload = self.client.post_json(&self.base_url, "/emulate", &request).await?;
        let response: EmulateResponse = decode_contract(&payload, "emulate")?;
        debug!(workflow_id = %context.workflow_id, cycles = response.cycles_executed, "emulation finished");

        let mut output = StageOutput::new(payload);
        if let Some(waveform) = response.waveform_data.filter(|handle| !handle.is_empty()) {
            output = output.with_artifact(waveform);
        }
        Ok(output)
    }
}

fn decode_contract<T: DeserializeOwned>(payload: &JsonObject, contract: &str) -> Result<T, RemoteError> {
    serde_json::from_value(Value::Object(payload.clone()))
        .map_err(|error| RemoteError::malformed(format!("{contract} response does not match its contract: {error}")))
}
