//! Declarative stage pipeline.
//!
//! A [`Pipeline`] is an ordered list of stages, each bound to the executor that
//! performs it. The run loop walks the list and never hard-codes stage order,
//! so the pipeline length is the denominator for progress.

use std::fmt;
use std::sync::Arc;

use sparta_api::{StageClient, validate_base_url};
use sparta_types::WorkflowStage;
use thiserror::Error;

use crate::config::{ServiceEndpoints, StageDefaults};
use crate::executor::{EmulateExecutor, GenerateExecutor, ParseExecutor, StageExecutor, SynthesizeExecutor};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline must contain at least one stage")]
    Empty,

    #[error("stage '{stage}' cannot be executed")]
    NotExecutable { stage: WorkflowStage },

    #[error("stage '{stage}' must come after '{previous}'")]
    OutOfOrder { stage: WorkflowStage, previous: WorkflowStage },

    #[error("stage '{stage}' skips '{expected}'")]
    SkippedStage { stage: WorkflowStage, expected: WorkflowStage },

    #[error("invalid endpoint for {service}: {reason}")]
    InvalidEndpoint { service: &'static str, reason: String },
}

/// One pipeline entry: a stage and the executor bound to it.
#[derive(Clone)]
pub struct StageDescriptor {
    pub stage: WorkflowStage,
    pub executor: Arc<dyn StageExecutor>,
}

impl StageDescriptor {
    pub fn new(stage: WorkflowStage, executor: impl StageExecutor + 'static) -> Self {
        Self {
            stage,
            executor: Arc::new(executor),
        }
    }
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("stage", &self.stage)
            .field("executor", &self.executor.name())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<StageDescriptor>,
}

impl Pipeline {
    /// Build a pipeline, rejecting empty lists, the `Complete` marker, and
    /// stages that repeat or run out of canonical order.
    ///
    /// The stages must form a contiguous prefix of [`WorkflowStage::PIPELINE`]
    /// so that `stages_completed` is always a prefix of the canonical order.
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::Empty);
        }
        let mut previous: Option<WorkflowStage> = None;
        for (index, descriptor) in stages.iter().enumerate() {
            if !descriptor.stage.is_executable() {
                return Err(PipelineError::NotExecutable { stage: descriptor.stage });
            }
            if let Some(previous) = previous
                && descriptor.stage <= previous
            {
                return Err(PipelineError::OutOfOrder {
                    stage: descriptor.stage,
                    previous,
                });
            }
            if let Some(&expected) = WorkflowStage::PIPELINE.get(index)
                && descriptor.stage != expected
            {
                return Err(PipelineError::SkippedStage {
                    stage: descriptor.stage,
                    expected,
                });
            }
            previous = Some(descriptor.stage);
        }
        Ok(Self { stages })
    }

    /// The four-stage pipeline backed by the HTTP stage services.
    pub fn http(endpoints: &ServiceEndpoints, defaults: &StageDefaults, client: StageClient) -> Result<Self, PipelineError> {
        let endpoint = |service: &'static str, raw: &str| {
            validate_base_url(raw).map_err(|error| PipelineError::InvalidEndpoint {
                service,
                reason: error.to_string(),
            })
        };

        Self::new(vec![
            StageDescriptor::new(
                WorkflowStage::Parsing,
                ParseExecutor::new(client.clone(), endpoint("nlp agent", &endpoints.nlp_agent_url)?),
            ),
            StageDescriptor::new(
                WorkflowStage::Synthesis,
                SynthesizeExecutor::new(client.clone(), endpoint("synthesis agent", &endpoints.synthesis_agent_url)?),
            ),
            StageDescriptor::new(
                WorkflowStage::Generation,
                GenerateExecutor::new(
                    client.clone(),
                    endpoint("rtl generator", &endpoints.rtl_generator_url)?,
                    defaults.language.clone(),
                ),
            ),
            StageDescriptor::new(
                WorkflowStage::Emulation,
                EmulateExecutor::new(client, endpoint("emulator", &endpoints.emulator_url)?, defaults.emulation_cycles),
            ),
        ])
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
