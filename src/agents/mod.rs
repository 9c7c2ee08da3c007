use crate::contracts::{ResultContract, TaskRequest};
use serde_json::Value;

pub mod materials;
pub mod stackup;

pub use materials::MaterialsAgent;
pub use stackup::StackupAgent;

pub const BUILTIN_AGENTS: [&str; 2] = [materials::AGENT_NAME, stackup::AGENT_NAME];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("agent computation failed: {0}")]
pub struct AgentError(pub String);

/// Bytes the worker should place in the blob store and reference from the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPayload {
    pub bytes: Vec<u8>,
    pub ext: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    /// Unvalidated result; the worker checks it against `Response` before wrapping.
    pub result: Value,
    pub blobs: Vec<BlobPayload>,
}

/// Domain logic for one agent: a pure function of the validated request.
pub trait AgentLogic: Send + Sync {
    type Request: TaskRequest;
    type Response: ResultContract;

    fn name(&self) -> &'static str;

    fn compute(&self, request: &Self::Request) -> Result<AgentOutput, AgentError>;
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
