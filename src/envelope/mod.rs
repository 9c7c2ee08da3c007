use crate::blobs::BlobRef;
use crate::contracts::SchemaViolation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod wrap;
pub use wrap::{read_envelope, validate_and_wrap, write_envelope, AgentIdentity, WrapRequest};

/// The only top-level keys an envelope file may carry.
pub const ENVELOPE_KEYS: [&str; 8] = [
    "result",
    "assumptions",
    "confidence",
    "trace",
    "provenance",
    "schema_version",
    "data_sha256",
    "blob_refs",
];

pub const TRACE_ID_MIN_LEN: usize = 16;
pub const TRACE_ID_MAX_LEN: usize = 36;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Validation(#[from] SchemaViolation),
    #[error("failed to encode envelope for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid envelope json in {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("envelope io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub result: Value,
    pub assumptions: Vec<String>,
    pub confidence: f64,
    pub trace: Trace,
    pub provenance: Provenance,
    pub schema_version: String,
    pub data_sha256: String,
    pub blob_refs: Vec<BlobRef>,
}

impl Envelope {
    pub fn trace_id(&self) -> &str {
        &self.trace.ids.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.trace.ids.span_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub ids: TraceIds,
    pub code_version: CodeVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceIds {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVersion {
    pub git_sha: String,
    pub dirty: bool,
    #[serde(default)]
    pub build_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub agent: String,
    pub version: String,
    pub code_sha: String,
    pub started_at: f64,
    pub finished_at: f64,
    pub inputs_hash: String,
    pub schema_version: String,
    pub pid: u32,
    pub hostname: String,
    pub monotonic_ms: f64,
    #[serde(default)]
    pub queue_version: Option<String>,
}

/// Trace ids are digests, not random: the same request bytes always map to the same
/// trace, and the same canonical result to the same span.
pub fn trace_id_for_input(input_sha256: &str) -> String {
    short_id(input_sha256)
}

pub fn span_id_for_result(data_sha256: &str) -> String {
    short_id(data_sha256)
}

fn short_id(sha256: &str) -> String {
    sha256
        .get(..crate::shared::digest::SHORT_ID_LEN)
        .unwrap_or(sha256)
        .to_string()
}

pub fn is_trace_id_shaped(raw: &str) -> bool {
    (TRACE_ID_MIN_LEN..=TRACE_ID_MAX_LEN).contains(&raw.len())
        && raw
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_shape_accepts_hex_and_uuid_like_values() {
        assert!(is_trace_id_shaped("0123456789abcdef"));
        assert!(is_trace_id_shaped("01234567-89ab-cdef-0123-456789abcdef"));
        assert!(!is_trace_id_shaped("dup"));
        assert!(!is_trace_id_shaped("0123456789ABCDEF"));
        assert!(!is_trace_id_shaped(&"a".repeat(37)));
    }
}
