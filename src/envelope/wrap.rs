use super::{
    span_id_for_result, trace_id_for_input, CodeVersion, Envelope, EnvelopeError, Provenance,
    Trace, TraceIds,
};
use crate::blobs::BlobRef;
use crate::contracts::{validate_value, ResultContract};
use crate::shared::digest::{canonical_sha256, sha256_hex};
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::host::host_name;
use crate::shared::time::now_wall_secs;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub name: String,
    pub version: String,
    pub code_sha: String,
}

#[derive(Debug, Clone)]
pub struct WrapRequest<'a> {
    pub raw: &'a Value,
    pub identity: &'a AgentIdentity,
    /// Wall-clock start, seconds since the epoch.
    pub started_at: f64,
    /// Monotonic start; elapsed time is measured from here.
    pub started: Instant,
    pub input_bytes: &'a [u8],
    pub schema_version: &'a str,
    pub blob_refs: Vec<BlobRef>,
    pub queue_version: Option<&'a str>,
}

/// Validates `raw` against `T`, then builds the envelope around the canonical form of
/// the validated value. Nothing is written here; a violation leaves no trace on disk.
pub fn validate_and_wrap<T: ResultContract>(
    request: WrapRequest<'_>,
) -> Result<Envelope, EnvelopeError> {
    let validated: T = validate_value(request.raw)?;
    let result = serde_json::to_value(&validated).map_err(|source| EnvelopeError::Encode {
        path: format!("{} result", request.identity.name),
        source,
    })?;
    let data_sha256 = canonical_sha256(&result);
    let inputs_hash = sha256_hex(request.input_bytes);

    let provenance = Provenance {
        agent: request.identity.name.clone(),
        version: request.identity.version.clone(),
        code_sha: request.identity.code_sha.clone(),
        started_at: request.started_at,
        finished_at: now_wall_secs(),
        inputs_hash: inputs_hash.clone(),
        schema_version: request.schema_version.to_string(),
        pid: std::process::id(),
        hostname: host_name(),
        monotonic_ms: request.started.elapsed().as_secs_f64() * 1000.0,
        queue_version: request.queue_version.map(str::to_string),
    };

    Ok(Envelope {
        assumptions: validated.assumptions(),
        confidence: validated.confidence(),
        trace: Trace {
            ids: TraceIds {
                trace_id: trace_id_for_input(&inputs_hash),
                span_id: span_id_for_result(&data_sha256),
                parent_span_id: None,
            },
            code_version: CodeVersion {
                git_sha: request.identity.code_sha.clone(),
                dirty: false,
                build_id: None,
            },
        },
        provenance,
        schema_version: request.schema_version.to_string(),
        data_sha256,
        blob_refs: request.blob_refs,
        result,
    })
}

/// Durable write: temp file, fsync, rename over `path`, fsync the directory.
/// Returns the number of bytes written.
pub fn write_envelope(path: &Path, envelope: &Envelope) -> Result<usize, EnvelopeError> {
    let body = serde_json::to_vec_pretty(envelope).map_err(|source| EnvelopeError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    atomic_write_file(path, &body).map_err(|e| io_error(path, e))?;
    Ok(body.len())
}

pub fn read_envelope(path: &Path) -> Result<Envelope, EnvelopeError> {
    let raw = fs::read(path).map_err(|e| io_error(path, e))?;
    serde_json::from_slice(&raw).map_err(|source| EnvelopeError::Decode {
        path: path.display().to_string(),
        source,
    })
}

fn io_error(path: &Path, source: std::io::Error) -> EnvelopeError {
    EnvelopeError::Io {
        path: path.display().to_string(),
        source,
    }
}
