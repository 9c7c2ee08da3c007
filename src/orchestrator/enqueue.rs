use super::{parse_task_id, OrchestratorError};
use crate::agents::{materials, stackup};
use crate::contracts::materials::MaterialPickRequest;
use crate::contracts::stackup::StackupAnalyzeRequest;
use crate::contracts::{validate_value, TaskRequest};
use crate::queue::{queue_item_filename, QueuePaths};
use crate::runtime::{append_runtime_log, append_task_log, StatePaths};
use crate::shared::digest::{canonical_json_bytes, sha256_hex, SHORT_ID_LEN};
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::logging::append_task_status_line;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub agent: String,
    pub task_id: String,
    pub payload_hash: String,
    pub path: PathBuf,
    /// False when an identical payload was already waiting in the inbox.
    pub created: bool,
}

/// Checks `payload` against the request contract of `agent` and returns its task id.
pub fn validate_request_for_agent(agent: &str, payload: &Value) -> Result<String, OrchestratorError> {
    let invalid = |source| OrchestratorError::InvalidRequest {
        agent: agent.to_string(),
        source,
    };
    match agent {
        materials::AGENT_NAME => validate_value::<MaterialPickRequest>(payload)
            .map(|request| request.task_id().to_string())
            .map_err(invalid),
        stackup::AGENT_NAME => validate_value::<StackupAnalyzeRequest>(payload)
            .map(|request| request.task_id().to_string())
            .map_err(invalid),
        other => Err(OrchestratorError::UnknownAgent {
            agent: other.to_string(),
        }),
    }
}

pub fn enqueue_request<R: TaskRequest>(
    paths: &StatePaths,
    agent: &str,
    request: &R,
) -> Result<Enqueued, OrchestratorError> {
    let payload = serde_json::to_value(request)
        .map_err(|source| OrchestratorError::json(&paths.agent_queue_dir(agent), source))?;
    enqueue_payload(paths, agent, &payload)
}

/// Writes the canonical form of `payload` into the agent's inbox as
/// `<task_id>__<hash16>.json`. Identical payloads map to the same file, so enqueueing
/// twice leaves one pending item.
pub fn enqueue_payload(
    paths: &StatePaths,
    agent: &str,
    payload: &Value,
) -> Result<Enqueued, OrchestratorError> {
    let agent = agent.to_ascii_lowercase();
    let task_id = parse_task_id(&validate_request_for_agent(&agent, payload)?)?;

    let canonical = canonical_json_bytes(payload);
    let digest = sha256_hex(&canonical);
    let payload_hash = digest[..SHORT_ID_LEN].to_string();

    let queue_paths = QueuePaths::for_agent(paths, &agent);
    fs::create_dir_all(&queue_paths.inbox)
        .map_err(|e| OrchestratorError::io(&queue_paths.inbox, e))?;
    let path = queue_paths
        .inbox
        .join(queue_item_filename(task_id.as_str(), &payload_hash));

    let created = !path.exists();
    if created {
        atomic_write_file(&path, &canonical).map_err(|e| OrchestratorError::io(&path, e))?;
        let task_dir = paths.task_dir(task_id.as_str());
        if let Err(err) = append_task_status_line(&task_dir, "orchestrator", "enqueued", &agent) {
            append_runtime_log(
                paths,
                "warn",
                "orchestrator.status_log",
                &format!("{}: {err}", task_dir.display()),
            );
        }
    }
    append_task_log(
        paths,
        "info",
        if created {
            "orchestrator.enqueued"
        } else {
            "orchestrator.enqueue_pending"
        },
        &agent,
        task_id.as_str(),
        &payload_hash,
    );

    Ok(Enqueued {
        agent,
        task_id: task_id.to_string(),
        payload_hash,
        path,
        created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn materials_payload(task_id: &str) -> Value {
        json!({
            "task_id": task_id,
            "application": "outdoor bracket",
            "weights": {"cost": 0.3, "strength": 0.5, "corrosion": 0.2}
        })
    }

    #[test]
    fn identical_payloads_share_one_inbox_file() {
        let dir = tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());

        let first = enqueue_payload(&paths, "materials", &materials_payload("t1")).expect("first");
        let second =
            enqueue_payload(&paths, "Materials", &materials_payload("t1")).expect("second");

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.path, second.path);
        assert!(first
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("t1__") && n.ends_with(".json")));
        let written = fs::read(&first.path).expect("read item");
        assert_eq!(sha256_hex(&written)[..SHORT_ID_LEN], first.payload_hash);
    }

    #[test]
    fn rejects_unknown_agents_and_invalid_requests() {
        let dir = tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());

        assert!(matches!(
            enqueue_payload(&paths, "dfma", &materials_payload("t1")),
            Err(OrchestratorError::UnknownAgent { .. })
        ));
        assert!(matches!(
            enqueue_payload(&paths, "materials", &json!({"task_id": "t1"})),
            Err(OrchestratorError::InvalidRequest { .. })
        ));
        assert!(matches!(
            enqueue_payload(&paths, "materials", &materials_payload("../t1")),
            Err(OrchestratorError::InvalidTaskId { .. })
        ));
        assert!(!paths.agent_queue_dir("dfma").exists());
    }
}
