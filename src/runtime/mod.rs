pub mod agent_worker;
pub mod logging;
pub mod state_paths;
pub mod worker_primitives;

pub use agent_worker::{AgentWorker, DrainSummary, ItemOutcome};
pub use logging::{append_runtime_log, append_task_log, write_entry, RuntimeLogEntry};
pub use state_paths::{bootstrap_state_root, default_state_root_path, StatePaths, ROOT_ENV_VAR};
pub use worker_primitives::{sleep_with_stop, PollDelays};

use crate::blobs::BlobError;
use crate::config::ConfigError;
use crate::envelope::EnvelopeError;
use crate::events::EventLogError;
use crate::index::IndexError;
use crate::queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Events(#[from] EventLogError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    #[test]
    fn bootstrap_creates_required_directories() {
        let dir = tempdir().expect("temp dir");
        let paths = StatePaths::new(dir.path().join("state"));
        bootstrap_state_root(&paths).expect("bootstrap succeeds");

        for required in paths.required_directories() {
            assert!(
                required.is_dir(),
                "missing directory: {}",
                required.display()
            );
        }
    }

    #[test]
    fn state_paths_place_outputs_under_the_task() {
        let paths = StatePaths::new("/srv/apex");
        assert_eq!(
            paths.envelope_path("t1", "materials"),
            std::path::PathBuf::from("/srv/apex/runs/t1/out/materials.json")
        );
        assert_eq!(
            paths.findings_path("t1"),
            std::path::PathBuf::from("/srv/apex/artifacts/orchestrator/t1_verify_fail.md")
        );
        assert_eq!(
            paths.agent_queue_dir("Materials"),
            std::path::PathBuf::from("/srv/apex/queue/materials")
        );
    }

    #[test]
    fn sleep_with_stop_returns_early_when_stopped() {
        let stop = AtomicBool::new(true);
        let started = Instant::now();
        assert!(!sleep_with_stop(&stop, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));

        stop.store(false, Ordering::Relaxed);
        assert!(sleep_with_stop(&stop, Duration::from_millis(1)));
    }

    #[test]
    fn runtime_log_lines_are_json() {
        let dir = tempdir().expect("temp dir");
        let paths = StatePaths::new(dir.path());
        append_runtime_log(&paths, "info", "worker.started", "materials");
        let raw = std::fs::read_to_string(paths.runtime_log_path()).expect("read log");
        let line: serde_json::Value = serde_json::from_str(raw.trim()).expect("json line");
        assert_eq!(line["event"], "worker.started");
        assert_eq!(line["level"], "info");
    }

    #[test]
    fn task_log_lines_carry_agent_and_task() {
        let dir = tempdir().expect("temp dir");
        let paths = StatePaths::new(dir.path());
        append_runtime_log(&paths, "info", "worker.started", "materials");
        append_task_log(&paths, "error", "worker.failed", "stackup", "t7", "bad result");
        let raw = std::fs::read_to_string(paths.runtime_log_path()).expect("read log");
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].get("task_id").is_none());
        assert_eq!(lines[0]["pid"], std::process::id());
        assert_eq!(lines[1]["agent"], "stackup");
        assert_eq!(lines[1]["task_id"], "t7");
        assert_eq!(lines[1]["message"], "bad result");
    }
}
