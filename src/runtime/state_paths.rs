use super::RuntimeError;
use std::fs;
use std::path::{Path, PathBuf};

pub const ROOT_ENV_VAR: &str = "APEX_ROOT";

/// Every shared location derives from one root; components receive this handle rather
/// than reaching for process-wide paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![
            self.queue_root(),
            self.runs_dir(),
            self.schemas_dir(),
            self.orchestrator_artifacts_dir(),
            self.blobs_dir(),
            self.logs_dir(),
        ]
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("apex.yaml")
    }

    pub fn queue_root(&self) -> PathBuf {
        self.root.join("queue")
    }

    pub fn agent_queue_dir(&self, agent: &str) -> PathBuf {
        self.queue_root().join(agent.to_ascii_lowercase())
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.runs_dir().join(task_id)
    }

    pub fn task_out_dir(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join("out")
    }

    pub fn envelope_path(&self, task_id: &str, agent: &str) -> PathBuf {
        self.task_out_dir(task_id).join(format!("{agent}.json"))
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.artifacts_dir().join("schemas")
    }

    pub fn orchestrator_artifacts_dir(&self) -> PathBuf {
        self.artifacts_dir().join("orchestrator")
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.artifacts_dir().join("blobs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.artifacts_dir().join("logs")
    }

    pub fn events_log_path(&self) -> PathBuf {
        self.logs_dir().join("events.ndjson")
    }

    pub fn runtime_log_path(&self) -> PathBuf {
        self.logs_dir().join("runtime.log")
    }

    pub fn report_path(&self, task_id: &str) -> PathBuf {
        self.orchestrator_artifacts_dir().join(format!("{task_id}.md"))
    }

    pub fn findings_path(&self, task_id: &str) -> PathBuf {
        self.orchestrator_artifacts_dir()
            .join(format!("{task_id}_verify_fail.md"))
    }
}

pub fn default_state_root_path() -> PathBuf {
    std::env::var_os(ROOT_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), RuntimeError> {
    for path in paths.required_directories() {
        create_dir(&path)?;
    }
    Ok(())
}

pub(crate) fn create_dir(path: &Path) -> Result<(), RuntimeError> {
    fs::create_dir_all(path).map_err(|source| RuntimeError::CreateDir {
        path: path.display().to_string(),
        source,
    })
}
