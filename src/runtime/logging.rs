use super::StatePaths;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;

/// Operational log record. `agent` and `task_id` are only emitted when known, so a
/// reader can filter `runtime.log` per task without parsing `message`.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeLogEntry<'a> {
    pub level: &'a str,
    pub event: &'a str,
    pub agent: Option<&'a str>,
    pub task_id: Option<&'a str>,
    pub message: &'a str,
}

impl RuntimeLogEntry<'_> {
    fn to_json(self) -> Value {
        let mut record = Map::new();
        record.insert(
            "timestamp".to_string(),
            Value::from(crate::shared::time::now_rfc3339()),
        );
        record.insert("level".to_string(), Value::from(self.level));
        record.insert("event".to_string(), Value::from(self.event));
        record.insert("pid".to_string(), Value::from(std::process::id()));
        if let Some(agent) = self.agent {
            record.insert("agent".to_string(), Value::from(agent));
        }
        if let Some(task_id) = self.task_id {
            record.insert("task_id".to_string(), Value::from(task_id));
        }
        record.insert("message".to_string(), Value::from(self.message));
        Value::Object(record)
    }
}

pub fn append_runtime_log(paths: &StatePaths, level: &str, event: &str, message: &str) {
    write_entry(
        paths,
        RuntimeLogEntry {
            level,
            event,
            agent: None,
            task_id: None,
            message,
        },
    );
}

pub fn append_task_log(
    paths: &StatePaths,
    level: &str,
    event: &str,
    agent: &str,
    task_id: &str,
    message: &str,
) {
    write_entry(
        paths,
        RuntimeLogEntry {
            level,
            event,
            agent: Some(agent),
            task_id: Some(task_id),
            message,
        },
    );
}

/// Never fails the caller; a log line that cannot be written is dropped.
pub fn write_entry(paths: &StatePaths, entry: RuntimeLogEntry<'_>) {
    let Ok(line) = serde_json::to_string(&entry.to_json()) else {
        return;
    };

    let path = paths.runtime_log_path();
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(file, "{line}");
}
