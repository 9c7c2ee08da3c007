use crate::blobs::BlobRef;
use crate::shared::time::{now_rfc3339, now_wall_secs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EVENT_SCHEMA_VERSION: &str = "events-1";

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("event log io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode event for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Claimed,
    Completed,
    SkippedDuplicate,
    Failed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claimed => "claimed",
            Self::Completed => "completed",
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::Failed => "failed",
        }
    }

    pub fn default_level(self) -> &'static str {
        match self {
            Self::Failed => "error",
            Self::SkippedDuplicate => "warn",
            Self::Claimed | Self::Completed => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub schema_version: String,
    pub ts: String,
    pub wall_ts: f64,
    pub level: String,
    pub kind: EventKind,
    pub event: String,
    pub task_id: String,
    pub agent: String,
    pub trace_id: String,
    pub span_id: String,
    pub data_sha256: String,
    #[serde(default)]
    pub blob_refs: Vec<BlobRef>,
    pub attempt: u32,
    pub monotonic_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Event {
    /// Stamps the wall clock at construction; optional fields start empty.
    pub fn new(kind: EventKind, task_id: &str, agent: &str) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION.to_string(),
            ts: now_rfc3339(),
            wall_ts: now_wall_secs(),
            level: kind.default_level().to_string(),
            kind,
            event: kind.as_str().to_string(),
            task_id: task_id.to_string(),
            agent: agent.to_string(),
            trace_id: String::new(),
            span_id: String::new(),
            data_sha256: String::new(),
            blob_refs: Vec::new(),
            attempt: 1,
            monotonic_ms: 0.0,
            duration_ms: None,
            input_bytes: None,
            output_bytes: None,
            result_size_bytes: None,
            message: None,
        }
    }

    pub fn with_ids(mut self, trace_id: &str, span_id: &str) -> Self {
        self.trace_id = trace_id.to_string();
        self.span_id = span_id.to_string();
        self
    }

    pub fn with_digest(mut self, data_sha256: &str) -> Self {
        self.data_sha256 = data_sha256.to_string();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// The fields ordering checks need, read leniently so that hand-written or older
/// records still participate.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStamp {
    pub line_no: usize,
    pub agent: String,
    pub wall_ts: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventLine {
    Event(Box<Event>),
    Malformed { line_no: usize },
}

/// Append-only ndjson audit trail. Writers append whole lines; single-writer discipline
/// per (task, agent) comes from the queue lock, not from this type.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &Event) -> Result<(), EventLogError> {
        let mut line = serde_json::to_vec(event).map_err(|source| EventLogError::Encode {
            path: self.path.display().to_string(),
            source,
        })?;
        line.push(b'\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(&self.path, e))?;
        file.write_all(&line)
            .map_err(|e| self.io_error(&self.path, e))
    }

    pub fn read_lines(&self) -> Result<Vec<EventLine>, EventLogError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error(&self.path, err)),
        };
        Ok(raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| match serde_json::from_str::<Event>(line) {
                Ok(event) => EventLine::Event(Box::new(event)),
                Err(_) => EventLine::Malformed { line_no: idx + 1 },
            })
            .collect())
    }

    pub fn events_for_task(&self, task_id: &str) -> Result<Vec<Event>, EventLogError> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|line| match line {
                EventLine::Event(event) if event.task_id == task_id => Some(*event),
                _ => None,
            })
            .collect())
    }

    /// `(agent, wall_ts)` for every line of `task_id`, in file order. Lines that are not
    /// JSON objects, or lack an agent or a numeric `wall_ts`, are skipped.
    pub fn stamps_for_task(&self, task_id: &str) -> Result<Vec<EventStamp>, EventLogError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error(&self.path, err)),
        };
        Ok(raw
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let value: serde_json::Value = serde_json::from_str(line).ok()?;
                if value.get("task_id")?.as_str()? != task_id {
                    return None;
                }
                Some(EventStamp {
                    line_no: idx + 1,
                    agent: value.get("agent")?.as_str()?.to_string(),
                    wall_ts: value.get("wall_ts")?.as_f64()?,
                })
            })
            .collect())
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> EventLogError {
        EventLogError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appended_events_read_back_in_order_and_filter_by_task() {
        let dir = tempdir().expect("tempdir");
        let log = EventLog::new(dir.path().join("logs/events.ndjson"));
        log.append(&Event::new(EventKind::Completed, "t1", "materials"))
            .expect("append t1");
        log.append(&Event::new(EventKind::Completed, "t2", "materials"))
            .expect("append t2");
        log.append(
            &Event::new(EventKind::SkippedDuplicate, "t1", "materials")
                .with_message("duplicate detected via processed index"),
        )
        .expect("append dup");

        let events = log.events_for_task("t1").expect("read");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Completed);
        assert_eq!(events[1].event, "skipped_duplicate");
        assert_eq!(events[1].level, "warn");
        assert_eq!(events[1].schema_version, EVENT_SCHEMA_VERSION);
    }

    #[test]
    fn malformed_lines_are_surfaced_not_dropped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("events.ndjson");
        fs::write(&path, "{not json}\n").expect("write");
        let lines = EventLog::new(&path).read_lines().expect("read");
        assert_eq!(lines, vec![EventLine::Malformed { line_no: 1 }]);
    }

    #[test]
    fn stamps_accept_minimal_records_and_skip_garbage() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("events.ndjson");
        fs::write(
            &path,
            concat!(
                "{\"task_id\":\"t1\",\"agent\":\"stackup\",\"wall_ts\":20.0}\n",
                "garbage\n",
                "{\"task_id\":\"t2\",\"agent\":\"stackup\",\"wall_ts\":1.0}\n",
                "{\"task_id\":\"t1\",\"agent\":\"stackup\",\"wall_ts\":10}\n",
            ),
        )
        .expect("write");

        let stamps = EventLog::new(&path).stamps_for_task("t1").expect("stamps");
        assert_eq!(stamps.len(), 2);
        assert_eq!(stamps[0].line_no, 1);
        assert_eq!(stamps[1].line_no, 4);
        assert_eq!(stamps[1].wall_ts, 10.0);
    }
}
