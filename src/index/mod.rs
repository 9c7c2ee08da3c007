use crate::shared::fs_atomic::atomic_append_line;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("processed index io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode processed record for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub agent: String,
    pub out_sha256: String,
    pub trace_id: String,
}

/// One parsed ledger line. Malformed lines are kept so callers can report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerLine {
    Record(ProcessedRecord),
    Malformed { line_no: usize, raw: String },
}

pub fn processed_index_path(task_dir: &Path) -> PathBuf {
    task_dir.join("_index").join("processed.ndjson")
}

pub fn read_ledger(task_dir: &Path) -> Result<Vec<LedgerLine>, IndexError> {
    let path = processed_index_path(task_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error(&path, err)),
    };

    Ok(raw
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| match serde_json::from_str(line) {
            Ok(record) => LedgerLine::Record(record),
            Err(_) => LedgerLine::Malformed {
                line_no: idx + 1,
                raw: line.to_string(),
            },
        })
        .collect())
}

pub fn find_processed(task_dir: &Path, agent: &str) -> Result<Option<ProcessedRecord>, IndexError> {
    Ok(read_ledger(task_dir)?.into_iter().find_map(|line| match line {
        LedgerLine::Record(record) if record.agent == agent => Some(record),
        _ => None,
    }))
}

pub fn already_processed(task_dir: &Path, agent: &str) -> Result<bool, IndexError> {
    Ok(find_processed(task_dir, agent)?.is_some())
}

/// Crash-safe append: the existing ledger is copied together with the new record into
/// a staging file that replaces the original by rename.
pub fn append_processed(
    task_dir: &Path,
    agent: &str,
    out_sha256: &str,
    trace_id: &str,
) -> Result<ProcessedRecord, IndexError> {
    let path = processed_index_path(task_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let record = ProcessedRecord {
        agent: agent.to_string(),
        out_sha256: out_sha256.to_string(),
        trace_id: trace_id.to_string(),
    };
    let line = serde_json::to_vec(&record).map_err(|source| IndexError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    atomic_append_line(&path, &line).map_err(|e| io_error(&path, e))?;
    Ok(record)
}

fn io_error(path: &Path, source: std::io::Error) -> IndexError {
    IndexError::Io {
        path: path.display().to_string(),
        source,
    }
}
