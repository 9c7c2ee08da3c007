use crate::runtime::StatePaths;
use std::path::{Path, PathBuf};

pub const ITEM_EXTENSION: &str = "json";
pub const LOCK_SUFFIX: &str = ".lock";
const TASK_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    pub inbox: PathBuf,
    pub wip: PathBuf,
    pub failed: PathBuf,
}

impl QueuePaths {
    pub fn for_agent(paths: &StatePaths, agent: &str) -> Self {
        Self::from_agent_dir(&paths.agent_queue_dir(agent))
    }

    pub fn from_agent_dir(agent_dir: &Path) -> Self {
        Self {
            inbox: agent_dir.join("inbox"),
            wip: agent_dir.join("wip"),
            failed: agent_dir.join("failed"),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.inbox, &self.wip, &self.failed]
    }
}

/// The lock sits next to the item in the inbox and outlives the item's move to `wip/`.
pub fn lock_path_for(inbox_item: &Path) -> PathBuf {
    let mut name = inbox_item
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(LOCK_SUFFIX);
    inbox_item.with_file_name(name)
}

pub fn queue_item_filename(task_id: &str, payload_hash: &str) -> String {
    format!("{task_id}{TASK_SEPARATOR}{payload_hash}.{ITEM_EXTENSION}")
}

pub fn task_id_from_item_name(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".json")?;
    let task_id = match stem.split_once(TASK_SEPARATOR) {
        Some((task_id, _)) => task_id,
        None => stem,
    };
    (!task_id.is_empty()).then_some(task_id)
}

pub fn is_valid_queue_json_filename(filename: &str) -> bool {
    if filename.starts_with('.') {
        return false;
    }
    let path = Path::new(filename);
    if path.extension().and_then(|v| v.to_str()) != Some(ITEM_EXTENSION) {
        return false;
    }

    if let Some(stem) = path.file_stem().and_then(|v| v.to_str()) {
        return !stem.trim().is_empty();
    }

    false
}
