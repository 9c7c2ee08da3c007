use super::lock::read_lock_metadata;
use super::{QueueError, QueuePaths, LOCK_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Items moved from `wip/` back to `inbox/`.
    pub requeued: Vec<PathBuf>,
    /// Locks removed because their owner is gone.
    pub released_locks: Vec<PathBuf>,
    /// Locks left alone: live owner, foreign host, or unreadable metadata.
    pub skipped_locks: Vec<PathBuf>,
}

/// Operator-invoked recovery of claims abandoned by a crashed holder. A lock is only
/// considered stale when it names this host and a pid that is no longer running; there
/// is no time-based expiry.
pub fn recover_abandoned_claims(
    paths: &QueuePaths,
    this_host: &str,
    is_alive: impl Fn(u32) -> bool,
) -> Result<RecoveryReport, QueueError> {
    let mut report = RecoveryReport::default();

    for lock_path in sorted_lock_paths(&paths.inbox)? {
        let stale = match read_lock_metadata(&lock_path) {
            Ok(Some(meta)) => meta.host == this_host && !is_alive(meta.pid),
            Ok(None) => continue,
            Err(QueueError::Parse { .. }) => false,
            Err(err) => return Err(err),
        };
        if !stale {
            report.skipped_locks.push(lock_path);
            continue;
        }

        if let Some(item_name) = item_name_for_lock(&lock_path) {
            let wip_path = paths.wip.join(&item_name);
            let inbox_path = paths.inbox.join(&item_name);
            if wip_path.exists() && !inbox_path.exists() {
                fs::rename(&wip_path, &inbox_path).map_err(|e| QueueError::io(&wip_path, e))?;
                report.requeued.push(inbox_path);
            }
        }
        fs::remove_file(&lock_path).map_err(|e| QueueError::io(&lock_path, e))?;
        report.released_locks.push(lock_path);
    }

    Ok(report)
}

pub fn lock_count(paths: &QueuePaths) -> Result<usize, QueueError> {
    Ok(sorted_lock_paths(&paths.inbox)?.len())
}

fn item_name_for_lock(lock_path: &Path) -> Option<String> {
    lock_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(LOCK_SUFFIX))
        .map(str::to_string)
}

fn sorted_lock_paths(inbox: &Path) -> Result<Vec<PathBuf>, QueueError> {
    let mut locks = Vec::new();
    for entry in fs::read_dir(inbox).map_err(|e| QueueError::io(inbox, e))? {
        let entry = entry.map_err(|e| QueueError::io(inbox, e))?;
        let path = entry.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(LOCK_SUFFIX))
        {
            locks.push(path);
        }
    }
    locks.sort();
    Ok(locks)
}

pub fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        // Without a liveness probe every owner is treated as alive.
        true
    }
}
