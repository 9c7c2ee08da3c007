use super::lock::QueueLock;
use super::{is_valid_queue_json_filename, lock_path_for, QueueError, QueuePaths};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

#[derive(Debug)]
pub struct ClaimedItem {
    pub item_name: String,
    pub wip_path: PathBuf,
    lock: QueueLock,
}

impl ClaimedItem {
    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, QueueError> {
        fs::read(&self.wip_path).map_err(|e| QueueError::io(&self.wip_path, e))
    }

    /// Gives up the claim without touching the item, as a crashed holder would: the lock
    /// file stays on disk and the open lock handle is leaked on purpose via `mem::forget`
    /// so no release runs. Only `recover_abandoned_claims` can clear it afterwards.
    ///
    /// Workers never call this; it exists for crash-recovery tests.
    #[doc(hidden)]
    pub fn abandon(self) {
        std::mem::forget(self.lock);
    }
}

#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(ClaimedItem),
    /// Another holder owns the lock; skip and re-poll later.
    Locked,
    /// The item left the inbox between poll and claim.
    Gone,
}

/// One agent's inbox/wip/failed directories. Mutual exclusion rests on exclusive lock
/// creation and same-filesystem rename; nothing here blocks or retries.
#[derive(Debug, Clone)]
pub struct DirQueue {
    paths: QueuePaths,
}

impl DirQueue {
    pub fn open(paths: QueuePaths) -> Result<Self, QueueError> {
        for dir in paths.all() {
            fs::create_dir_all(dir).map_err(|e| QueueError::io(dir, e))?;
        }
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &QueuePaths {
        &self.paths
    }

    /// Snapshot of pending items ordered by name. Each call starts a fresh pass.
    pub fn poll(&self) -> Result<impl Iterator<Item = PathBuf>, QueueError> {
        Ok(sorted_item_paths(&self.paths.inbox)?.into_iter())
    }

    pub fn claim(&self, inbox_item: &Path) -> Result<ClaimOutcome, QueueError> {
        let Some(file_name) = inbox_item.file_name() else {
            return Err(QueueError::ItemName {
                path: inbox_item.display().to_string(),
            });
        };
        let item_name = file_name.to_string_lossy().into_owned();

        let lock_path = lock_path_for(inbox_item);
        let Some(lock) = QueueLock::try_acquire(&lock_path)? else {
            return Ok(ClaimOutcome::Locked);
        };

        let wip_path = self.paths.wip.join(file_name);
        match fs::rename(inbox_item, &wip_path) {
            Ok(()) => Ok(ClaimOutcome::Claimed(ClaimedItem {
                item_name,
                wip_path,
                lock,
            })),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                lock.release()?;
                Ok(ClaimOutcome::Gone)
            }
            Err(err) => {
                let error = QueueError::io(inbox_item, err);
                lock.release()?;
                Err(error)
            }
        }
    }

    /// Removes the finished item, then releases its lock.
    pub fn complete(&self, claimed: ClaimedItem) -> Result<(), QueueError> {
        let ClaimedItem { wip_path, lock, .. } = claimed;
        let removed = match fs::remove_file(&wip_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(QueueError::io(&wip_path, err)),
        };
        let released = lock.release();
        removed.and(released)
    }

    /// Parks the item under `failed/` so it is not retried until redelivered.
    pub fn fail(&self, claimed: ClaimedItem) -> Result<PathBuf, QueueError> {
        let ClaimedItem {
            item_name,
            wip_path,
            lock,
        } = claimed;
        let target = self.paths.failed.join(unique_failed_name(&item_name));
        let moved = fs::rename(&wip_path, &target).map_err(|e| QueueError::io(&wip_path, e));
        let released = lock.release();
        moved?;
        released?;
        Ok(target)
    }

    pub fn release(&self, claimed: ClaimedItem) -> Result<(), QueueError> {
        claimed.lock.release()
    }

    pub fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(sorted_item_paths(&self.paths.inbox)?.len())
    }

    pub fn in_progress_count(&self) -> Result<usize, QueueError> {
        Ok(sorted_item_paths(&self.paths.wip)?.len())
    }

    pub fn failed_count(&self) -> Result<usize, QueueError> {
        Ok(sorted_item_paths(&self.paths.failed)?.len())
    }
}

pub(crate) fn sorted_item_paths(dir: &Path) -> Result<Vec<PathBuf>, QueueError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| QueueError::io(dir, e))? {
        let entry = entry.map_err(|e| QueueError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_valid_queue_json_filename(name) {
            entries.push(path);
        }
    }
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(entries)
}

static FAILED_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_failed_name(original_name: &str) -> String {
    let path = Path::new(original_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("item");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let counter = FAILED_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    format!("{stem}.failed-{}-{counter}.{ext}", std::process::id())
}
