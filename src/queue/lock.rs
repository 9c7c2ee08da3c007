use super::QueueError;
use crate::shared::host::host_name;
use crate::shared::time::now_wall_secs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const QUEUE_VERSION: &str = "v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub host: String,
    pub created_at: f64,
    pub queue_version: String,
}

impl LockMetadata {
    pub fn for_current_process() -> Self {
        Self {
            pid: std::process::id(),
            host: host_name(),
            created_at: now_wall_secs(),
            queue_version: QUEUE_VERSION.to_string(),
        }
    }
}

/// An exclusively created lock file plus its open handle. Dropping it without calling
/// [`QueueLock::release`] still removes the file; only a dead process leaves one behind.
#[derive(Debug)]
pub struct QueueLock {
    file: Option<fs::File>,
    path: PathBuf,
}

impl QueueLock {
    /// `Ok(None)` means another holder already owns the lock.
    pub(crate) fn try_acquire(lock_path: &Path) -> Result<Option<Self>, QueueError> {
        let file = match fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(lock_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(err) => return Err(QueueError::io(lock_path, err)),
        };

        let mut lock = Self {
            file: Some(file),
            path: lock_path.to_path_buf(),
        };
        let meta = serde_json::to_vec(&LockMetadata::for_current_process())
            .map_err(|e| QueueError::parse(lock_path, e))?;
        if let Some(file) = lock.file.as_mut() {
            file.write_all(&meta)
                .and_then(|_| file.sync_all())
                .map_err(|e| QueueError::io(lock_path, e))?;
        }
        Ok(Some(lock))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<(), QueueError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), QueueError> {
        drop(self.file.take());
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(QueueError::io(&self.path, err)),
        }
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        if self.file.is_some() {
            let _ = self.release_inner();
        }
    }
}

pub fn read_lock_metadata(lock_path: &Path) -> Result<Option<LockMetadata>, QueueError> {
    let raw = match fs::read(lock_path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(QueueError::io(lock_path, err)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| QueueError::parse(lock_path, e))
}
