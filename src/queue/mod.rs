pub mod lifecycle;
pub mod lock;
pub mod paths;
pub mod recovery;
pub use lifecycle::{ClaimOutcome, ClaimedItem, DirQueue};
pub use lock::{read_lock_metadata, LockMetadata, QueueLock, QUEUE_VERSION};
pub use paths::{
    is_valid_queue_json_filename, lock_path_for, queue_item_filename, task_id_from_item_name,
    QueuePaths, ITEM_EXTENSION, LOCK_SUFFIX,
};
pub use recovery::{is_process_alive, lock_count, recover_abandoned_claims, RecoveryReport};

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid queue metadata in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("queue item path has no file name: {path}")]
    ItemName { path: String },
}

impl QueueError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Barrier};
    use tempfile::tempdir;

    fn open_queue(root: &Path) -> DirQueue {
        DirQueue::open(QueuePaths::from_agent_dir(&root.join("queue/materials"))).expect("open")
    }

    #[test]
    fn poll_orders_items_by_name_and_skips_locks_and_temps() {
        let tmp = tempdir().expect("tempdir");
        let queue = open_queue(tmp.path());
        let inbox = &queue.paths().inbox;
        fs::write(inbox.join("b__2.json"), "{}").expect("write b");
        fs::write(inbox.join("a__1.json"), "{}").expect("write a");
        fs::write(inbox.join("a__1.json.lock"), "{}").expect("write lock");
        fs::write(inbox.join(".c__3.json.tmp-1-2-3"), "{}").expect("write temp");

        let names: Vec<String> = queue
            .poll()
            .expect("poll")
            .map(|p| p.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a__1.json", "b__2.json"]);
    }

    #[test]
    fn claim_moves_item_to_wip_and_complete_clears_item_and_lock() {
        let tmp = tempdir().expect("tempdir");
        let queue = open_queue(tmp.path());
        let item = queue.paths().inbox.join("t1__abc.json");
        fs::write(&item, r#"{"task_id":"t1"}"#).expect("write item");

        let ClaimOutcome::Claimed(claimed) = queue.claim(&item).expect("claim") else {
            panic!("expected claim");
        };
        let lock_path = claimed.lock_path().to_path_buf();
        assert!(lock_path.exists());
        assert!(claimed.wip_path.exists());
        assert!(!item.exists());

        let meta = read_lock_metadata(&lock_path).expect("meta").expect("present");
        assert_eq!(meta.pid, std::process::id());
        assert_eq!(meta.queue_version, QUEUE_VERSION);

        let wip = claimed.wip_path.clone();
        queue.complete(claimed).expect("complete");
        assert!(!wip.exists());
        assert!(!lock_path.exists());
    }

    #[test]
    fn concurrent_claims_on_one_item_admit_exactly_one_holder() {
        let tmp = tempdir().expect("tempdir");
        let queue = open_queue(tmp.path());
        let item = queue.paths().inbox.join("t1__abc.json");
        fs::write(&item, "{}").expect("write item");

        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));
        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let queue = queue.clone();
                let item = item.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    match queue.claim(&item).expect("claim attempt") {
                        ClaimOutcome::Claimed(claimed) => {
                            claimed.abandon();
                            1usize
                        }
                        ClaimOutcome::Locked | ClaimOutcome::Gone => 0usize,
                    }
                })
            })
            .collect();
        let winners: usize = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn existing_lock_reports_locked_without_moving_item() {
        let tmp = tempdir().expect("tempdir");
        let queue = open_queue(tmp.path());
        let item = queue.paths().inbox.join("t1__abc.json");
        fs::write(&item, "{}").expect("write item");
        fs::write(lock_path_for(&item), "{}").expect("foreign lock");

        assert!(matches!(
            queue.claim(&item).expect("claim"),
            ClaimOutcome::Locked
        ));
        assert!(item.exists());
    }

    #[test]
    fn vanished_item_releases_the_fresh_lock() {
        let tmp = tempdir().expect("tempdir");
        let queue = open_queue(tmp.path());
        let item = queue.paths().inbox.join("t1__gone.json");

        assert!(matches!(queue.claim(&item).expect("claim"), ClaimOutcome::Gone));
        assert!(!lock_path_for(&item).exists());
    }

    #[test]
    fn failed_items_are_parked_and_unlocked() {
        let tmp = tempdir().expect("tempdir");
        let queue = open_queue(tmp.path());
        let item = queue.paths().inbox.join("t1__abc.json");
        fs::write(&item, "{}").expect("write item");

        let ClaimOutcome::Claimed(claimed) = queue.claim(&item).expect("claim") else {
            panic!("expected claim");
        };
        let lock_path = claimed.lock_path().to_path_buf();
        let parked = queue.fail(claimed).expect("fail");
        assert!(parked.starts_with(&queue.paths().failed));
        assert!(parked.exists());
        assert!(!lock_path.exists());
        assert_eq!(queue.pending_count().expect("count"), 0);
    }

    #[test]
    fn item_names_round_trip_task_ids() {
        let name = queue_item_filename("demo-materials-1", "0123456789abcdef");
        assert_eq!(name, "demo-materials-1__0123456789abcdef.json");
        assert_eq!(task_id_from_item_name(&name), Some("demo-materials-1"));
        assert_eq!(task_id_from_item_name("plain.json"), Some("plain"));
        assert_eq!(task_id_from_item_name("x.lock"), None);
    }
}
