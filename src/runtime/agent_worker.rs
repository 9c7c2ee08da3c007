use super::{
    append_runtime_log, append_task_log, sleep_with_stop, PollDelays, RuntimeError, StatePaths,
};
use crate::agents::{AgentLogic, AgentOutput};
use crate::blobs::{BlobRef, BlobStore};
use crate::config::{ResolvedAgent, Settings};
use crate::contracts::{validate_bytes, TaskRequest};
use crate::envelope::{
    span_id_for_result, trace_id_for_input, validate_and_wrap, write_envelope, EnvelopeError, WrapRequest,
};
use crate::events::{Event, EventKind, EventLog};
use crate::index::{append_processed, find_processed};
use crate::queue::{task_id_from_item_name, ClaimOutcome, ClaimedItem, DirQueue, QueuePaths};
use crate::shared::digest::sha256_hex;
use crate::shared::ids::TaskId;
use crate::shared::logging::append_task_status_line;
use crate::shared::time::now_wall_secs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Completed {
        task_id: String,
        envelope_path: PathBuf,
    },
    SkippedDuplicate {
        task_id: String,
    },
    /// The item was rejected and parked under `failed/`.
    Failed {
        task_id: String,
        reason: String,
        parked_at: PathBuf,
    },
    Locked,
    Gone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub contended: usize,
    pub errors: usize,
}

impl DrainSummary {
    pub fn handled(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Completed { .. } => self.completed += 1,
            ItemOutcome::SkippedDuplicate { .. } => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
            ItemOutcome::Locked | ItemOutcome::Gone => self.contended += 1,
        }
    }
}

enum Handled {
    Done(ItemOutcome),
    Rejected { task_id: String, reason: String },
}

/// Drives one agent: poll the inbox, claim, compute, validate, write, record.
pub struct AgentWorker<A: AgentLogic> {
    logic: A,
    paths: StatePaths,
    queue: DirQueue,
    blobs: BlobStore,
    events: EventLog,
    resolved: ResolvedAgent,
    queue_version: String,
    delays: PollDelays,
}

impl<A: AgentLogic> AgentWorker<A> {
    pub fn new(logic: A, paths: StatePaths, settings: &Settings) -> Result<Self, RuntimeError> {
        let resolved = settings.resolve_agent(logic.name());
        Self::with_resolved(logic, paths, settings, resolved)
    }

    pub fn with_resolved(
        logic: A,
        paths: StatePaths,
        settings: &Settings,
        resolved: ResolvedAgent,
    ) -> Result<Self, RuntimeError> {
        let queue = DirQueue::open(QueuePaths::for_agent(&paths, logic.name()))?;
        Ok(Self {
            blobs: BlobStore::new(paths.blobs_dir()),
            events: EventLog::new(paths.events_log_path()),
            queue_version: settings.queue_version.clone(),
            delays: PollDelays::from_settings(settings),
            logic,
            paths,
            queue,
            resolved,
        })
    }

    pub fn queue(&self) -> &DirQueue {
        &self.queue
    }

    /// One pass over the inbox snapshot. Per-item errors are logged and counted; the
    /// pass continues with the next item.
    pub fn drain_once(&self) -> Result<DrainSummary, RuntimeError> {
        let mut summary = DrainSummary::default();
        for item in self.queue.poll()? {
            match self.process_item(&item) {
                Ok(outcome) => summary.record(&outcome),
                Err(err) => {
                    summary.errors += 1;
                    append_runtime_log(
                        &self.paths,
                        "error",
                        "worker.item_error",
                        &format!("{} {}: {err}", self.logic.name(), item.display()),
                    );
                }
            }
        }
        Ok(summary)
    }

    pub fn run_loop(&self, stop: &AtomicBool) -> Result<(), RuntimeError> {
        append_runtime_log(&self.paths, "info", "worker.started", self.logic.name());
        while !stop.load(Ordering::Relaxed) {
            let delay = match self.drain_once() {
                Ok(summary) => self.delays.after_pass(summary.handled()),
                Err(err) => {
                    append_runtime_log(
                        &self.paths,
                        "error",
                        "worker.poll_error",
                        &format!("{}: {err}", self.logic.name()),
                    );
                    self.delays.idle
                }
            };
            if !sleep_with_stop(stop, delay) {
                break;
            }
        }
        append_runtime_log(&self.paths, "info", "worker.stopped", self.logic.name());
        Ok(())
    }

    /// Claims and handles one inbox item. The lock is released on every path, and an
    /// item whose handling hit an I/O error is parked so it is not retried blindly.
    pub fn process_item(&self, inbox_item: &Path) -> Result<ItemOutcome, RuntimeError> {
        let claimed = match self.queue.claim(inbox_item)? {
            ClaimOutcome::Claimed(claimed) => claimed,
            ClaimOutcome::Locked => return Ok(ItemOutcome::Locked),
            ClaimOutcome::Gone => return Ok(ItemOutcome::Gone),
        };
        append_runtime_log(
            &self.paths,
            "info",
            "worker.claimed",
            &format!("{} {}", self.logic.name(), claimed.item_name),
        );

        match self.handle_claimed(&claimed) {
            Ok(Handled::Done(outcome)) => {
                self.queue.complete(claimed)?;
                Ok(outcome)
            }
            Ok(Handled::Rejected { task_id, reason }) => {
                let parked_at = self.queue.fail(claimed)?;
                self.record_failure(&task_id, &reason)?;
                Ok(ItemOutcome::Failed {
                    task_id,
                    reason,
                    parked_at,
                })
            }
            Err(err) => {
                let task_id = fallback_task_id(&claimed);
                let reason = err.to_string();
                if let Err(park_err) = self.queue.fail(claimed) {
                    append_task_log(
                        &self.paths,
                        "error",
                        "worker.park_error",
                        self.logic.name(),
                        &task_id,
                        &park_err.to_string(),
                    );
                }
                if let Err(record_err) = self.record_failure(&task_id, &reason) {
                    append_task_log(
                        &self.paths,
                        "error",
                        "worker.record_error",
                        self.logic.name(),
                        &task_id,
                        &record_err.to_string(),
                    );
                }
                Err(err)
            }
        }
    }

    fn handle_claimed(&self, claimed: &ClaimedItem) -> Result<Handled, RuntimeError> {
        let agent = self.logic.name();
        let input_bytes = claimed.read_bytes()?;
        let request = match validate_bytes::<A::Request>(&input_bytes) {
            Ok(request) => request,
            Err(violation) => {
                return Ok(Handled::Rejected {
                    task_id: fallback_task_id(claimed),
                    reason: violation.to_string(),
                })
            }
        };
        let task_id = match TaskId::parse(request.task_id()) {
            Ok(task_id) => task_id,
            Err(reason) => {
                return Ok(Handled::Rejected {
                    task_id: fallback_task_id(claimed),
                    reason,
                })
            }
        };
        let task_dir = self.paths.task_dir(task_id.as_str());
        let trace_id = trace_id_for_input(&sha256_hex(&input_bytes));
        let mut claimed_event = Event::new(EventKind::Claimed, task_id.as_str(), agent)
            .with_message(claimed.item_name.clone());
        claimed_event.trace_id = trace_id;
        claimed_event.input_bytes = Some(input_bytes.len() as u64);
        self.events.append(&claimed_event)?;

        if let Some(record) = find_processed(&task_dir, agent)? {
            let event = Event::new(EventKind::SkippedDuplicate, task_id.as_str(), agent)
                .with_ids(&record.trace_id, &span_id_for_result(&record.out_sha256))
                .with_digest(&record.out_sha256)
                .with_message(format!("redelivery of {}", claimed.item_name));
            self.events.append(&event)?;
            self.status_line(&task_dir, "skipped_duplicate");
            return Ok(Handled::Done(ItemOutcome::SkippedDuplicate {
                task_id: task_id.to_string(),
            }));
        }

        let started_at = now_wall_secs();
        let started = Instant::now();
        let AgentOutput { result, blobs } = match self.logic.compute(&request) {
            Ok(output) => output,
            Err(err) => {
                return Ok(Handled::Rejected {
                    task_id: task_id.to_string(),
                    reason: err.to_string(),
                })
            }
        };

        let blob_refs: Vec<BlobRef> = blobs
            .iter()
            .map(|blob| BlobRef {
                sha256: sha256_hex(&blob.bytes),
                ext: blob.ext.clone(),
            })
            .collect();
        let wrapped = validate_and_wrap::<A::Response>(WrapRequest {
            raw: &result,
            identity: &self.resolved.identity,
            started_at,
            started,
            input_bytes: &input_bytes,
            schema_version: &self.resolved.schema_version,
            blob_refs,
            queue_version: Some(&self.queue_version),
        });
        let envelope = match wrapped {
            Ok(envelope) => envelope,
            Err(EnvelopeError::Validation(violation)) => {
                return Ok(Handled::Rejected {
                    task_id: task_id.to_string(),
                    reason: violation.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        for blob in &blobs {
            self.blobs.store(&blob.bytes, &blob.ext)?;
        }
        let envelope_path = self.paths.envelope_path(task_id.as_str(), agent);
        let written = write_envelope(&envelope_path, &envelope)?;
        append_processed(
            &task_dir,
            agent,
            &envelope.data_sha256,
            envelope.trace_id(),
        )?;

        let mut event = Event::new(EventKind::Completed, task_id.as_str(), agent)
            .with_ids(envelope.trace_id(), envelope.span_id())
            .with_digest(&envelope.data_sha256);
        event.blob_refs = envelope.blob_refs.clone();
        event.monotonic_ms = envelope.provenance.monotonic_ms;
        event.duration_ms = Some(envelope.provenance.monotonic_ms);
        event.input_bytes = Some(input_bytes.len() as u64);
        event.output_bytes = Some(written as u64);
        event.result_size_bytes = serde_json::to_vec(&envelope.result)
            .ok()
            .map(|bytes| bytes.len() as u64);
        self.events.append(&event)?;
        self.status_line(&task_dir, "completed");
        append_task_log(
            &self.paths,
            "info",
            "worker.completed",
            agent,
            task_id.as_str(),
            &envelope.data_sha256,
        );

        Ok(Handled::Done(ItemOutcome::Completed {
            task_id: task_id.to_string(),
            envelope_path,
        }))
    }

    fn record_failure(&self, task_id: &str, reason: &str) -> Result<(), RuntimeError> {
        let agent = self.logic.name();
        let event = Event::new(EventKind::Failed, task_id, agent).with_message(reason);
        self.events.append(&event)?;
        if TaskId::parse(task_id).is_ok() {
            self.status_line(&self.paths.task_dir(task_id), "failed");
        }
        append_task_log(&self.paths, "error", "worker.failed", agent, task_id, reason);
        Ok(())
    }

    fn status_line(&self, task_dir: &Path, transition: &str) {
        if let Err(err) = append_task_status_line(task_dir, "worker", transition, self.logic.name())
        {
            append_runtime_log(
                &self.paths,
                "warn",
                "worker.status_log",
                &format!("{}: {err}", task_dir.display()),
            );
        }
    }
}

fn fallback_task_id(claimed: &ClaimedItem) -> String {
    task_id_from_item_name(&claimed.item_name)
        .unwrap_or("unknown")
        .to_string()
}
