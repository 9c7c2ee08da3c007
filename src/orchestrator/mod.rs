pub mod bootstrap;
pub mod enqueue;
pub mod error;
pub mod report;
pub mod verify;

pub use bootstrap::{bootstrap, demo_requests, export_schemas, BootstrapSummary};
pub use enqueue::{enqueue_payload, enqueue_request, validate_request_for_agent, Enqueued};
pub use error::OrchestratorError;
pub use report::synthesize_report;
pub use verify::{
    run_verification, verify_task, Finding, FindingCategory, VerifyReport, EXIT_COMPLETENESS,
    EXIT_INTEGRITY, EXIT_OK, EXIT_ORDERING,
};

use crate::shared::ids::TaskId;

pub(crate) fn parse_task_id(raw: &str) -> Result<TaskId, OrchestratorError> {
    TaskId::parse(raw).map_err(|reason| OrchestratorError::InvalidTaskId {
        task_id: raw.to_string(),
        reason,
    })
}
