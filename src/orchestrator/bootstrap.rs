use super::{enqueue_payload, Enqueued, OrchestratorError};
use crate::agents::{materials, stackup, BUILTIN_AGENTS};
use crate::contracts::all_schemas;
use crate::contracts::materials::{MaterialPickRequest, WeightVector};
use crate::contracts::stackup::{Direction, Distribution, Feature, StackupAnalyzeRequest};
use crate::queue::{DirQueue, QueuePaths};
use crate::runtime::{append_runtime_log, bootstrap_state_root, RuntimeError, StatePaths};
use crate::shared::fs_atomic::atomic_write_file;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub schemas: Vec<PathBuf>,
    pub enqueued: Vec<Enqueued>,
}

/// Creates the directory layout, one queue per built-in agent, and the schema exports.
/// With `demo`, also enqueues one request per agent.
pub fn bootstrap(paths: &StatePaths, demo: bool) -> Result<BootstrapSummary, OrchestratorError> {
    bootstrap_state_root(paths)?;
    for agent in BUILTIN_AGENTS {
        DirQueue::open(QueuePaths::for_agent(paths, agent)).map_err(RuntimeError::from)?;
    }
    let schemas = export_schemas(paths)?;

    let mut enqueued = Vec::new();
    if demo {
        for (agent, payload) in demo_requests()? {
            enqueued.push(enqueue_payload(paths, agent, &payload)?);
        }
    }

    append_runtime_log(
        paths,
        "info",
        "orchestrator.bootstrap",
        &format!("{} schemas, {} demo tasks", schemas.len(), enqueued.len()),
    );
    Ok(BootstrapSummary { schemas, enqueued })
}

/// Writes `artifacts/schemas/<Name>.json` for every contract.
pub fn export_schemas(paths: &StatePaths) -> Result<Vec<PathBuf>, OrchestratorError> {
    let dir = paths.schemas_dir();
    std::fs::create_dir_all(&dir).map_err(|e| OrchestratorError::io(&dir, e))?;

    let mut written = Vec::new();
    for (name, schema) in all_schemas() {
        let path = dir.join(format!("{name}.json"));
        let body =
            serde_json::to_vec_pretty(&schema).map_err(|e| OrchestratorError::json(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| OrchestratorError::io(&path, e))?;
        written.push(path);
    }
    Ok(written)
}

pub fn demo_requests() -> Result<Vec<(&'static str, Value)>, OrchestratorError> {
    let materials_request = MaterialPickRequest {
        task_id: "demo-materials-1".to_string(),
        application: "Al 6061 bracket for outdoor use".to_string(),
        key_requirements: vec!["outdoor corrosion".to_string()],
        min_yield_mpa: Some(240.0),
        weights: WeightVector {
            cost: 0.3,
            strength: 0.5,
            corrosion: 0.2,
        },
    };
    let stackup_request = StackupAnalyzeRequest {
        task_id: "demo-stackup-1".to_string(),
        description: "shaft-hub clearance fit".to_string(),
        features: vec![
            Feature {
                name: "hub_bore".to_string(),
                nominal: 20.02,
                tol_plus: 0.01,
                tol_minus: 0.01,
                distribution: Distribution::Normal,
                direction: Direction::Positive,
            },
            Feature {
                name: "shaft_d".to_string(),
                nominal: 20.0,
                tol_plus: 0.01,
                tol_minus: 0.01,
                distribution: Distribution::Normal,
                direction: Direction::Negative,
            },
        ],
        sample_size: 10_000,
        lower_spec: Some(0.0),
        upper_spec: None,
    };

    let to_value = |agent: &str, value: serde_json::Result<Value>| {
        value.map_err(|source| OrchestratorError::Json {
            path: format!("demo request for {agent}"),
            source,
        })
    };
    Ok(vec![
        (
            materials::AGENT_NAME,
            to_value(
                materials::AGENT_NAME,
                serde_json::to_value(&materials_request),
            )?,
        ),
        (
            stackup::AGENT_NAME,
            to_value(stackup::AGENT_NAME, serde_json::to_value(&stackup_request))?,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bootstrap_exports_schemas_and_optionally_enqueues_demo() {
        let dir = tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());

        let plain = bootstrap(&paths, false).expect("bootstrap");
        assert_eq!(plain.schemas.len(), 4);
        assert!(plain.enqueued.is_empty());
        assert!(paths.schemas_dir().join("MaterialPickRequest.json").is_file());
        assert!(paths.agent_queue_dir("stackup").join("inbox").is_dir());

        let demo = bootstrap(&paths, true).expect("bootstrap demo");
        assert_eq!(demo.enqueued.len(), 2);
        assert!(demo.enqueued.iter().all(|item| item.created));

        let again = bootstrap(&paths, true).expect("bootstrap demo again");
        assert!(again.enqueued.iter().all(|item| !item.created));
    }

    #[test]
    fn exported_schemas_are_json_objects() {
        let dir = tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());
        for path in export_schemas(&paths).expect("export") {
            let raw = std::fs::read_to_string(&path).expect("read schema");
            let schema: Value = serde_json::from_str(&raw).expect("schema json");
            assert!(schema.is_object(), "{}", path.display());
        }
    }
}
