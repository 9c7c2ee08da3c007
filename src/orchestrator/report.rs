use super::{parse_task_id, OrchestratorError};
use crate::runtime::{append_runtime_log, StatePaths};
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::time::now_rfc3339;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Renders `artifacts/orchestrator/<task_id>.md` from the envelopes under the task's
/// out dir. Envelopes are only read; an unreadable one gets a note instead of a section.
pub fn synthesize_report(paths: &StatePaths, task_id: &str) -> Result<PathBuf, OrchestratorError> {
    let task_id = parse_task_id(task_id)?;
    let out_dir = paths.task_out_dir(task_id.as_str());

    let mut sections = Vec::new();
    for path in envelope_files(&out_dir)? {
        let agent = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let section = match fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_slice::<Value>(&raw).map_err(|e| e.to_string()))
        {
            Ok(envelope) => render_section(&agent, &envelope),
            Err(err) => format!("## {agent}\n_unreadable envelope: {err}_"),
        };
        sections.push(section);
    }

    let body = if sections.is_empty() {
        "_no agent outputs found_".to_string()
    } else {
        sections.join("\n\n")
    };
    let report = format!(
        "# Task Report: {task_id}\nGenerated: {}\n\n{body}\n",
        now_rfc3339()
    );

    let dir = paths.orchestrator_artifacts_dir();
    fs::create_dir_all(&dir).map_err(|e| OrchestratorError::io(&dir, e))?;
    let report_path = paths.report_path(task_id.as_str());
    atomic_write_file(&report_path, report.as_bytes())
        .map_err(|e| OrchestratorError::io(&report_path, e))?;
    append_runtime_log(
        paths,
        "info",
        "orchestrator.report",
        &format!("{task_id}: {} sections", sections.len()),
    );
    Ok(report_path)
}

fn render_section(agent: &str, envelope: &Value) -> String {
    let confidence = envelope
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let assumptions: Vec<&str> = envelope
        .get("assumptions")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let assumptions = if assumptions.is_empty() {
        "none".to_string()
    } else {
        assumptions.join("; ")
    };
    let digest = envelope
        .get("data_sha256")
        .and_then(Value::as_str)
        .unwrap_or("-");
    let result = envelope.get("result").cloned().unwrap_or(Value::Null);
    let result = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());

    format!(
        "## {agent}\n- confidence: **{confidence:.2}**\n- assumptions: {assumptions}\n- data_sha256: `{digest}`\n\n```json\n{result}\n```"
    )
}

/// Visible `*.json` files directly under `out_dir`, sorted by name.
pub(crate) fn envelope_files(out_dir: &Path) -> Result<Vec<PathBuf>, OrchestratorError> {
    let entries = match fs::read_dir(out_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(OrchestratorError::io(out_dir, err)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| OrchestratorError::io(out_dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_file() && !name.starts_with('.') && name.ends_with(".json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
