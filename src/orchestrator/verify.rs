//! The verification gate: inspects one task's on-disk record and classifies every
//! problem as an integrity, completeness or ordering finding.

use super::report::envelope_files;
use super::{parse_task_id, OrchestratorError};
use crate::blobs::{BlobCheck, BlobError, BlobRef, BlobStore};
use crate::envelope::{is_trace_id_shaped, ENVELOPE_KEYS};
use crate::events::EventLog;
use crate::index::{read_ledger, LedgerLine};
use crate::runtime::{append_runtime_log, StatePaths};
use crate::shared::digest::canonical_sha256;
use crate::shared::fs_atomic::{atomic_write_file, is_temp_sentinel};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
pub const EXIT_INTEGRITY: i32 = 2;
pub const EXIT_COMPLETENESS: i32 = 3;
pub const EXIT_ORDERING: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FindingCategory {
    Integrity,
    Completeness,
    Ordering,
}

impl FindingCategory {
    pub const ALL: [FindingCategory; 3] = [Self::Integrity, Self::Completeness, Self::Ordering];

    pub fn label(self) -> &'static str {
        match self {
            Self::Integrity => "integrity",
            Self::Completeness => "completeness",
            Self::Ordering => "ordering",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::Integrity => EXIT_INTEGRITY,
            Self::Completeness => EXIT_COMPLETENESS,
            Self::Ordering => EXIT_ORDERING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub category: FindingCategory,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub task_id: String,
    pub envelopes_checked: usize,
    pub findings: Vec<Finding>,
    /// Set by `run_verification` when a findings file was written.
    pub findings_path: Option<PathBuf>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn has(&self, category: FindingCategory) -> bool {
        self.findings.iter().any(|f| f.category == category)
    }

    pub fn messages(&self, category: FindingCategory) -> impl Iterator<Item = &str> {
        self.findings
            .iter()
            .filter(move |f| f.category == category)
            .map(|f| f.message.as_str())
    }

    /// Integrity outranks completeness, which outranks ordering.
    pub fn exit_code(&self) -> i32 {
        FindingCategory::ALL
            .into_iter()
            .find(|category| self.has(*category))
            .map_or(EXIT_OK, FindingCategory::exit_code)
    }

    pub fn render_markdown(&self) -> String {
        let mut out = format!(
            "# Verification failed: {}\n\nexit code: {}\n",
            self.task_id,
            self.exit_code()
        );
        for category in FindingCategory::ALL {
            let messages: Vec<&str> = self.messages(category).collect();
            if messages.is_empty() {
                continue;
            }
            out.push_str(&format!("\n## {}\n", category.label()));
            for message in messages {
                out.push_str(&format!("- [{}] {message}\n", category.label()));
            }
        }
        out
    }

    fn push(&mut self, category: FindingCategory, message: impl Into<String>) {
        self.findings.push(Finding {
            category,
            message: message.into(),
        });
    }
}

/// Runs every check and, on failure, writes the findings file. A passing run removes a
/// findings file left by an earlier failure.
pub fn run_verification(
    paths: &StatePaths,
    task_id: &str,
) -> Result<VerifyReport, OrchestratorError> {
    let mut report = verify_task(paths, task_id)?;
    let findings_path = paths.findings_path(&report.task_id);

    if report.is_ok() {
        match fs::remove_file(&findings_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(OrchestratorError::io(&findings_path, err)),
        }
        append_runtime_log(
            paths,
            "info",
            "orchestrator.verify_ok",
            &format!("{}: {} envelopes", report.task_id, report.envelopes_checked),
        );
        return Ok(report);
    }

    let dir = paths.orchestrator_artifacts_dir();
    fs::create_dir_all(&dir).map_err(|e| OrchestratorError::io(&dir, e))?;
    atomic_write_file(&findings_path, report.render_markdown().as_bytes())
        .map_err(|e| OrchestratorError::io(&findings_path, e))?;
    append_runtime_log(
        paths,
        "error",
        "orchestrator.verify_failed",
        &format!(
            "{}: code={} findings={} see {}",
            report.task_id,
            report.exit_code(),
            report.findings.len(),
            findings_path.display()
        ),
    );
    report.findings_path = Some(findings_path);
    Ok(report)
}

/// Read-only inspection of the task's outputs, processed index, the shared artifact
/// tree and the event log.
pub fn verify_task(paths: &StatePaths, task_id: &str) -> Result<VerifyReport, OrchestratorError> {
    let task_id = parse_task_id(task_id)?;
    let mut report = VerifyReport {
        task_id: task_id.to_string(),
        envelopes_checked: 0,
        findings: Vec::new(),
        findings_path: None,
    };
    let task_dir = paths.task_dir(task_id.as_str());
    let out_dir = paths.task_out_dir(task_id.as_str());

    let mut sentinels = Vec::new();
    for root in [
        out_dir.clone(),
        task_dir.join("_index"),
        paths.artifacts_dir(),
    ] {
        collect_sentinels(&root, &mut sentinels)?;
    }
    for sentinel in sentinels {
        report.push(
            FindingCategory::Integrity,
            format!("temp sentinel present: {}", sentinel.display()),
        );
    }

    if out_dir.is_dir() {
        check_envelopes(paths, &out_dir, &mut report)?;
    } else {
        report.push(
            FindingCategory::Completeness,
            format!("missing out dir {}", out_dir.display()),
        );
    }
    check_processed_index(&task_dir, &mut report)?;
    check_event_ordering(paths, task_id.as_str(), &mut report)?;
    Ok(report)
}

fn check_envelopes(
    paths: &StatePaths,
    out_dir: &Path,
    report: &mut VerifyReport,
) -> Result<(), OrchestratorError> {
    let blobs = BlobStore::new(paths.blobs_dir());
    let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for path in envelope_files(out_dir)? {
        report.envelopes_checked += 1;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let raw = fs::read(&path).map_err(|e| OrchestratorError::io(&path, e))?;
        let envelope = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                report.push(
                    FindingCategory::Integrity,
                    format!("envelope {file_name} is not a JSON object"),
                );
                continue;
            }
            Err(err) => {
                report.push(
                    FindingCategory::Integrity,
                    format!("envelope {file_name} is not valid JSON: {err}"),
                );
                continue;
            }
        };

        let extra: Vec<&str> = envelope
            .keys()
            .map(String::as_str)
            .filter(|key| !ENVELOPE_KEYS.contains(key))
            .collect();
        if !extra.is_empty() {
            report.push(
                FindingCategory::Integrity,
                format!("envelope {file_name} has extra keys: {}", extra.join(", ")),
            );
        }
        let missing: Vec<&str> = ENVELOPE_KEYS
            .into_iter()
            .filter(|key| !envelope.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            report.push(
                FindingCategory::Integrity,
                format!("envelope {file_name} lacks keys: {}", missing.join(", ")),
            );
        }

        let recorded = envelope.get("data_sha256").and_then(Value::as_str);
        let computed = canonical_sha256(envelope.get("result").unwrap_or(&Value::Null));
        if recorded != Some(computed.as_str()) {
            report.push(
                FindingCategory::Integrity,
                format!(
                    "sha mismatch for {file_name}: recorded {}, computed {computed}",
                    recorded.unwrap_or("<none>")
                ),
            );
        }

        check_blob_refs(&blobs, &file_name, envelope.get("blob_refs"), report)?;

        let provenance = envelope.get("provenance");
        let field = |name: &str| provenance.and_then(|p| p.get(name));
        match field("monotonic_ms").and_then(Value::as_f64) {
            Some(ms) if ms >= 0.0 => {}
            Some(ms) => report.push(
                FindingCategory::Integrity,
                format!("negative monotonic_ms {ms} in {file_name}"),
            ),
            None => report.push(
                FindingCategory::Integrity,
                format!("missing monotonic_ms in {file_name}"),
            ),
        }
        match (
            field("started_at").and_then(Value::as_f64),
            field("finished_at").and_then(Value::as_f64),
        ) {
            (Some(started), Some(finished)) if finished >= started => {}
            (Some(started), Some(finished)) => report.push(
                FindingCategory::Integrity,
                format!("finished_at {finished} precedes started_at {started} in {file_name}"),
            ),
            _ => report.push(
                FindingCategory::Integrity,
                format!("missing started_at/finished_at in {file_name}"),
            ),
        }

        let ids = envelope.get("trace").and_then(|t| t.get("ids"));
        let id = |name: &str| {
            ids.and_then(|ids| ids.get(name))
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
        };
        match (id("trace_id"), id("span_id")) {
            (Some(trace_id), Some(span_id)) => {
                if !is_trace_id_shaped(trace_id) || !is_trace_id_shaped(span_id) {
                    report.push(
                        FindingCategory::Integrity,
                        format!("malformed trace ids in {file_name}"),
                    );
                }
            }
            _ => report.push(
                FindingCategory::Integrity,
                format!("missing trace ids in {file_name}"),
            ),
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match field("agent").and_then(Value::as_str) {
            Some(agent) => {
                if agent != stem {
                    report.push(
                        FindingCategory::Completeness,
                        format!("output {file_name} is named for `{stem}` but written by `{agent}`"),
                    );
                }
                owners
                    .entry(agent.to_string())
                    .or_default()
                    .push(file_name.clone());
            }
            None => report.push(
                FindingCategory::Completeness,
                format!("output {file_name} has no provenance.agent"),
            ),
        }
    }

    for (agent, files) in owners {
        if files.len() > 1 {
            report.push(
                FindingCategory::Completeness,
                format!("duplicate outputs for `{agent}`: {}", files.join(", ")),
            );
        }
    }
    Ok(())
}

fn check_blob_refs(
    blobs: &BlobStore,
    file_name: &str,
    refs: Option<&Value>,
    report: &mut VerifyReport,
) -> Result<(), OrchestratorError> {
    let Some(refs) = refs.and_then(Value::as_array) else {
        return Ok(());
    };
    for raw in refs {
        let Ok(blob_ref) = serde_json::from_value::<BlobRef>(raw.clone()) else {
            report.push(
                FindingCategory::Integrity,
                format!("malformed blob ref in {file_name}: {raw}"),
            );
            continue;
        };
        let label = format!("{}.{}", blob_ref.sha256, blob_ref.ext);
        match blobs.verify(&blob_ref) {
            Ok(BlobCheck::Intact) => {}
            Ok(BlobCheck::Missing) => report.push(
                FindingCategory::Integrity,
                format!("missing blob {label} referenced by {file_name}"),
            ),
            Ok(BlobCheck::Corrupt { actual_sha256 }) => report.push(
                FindingCategory::Integrity,
                format!("blob content mismatch for {label}: on-disk digest {actual_sha256}"),
            ),
            Err(BlobError::InvalidDigest(_) | BlobError::InvalidExtension(_)) => report.push(
                FindingCategory::Integrity,
                format!("malformed blob ref {label} in {file_name}"),
            ),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn check_processed_index(task_dir: &Path, report: &mut VerifyReport) -> Result<(), OrchestratorError> {
    let mut seen = BTreeSet::new();
    for line in read_ledger(task_dir)? {
        match line {
            LedgerLine::Record(record) => {
                if !seen.insert(record.agent.clone()) {
                    report.push(
                        FindingCategory::Completeness,
                        format!("duplicate processed.ndjson entries for `{}`", record.agent),
                    );
                }
            }
            LedgerLine::Malformed { line_no, .. } => report.push(
                FindingCategory::Completeness,
                format!("malformed processed.ndjson entry at line {line_no}"),
            ),
        }
    }
    Ok(())
}

fn check_event_ordering(
    paths: &StatePaths,
    task_id: &str,
    report: &mut VerifyReport,
) -> Result<(), OrchestratorError> {
    let mut last_seen: BTreeMap<String, f64> = BTreeMap::new();
    for stamp in EventLog::new(paths.events_log_path()).stamps_for_task(task_id)? {
        if let Some(previous) = last_seen.get(&stamp.agent) {
            if stamp.wall_ts < *previous {
                report.push(
                    FindingCategory::Ordering,
                    format!(
                        "non-monotonic event wall_ts for `{}` at line {}: {} after {}",
                        stamp.agent, stamp.line_no, stamp.wall_ts, previous
                    ),
                );
            }
        }
        last_seen.insert(stamp.agent, stamp.wall_ts);
    }
    Ok(())
}

/// Records names carrying a temp marker under `dir`, recursively. A sentinel directory is
/// reported once and not descended into.
fn collect_sentinels(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), OrchestratorError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(OrchestratorError::io(dir, err)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| OrchestratorError::io(dir, e))?;
        let path = entry.path();
        if is_temp_sentinel(&entry.file_name().to_string_lossy()) {
            found.push(path);
        } else if path.is_dir() {
            collect_sentinels(&path, found)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(categories: &[FindingCategory]) -> VerifyReport {
        let mut report = VerifyReport {
            task_id: "t1".to_string(),
            envelopes_checked: 0,
            findings: Vec::new(),
            findings_path: None,
        };
        for category in categories {
            report.push(*category, format!("{} problem", category.label()));
        }
        report
    }

    #[test]
    fn exit_code_prefers_integrity_then_completeness_then_ordering() {
        use FindingCategory::*;
        assert_eq!(report_with(&[]).exit_code(), EXIT_OK);
        assert_eq!(report_with(&[Ordering]).exit_code(), EXIT_ORDERING);
        assert_eq!(
            report_with(&[Ordering, Completeness]).exit_code(),
            EXIT_COMPLETENESS
        );
        assert_eq!(
            report_with(&[Ordering, Completeness, Integrity]).exit_code(),
            EXIT_INTEGRITY
        );
    }

    #[test]
    fn findings_markdown_groups_by_category() {
        use FindingCategory::*;
        let markdown = report_with(&[Ordering, Integrity]).render_markdown();
        assert!(markdown.starts_with("# Verification failed: t1"));
        assert!(markdown.contains("exit code: 2"));
        assert!(markdown.contains("- [integrity] integrity problem"));
        assert!(markdown.contains("- [ordering] ordering problem"));
        assert!(!markdown.contains("## completeness"));
        assert!(markdown.find("## integrity") < markdown.find("## ordering"));
    }
}
