use apex::agents::MaterialsAgent;
use apex::config::Settings;
use apex::events::{Event, EventKind, EventLog};
use apex::index::append_processed;
use apex::orchestrator::{
    enqueue_payload, run_verification, FindingCategory, EXIT_COMPLETENESS, EXIT_INTEGRITY,
    EXIT_OK, EXIT_ORDERING,
};
use apex::runtime::{AgentWorker, StatePaths};
use apex::shared::time::now_wall_secs;
use serde_json::{json, Value};
use std::fs;
use tempfile::{tempdir, TempDir};

fn completed_task() -> (TempDir, StatePaths) {
    let dir = tempdir().expect("tempdir");
    let paths = StatePaths::new(dir.path());
    enqueue_payload(
        &paths,
        "materials",
        &json!({
            "task_id": "t1",
            "application": "bracket",
            "weights": {"cost": 0.5, "strength": 0.5, "corrosion": 0.0}
        }),
    )
    .expect("enqueue");
    let worker =
        AgentWorker::new(MaterialsAgent, paths.clone(), &Settings::default()).expect("worker");
    assert_eq!(worker.drain_once().expect("drain").completed, 1);
    (dir, paths)
}

fn edit_envelope(paths: &StatePaths, edit: impl FnOnce(&mut Value)) {
    let path = paths.envelope_path("t1", "materials");
    let mut value: Value =
        serde_json::from_slice(&fs::read(&path).expect("read envelope")).expect("json");
    edit(&mut value);
    fs::write(&path, serde_json::to_vec_pretty(&value).expect("encode")).expect("write");
}

fn findings_text(paths: &StatePaths) -> String {
    fs::read_to_string(paths.findings_path("t1")).expect("findings file")
}

#[test]
fn untouched_task_passes_and_writes_no_findings() {
    let (_dir, paths) = completed_task();
    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_OK, "{:?}", report.findings);
    assert_eq!(report.envelopes_checked, 1);
    assert!(!paths.findings_path("t1").exists());
}

#[test]
fn corrupted_digest_is_an_integrity_failure() {
    let (_dir, paths) = completed_task();
    edit_envelope(&paths, |v| v["data_sha256"] = json!("0".repeat(64)));

    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_INTEGRITY);
    assert!(findings_text(&paths).contains("sha mismatch for materials.json"));
}

#[test]
fn tampered_result_extra_keys_and_bad_ids_are_integrity_failures() {
    let (_dir, paths) = completed_task();
    edit_envelope(&paths, |v| {
        v["result"]["confidence"] = json!(0.01);
        v["notes"] = json!("hand edited");
        v["trace"]["ids"]["span_id"] = json!("NOT-HEX");
        v["provenance"]["monotonic_ms"] = json!(-1.0);
    });

    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_INTEGRITY);
    let messages: Vec<&str> = report.messages(FindingCategory::Integrity).collect();
    assert!(messages.iter().any(|m| m.contains("sha mismatch")));
    assert!(messages.iter().any(|m| m.contains("extra keys: notes")));
    assert!(messages.iter().any(|m| m.contains("malformed trace ids")));
    assert!(messages.iter().any(|m| m.contains("negative monotonic_ms")));
}

#[test]
fn leftover_temp_file_in_artifacts_is_an_integrity_failure() {
    let (_dir, paths) = completed_task();
    let shard = paths.blobs_dir().join("ab");
    fs::create_dir_all(&shard).expect("shard");
    fs::write(shard.join(".abcd.csv.tmp-1-2-3"), b"partial").expect("sentinel");

    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_INTEGRITY);
    assert!(findings_text(&paths).contains("temp sentinel present"));
}

#[test]
fn duplicated_output_file_is_a_completeness_failure() {
    let (_dir, paths) = completed_task();
    let out_dir = paths.task_out_dir("t1");
    fs::copy(out_dir.join("materials.json"), out_dir.join("materials_copy.json"))
        .expect("duplicate output");

    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_COMPLETENESS, "{:?}", report.findings);
    assert!(findings_text(&paths).contains("duplicate outputs for `materials`"));
}

#[test]
fn duplicate_index_records_and_missing_out_dir_are_completeness_failures() {
    let (_dir, paths) = completed_task();
    append_processed(
        &paths.task_dir("t1"),
        "materials",
        &"a".repeat(64),
        "0123456789abcdef",
    )
    .expect("second record");
    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_COMPLETENESS);
    assert!(report
        .messages(FindingCategory::Completeness)
        .any(|m| m.contains("duplicate processed.ndjson entries")));

    let ghost = run_verification(&paths, "ghost").expect("verify ghost");
    assert_eq!(ghost.exit_code(), EXIT_COMPLETENESS);
    assert!(paths.findings_path("ghost").is_file());
}

#[test]
fn decreasing_event_timestamps_are_an_ordering_failure() {
    let (_dir, paths) = completed_task();
    let log = EventLog::new(paths.events_log_path());
    let base = now_wall_secs() + 100.0;
    let mut later = Event::new(EventKind::Completed, "t1", "materials");
    later.wall_ts = base;
    let mut earlier = Event::new(EventKind::Completed, "t1", "materials");
    earlier.wall_ts = base - 50.0;
    log.append(&later).expect("append later");
    log.append(&earlier).expect("append earlier");

    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_ORDERING, "{:?}", report.findings);
    assert!(findings_text(&paths).contains("non-monotonic event wall_ts for `materials`"));

    let other_task = run_verification(&paths, "t2");
    assert!(other_task
        .expect("verify t2")
        .messages(FindingCategory::Ordering)
        .next()
        .is_none());
}

#[test]
fn integrity_outranks_completeness_and_a_later_pass_clears_findings() {
    let (_dir, paths) = completed_task();
    let out_dir = paths.task_out_dir("t1");
    let original = fs::read(out_dir.join("materials.json")).expect("read");
    fs::copy(out_dir.join("materials.json"), out_dir.join("materials_copy.json"))
        .expect("duplicate output");
    edit_envelope(&paths, |v| v["data_sha256"] = json!("f".repeat(64)));

    let report = run_verification(&paths, "t1").expect("verify");
    assert_eq!(report.exit_code(), EXIT_INTEGRITY);
    assert!(report.has(FindingCategory::Completeness));
    let text = findings_text(&paths);
    assert!(text.contains("## integrity"));
    assert!(text.contains("## completeness"));

    fs::remove_file(out_dir.join("materials_copy.json")).expect("remove copy");
    fs::write(out_dir.join("materials.json"), original).expect("restore");
    assert_eq!(
        run_verification(&paths, "t1").expect("verify").exit_code(),
        EXIT_OK
    );
    assert!(!paths.findings_path("t1").exists());
}
