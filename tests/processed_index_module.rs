use apex::index::{
    already_processed, append_processed, find_processed, processed_index_path, read_ledger,
    LedgerLine,
};
use apex::shared::fs_atomic::{is_temp_sentinel, temp_sibling_name, STAGE_MARKER};
use std::fs;
use tempfile::tempdir;

#[test]
fn records_are_found_per_agent_and_survive_later_appends() {
    let dir = tempdir().expect("tempdir");
    let task_dir = dir.path().join("runs/t1");

    assert!(!already_processed(&task_dir, "materials").expect("empty ledger"));
    append_processed(&task_dir, "materials", "aa".repeat(32).as_str(), "0123456789abcdef")
        .expect("append materials");
    append_processed(&task_dir, "stackup", "bb".repeat(32).as_str(), "fedcba9876543210")
        .expect("append stackup");

    assert!(already_processed(&task_dir, "materials").expect("lookup"));
    assert!(!already_processed(&task_dir, "dfma").expect("lookup"));
    let record = find_processed(&task_dir, "stackup")
        .expect("lookup")
        .expect("record");
    assert_eq!(record.trace_id, "fedcba9876543210");

    let lines = read_ledger(&task_dir).expect("ledger");
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| matches!(l, LedgerLine::Record(_))));

    let index_dir = processed_index_path(&task_dir)
        .parent()
        .expect("index dir")
        .to_path_buf();
    let leftovers = fs::read_dir(&index_dir)
        .expect("read index dir")
        .filter_map(Result::ok)
        .filter(|e| is_temp_sentinel(&e.file_name().to_string_lossy()))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn interrupted_append_leaves_prior_records_intact() {
    let dir = tempdir().expect("tempdir");
    let task_dir = dir.path().join("runs/t1");
    append_processed(&task_dir, "materials", "aa".repeat(32).as_str(), "0123456789abcdef")
        .expect("append");
    let before = fs::read(processed_index_path(&task_dir)).expect("read ledger");

    let index_path = processed_index_path(&task_dir);
    let stage = index_path
        .parent()
        .expect("index dir")
        .join(temp_sibling_name("processed.ndjson", STAGE_MARKER));
    fs::write(&stage, b"{\"agent\":\"materials\"").expect("write half stage");

    assert_eq!(fs::read(&index_path).expect("read ledger"), before);
    assert_eq!(read_ledger(&task_dir).expect("ledger").len(), 1);
}

#[test]
fn malformed_lines_are_reported_with_line_numbers() {
    let dir = tempdir().expect("tempdir");
    let task_dir = dir.path().join("runs/t1");
    let path = processed_index_path(&task_dir);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(
        &path,
        "{\"agent\":\"materials\",\"out_sha256\":\"x\",\"trace_id\":\"y\"}\n{oops\n",
    )
    .expect("write ledger");

    let lines = read_ledger(&task_dir).expect("ledger");
    assert!(matches!(lines[1], LedgerLine::Malformed { line_no: 2, .. }));
}
