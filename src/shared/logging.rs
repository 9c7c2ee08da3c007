use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn task_status_log_path(task_dir: &Path) -> PathBuf {
    task_dir.join("status.log")
}

/// Plain-text, human-oriented companion to the event log: one line per transition.
pub fn append_task_status_line(
    task_dir: &Path,
    actor: &str,
    transition: &str,
    agent: &str,
) -> std::io::Result<()> {
    fs::create_dir_all(task_dir)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(task_status_log_path(task_dir))?;
    writeln!(
        file,
        "{:.3} {actor} {transition} {agent}",
        super::time::now_wall_secs()
    )
}
