use crate::agents::{materials, stackup, AgentLogic, MaterialsAgent, StackupAgent, BUILTIN_AGENTS};
use crate::app::command_support::{expect_args, load_settings, CommandOutput};
use crate::config::Settings;
use crate::queue::{
    is_process_alive, lock_count, recover_abandoned_claims, DirQueue, QueuePaths,
};
use crate::runtime::{append_runtime_log, AgentWorker, StatePaths};
use crate::shared::host::host_name;
use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::AtomicBool;

pub fn cmd_agent(paths: &StatePaths, args: &[String]) -> Result<CommandOutput, String> {
    let args = expect_args(args, 1, "apex agent <name> [--once]")?;
    let once = match args.get(1).map(String::as_str) {
        None => false,
        Some("--once") => true,
        Some(other) => return Err(format!("unknown agent option `{other}`")),
    };
    let settings = load_settings(paths)?;

    match args[0].to_ascii_lowercase().as_str() {
        materials::AGENT_NAME => run_worker(MaterialsAgent, paths, &settings, once),
        stackup::AGENT_NAME => run_worker(StackupAgent, paths, &settings, once),
        other => Err(format!(
            "unknown agent `{other}` (available: {})",
            BUILTIN_AGENTS.join(", ")
        )),
    }
}

fn run_worker<A: AgentLogic>(
    logic: A,
    paths: &StatePaths,
    settings: &Settings,
    once: bool,
) -> Result<CommandOutput, String> {
    let name = logic.name();
    let worker = AgentWorker::new(logic, paths.clone(), settings).map_err(|e| e.to_string())?;
    if once {
        let summary = worker.drain_once().map_err(|e| e.to_string())?;
        return Ok(CommandOutput::ok(format!(
            "agent={name}\ncompleted={}\nskipped={}\nfailed={}\ncontended={}\nerrors={}",
            summary.completed, summary.skipped, summary.failed, summary.contended, summary.errors
        )));
    }

    let stop = AtomicBool::new(false);
    worker.run_loop(&stop).map_err(|e| e.to_string())?;
    Ok(CommandOutput::ok(format!("agent={name}\nstopped")))
}

/// Built-in agents plus any other queue directories present on disk.
pub fn cmd_status(paths: &StatePaths) -> Result<CommandOutput, String> {
    let mut agents: BTreeSet<String> = BUILTIN_AGENTS.iter().map(|a| a.to_string()).collect();
    if let Ok(entries) = fs::read_dir(paths.queue_root()) {
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                agents.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }

    let mut lines = vec![format!("root={}", paths.root.display())];
    for agent in agents {
        let queue_paths = QueuePaths::for_agent(paths, &agent);
        if !queue_paths.inbox.is_dir() {
            lines.push(format!("{agent}: not bootstrapped"));
            continue;
        }
        let queue = DirQueue::open(queue_paths).map_err(|e| e.to_string())?;
        lines.push(format!(
            "{agent}: pending={} in_progress={} failed={} locks={}",
            queue.pending_count().map_err(|e| e.to_string())?,
            queue.in_progress_count().map_err(|e| e.to_string())?,
            queue.failed_count().map_err(|e| e.to_string())?,
            lock_count(queue.paths()).map_err(|e| e.to_string())?,
        ));
    }
    Ok(CommandOutput::ok(lines.join("\n")))
}

pub fn cmd_recover(paths: &StatePaths, args: &[String]) -> Result<CommandOutput, String> {
    let args = expect_args(args, 1, "apex recover <agent>")?;
    let agent = args[0].to_ascii_lowercase();
    let queue_paths = QueuePaths::for_agent(paths, &agent);
    if !queue_paths.inbox.is_dir() {
        return Err(format!("no queue for agent `{agent}`"));
    }

    let report = recover_abandoned_claims(&queue_paths, &host_name(), is_process_alive)
        .map_err(|e| e.to_string())?;
    for item in &report.requeued {
        append_runtime_log(
            paths,
            "info",
            "queue.recovered",
            &format!("requeued {}", item.display()),
        );
    }

    let mut lines = vec![
        format!("agent={agent}"),
        format!("requeued={}", report.requeued.len()),
        format!("released_locks={}", report.released_locks.len()),
        format!("skipped_locks={}", report.skipped_locks.len()),
    ];
    lines.extend(
        report
            .skipped_locks
            .iter()
            .map(|lock| format!("skipped {}", lock.display())),
    );
    Ok(CommandOutput::ok(lines.join("\n")))
}
