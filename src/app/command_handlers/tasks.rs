use crate::app::command_support::{expect_args, CommandOutput};
use crate::orchestrator::{bootstrap, enqueue_payload, run_verification, synthesize_report};
use crate::runtime::StatePaths;
use serde_json::Value;
use std::fs;

pub fn cmd_bootstrap(paths: &StatePaths, args: &[String]) -> Result<CommandOutput, String> {
    let demo = match args.first().map(String::as_str) {
        None => false,
        Some("--demo") => true,
        Some(other) => return Err(format!("unknown bootstrap option `{other}`")),
    };
    let summary = bootstrap(paths, demo).map_err(|e| e.to_string())?;

    let mut lines = vec![
        "bootstrapped".to_string(),
        format!("root={}", paths.root.display()),
        format!("schemas={}", summary.schemas.len()),
    ];
    for item in &summary.enqueued {
        lines.push(format!(
            "enqueued agent={} task={} created={}",
            item.agent, item.task_id, item.created
        ));
    }
    Ok(CommandOutput::ok(lines.join("\n")))
}

pub fn cmd_enqueue(paths: &StatePaths, args: &[String]) -> Result<CommandOutput, String> {
    let args = expect_args(args, 2, "apex enqueue <agent> <request.json>")?;
    let request_path = &args[1];
    let raw = fs::read(request_path).map_err(|e| format!("failed to read {request_path}: {e}"))?;
    let payload: Value = serde_json::from_slice(&raw)
        .map_err(|e| format!("invalid json in {request_path}: {e}"))?;

    let enqueued = enqueue_payload(paths, &args[0], &payload).map_err(|e| e.to_string())?;
    Ok(CommandOutput::ok(format!(
        "{}\nagent={}\ntask={}\npath={}",
        if enqueued.created {
            "enqueued"
        } else {
            "already pending"
        },
        enqueued.agent,
        enqueued.task_id,
        enqueued.path.display()
    )))
}

pub fn cmd_report(paths: &StatePaths, args: &[String]) -> Result<CommandOutput, String> {
    let args = expect_args(args, 1, "apex report <task_id>")?;
    let report_path = synthesize_report(paths, &args[0]).map_err(|e| e.to_string())?;
    Ok(CommandOutput::ok(format!(
        "report written\npath={}",
        report_path.display()
    )))
}

/// Exit code follows the verification outcome; the text summarises the findings.
pub fn cmd_verify(paths: &StatePaths, args: &[String]) -> Result<CommandOutput, String> {
    let args = expect_args(args, 1, "apex verify <task_id>")?;
    let report = run_verification(paths, &args[0]).map_err(|e| e.to_string())?;
    let exit_code = report.exit_code();

    let text = match &report.findings_path {
        None => format!(
            "verification ok\ntask={}\nenvelopes={}",
            report.task_id, report.envelopes_checked
        ),
        Some(findings) => {
            let mut lines = vec![
                format!("verification failed (code={exit_code})"),
                format!("task={}", report.task_id),
                format!("findings={}", findings.display()),
            ];
            lines.extend(
                report
                    .findings
                    .iter()
                    .map(|f| format!("- [{}] {}", f.category.label(), f.message)),
            );
            lines.join("\n")
        }
    };
    Ok(CommandOutput { text, exit_code })
}
