#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Bootstrap,
    Enqueue,
    Agent,
    Report,
    Verify,
    Status,
    Recover,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "bootstrap" => CliVerb::Bootstrap,
        "enqueue" => CliVerb::Enqueue,
        "agent" => CliVerb::Agent,
        "report" => CliVerb::Report,
        "verify" => CliVerb::Verify,
        "status" => CliVerb::Status,
        "recover" => CliVerb::Recover,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: apex [--root DIR] <command>".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  bootstrap [--demo]                   Create the layout and export schemas".to_string(),
        "  enqueue <agent> <request.json>       Validate a request and place it in an inbox"
            .to_string(),
        "  agent <name> [--once]                Run a worker for a built-in agent".to_string(),
        "  report <task_id>                     Write the markdown report for a task".to_string(),
        "  verify <task_id>                     Run the verification gate (exit 0/2/3/4)"
            .to_string(),
        "  status                               Show per-agent queue counts".to_string(),
        "  recover <agent>                      Requeue claims held by dead local processes"
            .to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}

/// Splits a leading or embedded `--root DIR` from the command arguments.
pub fn split_root_flag(args: Vec<String>) -> Result<(Option<String>, Vec<String>), String> {
    let mut root = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--root" {
            let value = iter
                .next()
                .ok_or_else(|| "`--root` requires a directory".to_string())?;
            root = Some(value);
        } else if let Some(value) = arg.strip_prefix("--root=") {
            root = Some(value.to_string());
        } else {
            rest.push(arg);
        }
    }
    Ok((root, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn verbs_parse_and_unknown_is_explicit() {
        assert_eq!(parse_cli_verb("verify"), CliVerb::Verify);
        assert_eq!(parse_cli_verb("--help"), CliVerb::Help);
        assert_eq!(parse_cli_verb("launch"), CliVerb::Unknown);
    }

    #[test]
    fn root_flag_is_removed_from_arguments() {
        let (root, rest) =
            split_root_flag(args(&["--root", "/tmp/x", "verify", "t1"])).expect("split");
        assert_eq!(root.as_deref(), Some("/tmp/x"));
        assert_eq!(rest, args(&["verify", "t1"]));

        let (root, rest) = split_root_flag(args(&["status", "--root=/srv"])).expect("split");
        assert_eq!(root.as_deref(), Some("/srv"));
        assert_eq!(rest, args(&["status"]));

        assert!(split_root_flag(args(&["status", "--root"])).is_err());
    }
}
