use crate::app::cli::{help_text, parse_cli_verb, split_root_flag, CliVerb};
use crate::app::command_support::{resolve_state_paths, CommandOutput};

pub mod tasks;
pub mod workers;

pub fn run_cli(args: Vec<String>) -> Result<CommandOutput, String> {
    let (root, args) = split_root_flag(args)?;
    if args.is_empty() {
        return Ok(CommandOutput::ok(help_text()));
    }
    let paths = resolve_state_paths(root);
    let rest = &args[1..];

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Bootstrap => tasks::cmd_bootstrap(&paths, rest),
        CliVerb::Enqueue => tasks::cmd_enqueue(&paths, rest),
        CliVerb::Report => tasks::cmd_report(&paths, rest),
        CliVerb::Verify => tasks::cmd_verify(&paths, rest),
        CliVerb::Agent => workers::cmd_agent(&paths, rest),
        CliVerb::Status => workers::cmd_status(&paths),
        CliVerb::Recover => workers::cmd_recover(&paths, rest),
        CliVerb::Help => Ok(CommandOutput::ok(help_text())),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
