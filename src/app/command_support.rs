use crate::config::Settings;
use crate::runtime::{default_state_root_path, StatePaths};
use std::path::PathBuf;

/// Output of one command: text for stdout plus the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_code: 0,
        }
    }
}

pub fn resolve_state_paths(root: Option<String>) -> StatePaths {
    StatePaths::new(root.map(PathBuf::from).unwrap_or_else(default_state_root_path))
}

pub fn load_settings(paths: &StatePaths) -> Result<Settings, String> {
    Settings::load_or_default(&paths.settings_file()).map_err(|e| e.to_string())
}

pub fn expect_args<'a>(args: &'a [String], count: usize, usage: &str) -> Result<&'a [String], String> {
    if args.len() < count {
        return Err(format!("usage: {usage}"));
    }
    Ok(args)
}
