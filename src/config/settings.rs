use super::ConfigError;
use crate::envelope::AgentIdentity;
use crate::queue::QUEUE_VERSION;
use crate::shared::ids::AgentName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const AGENT_VERSION_ENV: &str = "AGENT_VERSION";
pub const CODE_SHA_ENV: &str = "CODE_SHA";
pub const SCHEMA_VERSION_ENV: &str = "SCHEMA_VERSION";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    #[serde(default = "default_busy_poll_ms")]
    pub busy_poll_ms: u64,
    #[serde(default = "default_queue_version")]
    pub queue_version: String,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_version")]
    pub version: String,
    #[serde(default = "default_code_sha")]
    pub code_sha: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            version: default_agent_version(),
            code_sha: default_code_sha(),
            schema_version: default_schema_version(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            idle_poll_ms: default_idle_poll_ms(),
            busy_poll_ms: default_busy_poll_ms(),
            queue_version: default_queue_version(),
            agents: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAgent {
    pub identity: AgentIdentity,
    pub schema_version: String,
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Missing file means defaults; a present but invalid file is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let settings = if path.exists() {
            Self::from_path(path)?
        } else {
            Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_poll_ms == 0 || self.busy_poll_ms == 0 {
            return Err(ConfigError::Settings(
                "idle_poll_ms and busy_poll_ms must be positive".to_string(),
            ));
        }
        if self.queue_version.trim().is_empty() {
            return Err(ConfigError::Settings(
                "queue_version must be non-empty".to_string(),
            ));
        }
        for name in self.agents.keys() {
            AgentName::parse(name).map_err(ConfigError::Settings)?;
        }
        Ok(())
    }

    pub fn resolve_agent(&self, name: &str) -> ResolvedAgent {
        self.resolve_agent_with_env(name, |key| std::env::var(key).ok())
    }

    /// File values, overridden by `AGENT_VERSION`, `CODE_SHA` and `SCHEMA_VERSION`.
    pub fn resolve_agent_with_env(
        &self,
        name: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> ResolvedAgent {
        let base = self.agents.get(name).cloned().unwrap_or_default();
        let pick = |key: &str, fallback: String| {
            env(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(fallback)
        };
        ResolvedAgent {
            identity: AgentIdentity {
                name: name.to_string(),
                version: pick(AGENT_VERSION_ENV, base.version),
                code_sha: pick(CODE_SHA_ENV, base.code_sha),
            },
            schema_version: pick(SCHEMA_VERSION_ENV, base.schema_version),
        }
    }
}

fn default_idle_poll_ms() -> u64 {
    1000
}

fn default_busy_poll_ms() -> u64 {
    100
}

fn default_queue_version() -> String {
    QUEUE_VERSION.to_string()
}

fn default_agent_version() -> String {
    "0.1.0".to_string()
}

fn default_code_sha() -> String {
    "dev".to_string()
}

fn default_schema_version() -> String {
    "resp-1.0".to_string()
}
