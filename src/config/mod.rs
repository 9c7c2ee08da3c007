pub mod error;
pub mod settings;
pub use error::ConfigError;
pub use settings::{
    AgentSettings, ResolvedAgent, Settings, AGENT_VERSION_ENV, CODE_SHA_ENV, SCHEMA_VERSION_ENV,
};
