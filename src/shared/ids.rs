use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Identifiers end up as path components under `queue/` and `runs/`, so they are
/// restricted to a filename-safe alphabet.
pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value.starts_with('.') {
        return Err(format!("{kind} must not start with '.'"));
    }
    if value.contains("__") {
        return Err(format!("{kind} must not contain `__`"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-', '_' or '.'"
    ))
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                validate_identifier_value($kind, raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(TaskId, "task id");
define_id_type!(AgentName, "agent name");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_reject_path_like_values() {
        assert!(TaskId::parse("demo-materials-1").is_ok());
        assert!(TaskId::parse("t1").is_ok());
        assert!(TaskId::parse("").is_err());
        assert!(TaskId::parse("../etc").is_err());
        assert!(TaskId::parse("a/b").is_err());
        assert!(TaskId::parse("a__b").is_err());
        assert!(AgentName::parse(".hidden").is_err());
    }
}
