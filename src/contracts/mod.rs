use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub mod materials;
pub mod stackup;

/// A statically typed request or result shape. `check` carries the constraints the
/// type system cannot express (ranges, non-empty lists).
pub trait Contract: Serialize + DeserializeOwned + JsonSchema {
    const NAME: &'static str;

    fn check(&self) -> Vec<String> {
        Vec::new()
    }
}

pub trait TaskRequest: Contract {
    fn task_id(&self) -> &str;
}

pub trait ResultContract: Contract {
    fn confidence(&self) -> f64;

    fn assumptions(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schema validation failed for {contract}: {}", .reasons.join("; "))]
pub struct SchemaViolation {
    pub contract: &'static str,
    pub reasons: Vec<String>,
}

pub fn validate_value<T: Contract>(raw: &Value) -> Result<T, SchemaViolation> {
    let parsed: T = serde_json::from_value(raw.clone()).map_err(|err| SchemaViolation {
        contract: T::NAME,
        reasons: vec![err.to_string()],
    })?;
    let reasons = parsed.check();
    if reasons.is_empty() {
        Ok(parsed)
    } else {
        Err(SchemaViolation {
            contract: T::NAME,
            reasons,
        })
    }
}

pub fn validate_bytes<T: Contract>(bytes: &[u8]) -> Result<T, SchemaViolation> {
    let raw: Value = serde_json::from_slice(bytes).map_err(|err| SchemaViolation {
        contract: T::NAME,
        reasons: vec![format!("not valid json: {err}")],
    })?;
    validate_value(&raw)
}

pub fn schema_of<T: Contract>() -> (&'static str, Value) {
    let schema = schemars::schema_for!(T);
    (
        T::NAME,
        serde_json::to_value(schema).unwrap_or(Value::Null),
    )
}

/// Every contract any shipped agent consumes or produces.
pub fn all_schemas() -> Vec<(&'static str, Value)> {
    let mut schemas = materials::schemas();
    schemas.extend(stackup::schemas());
    schemas
}

pub(crate) fn check_range(reasons: &mut Vec<String>, field: &str, value: f64, min: f64, max: f64) {
    if !value.is_finite() || value < min || value > max {
        reasons.push(format!("{field} must be within [{min}, {max}], got {value}"));
    }
}

pub(crate) fn check_non_empty(reasons: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        reasons.push(format!("{field} must be non-empty"));
    }
}

#[cfg(test)]
mod tests {
    use super::materials::MaterialPickResponse;
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_and_range_violations_are_reported() {
        let extra = json!({
            "task_id": "t1",
            "top_recommendations": [],
            "contributions": [],
            "confidence": 0.5,
            "surprise": true
        });
        let err = validate_value::<MaterialPickResponse>(&extra).expect_err("unknown field");
        assert_eq!(err.contract, "MaterialPickResponse");
        assert!(err.reasons[0].contains("surprise"));

        let out_of_range = json!({
            "task_id": "t1",
            "top_recommendations": [],
            "contributions": [],
            "confidence": 1.5
        });
        let err = validate_value::<MaterialPickResponse>(&out_of_range).expect_err("range");
        assert!(err.to_string().contains("confidence"));
    }

    #[test]
    fn every_schema_is_exported_once_by_name() {
        let names: Vec<&str> = all_schemas().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "MaterialPickRequest",
                "MaterialPickResponse",
                "StackupAnalyzeRequest",
                "StackupAnalyzeResponse"
            ]
        );
    }
}
