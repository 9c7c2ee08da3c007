//! Material selection request/response shapes.

use super::{check_non_empty, check_range, Contract, ResultContract, TaskRequest};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relative scoring weights; the agent normalizes them to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WeightVector {
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub strength: f64,
    #[serde(default)]
    pub corrosion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MaterialPickRequest {
    pub task_id: String,
    pub application: String,
    #[serde(default)]
    pub key_requirements: Vec<String>,
    #[serde(default)]
    pub min_yield_mpa: Option<f64>,
    pub weights: WeightVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Recommendation {
    pub material: String,
    pub score: f64,
    pub reason: String,
    #[serde(default)]
    pub constraints_satisfied: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Contribution {
    pub property: String,
    pub weight: f64,
    pub normalized_value: f64,
    /// `weight * normalized_value`
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MaterialPickResponse {
    pub task_id: String,
    pub top_recommendations: Vec<Recommendation>,
    pub contributions: Vec<Contribution>,
    pub confidence: f64,
    #[serde(default)]
    pub caveats: Vec<String>,
    #[serde(default)]
    pub provenance: Vec<String>,
}

impl Contract for MaterialPickRequest {
    const NAME: &'static str = "MaterialPickRequest";

    fn check(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        check_non_empty(&mut reasons, "task_id", &self.task_id);
        check_non_empty(&mut reasons, "application", &self.application);
        for (field, value) in [
            ("weights.cost", self.weights.cost),
            ("weights.strength", self.weights.strength),
            ("weights.corrosion", self.weights.corrosion),
        ] {
            check_range(&mut reasons, field, value, 0.0, 1.0);
        }
        if let Some(min_yield) = self.min_yield_mpa {
            check_range(&mut reasons, "min_yield_mpa", min_yield, 0.0, f64::MAX);
        }
        reasons
    }
}

impl TaskRequest for MaterialPickRequest {
    fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl Contract for MaterialPickResponse {
    const NAME: &'static str = "MaterialPickResponse";

    fn check(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        check_non_empty(&mut reasons, "task_id", &self.task_id);
        check_range(&mut reasons, "confidence", self.confidence, 0.0, 1.0);
        for (idx, rec) in self.top_recommendations.iter().enumerate() {
            check_range(
                &mut reasons,
                &format!("top_recommendations[{idx}].score"),
                rec.score,
                0.0,
                100.0,
            );
        }
        for (idx, c) in self.contributions.iter().enumerate() {
            check_range(
                &mut reasons,
                &format!("contributions[{idx}].normalized_value"),
                c.normalized_value,
                0.0,
                100.0,
            );
        }
        reasons
    }
}

impl ResultContract for MaterialPickResponse {
    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn assumptions(&self) -> Vec<String> {
        self.caveats.clone()
    }
}

pub fn schemas() -> Vec<(&'static str, Value)> {
    vec![
        super::schema_of::<MaterialPickRequest>(),
        super::schema_of::<MaterialPickResponse>(),
    ]
}
