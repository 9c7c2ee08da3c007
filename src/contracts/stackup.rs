//! Tolerance stack-up request/response shapes.

use super::{check_non_empty, check_range, Contract, ResultContract, TaskRequest};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    #[default]
    Normal,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Positive,
    Negative,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Feature {
    pub name: String,
    pub nominal: f64,
    pub tol_plus: f64,
    pub tol_minus: f64,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StackupAnalyzeRequest {
    pub task_id: String,
    pub description: String,
    pub features: Vec<Feature>,
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
    #[serde(default)]
    pub lower_spec: Option<f64>,
    #[serde(default)]
    pub upper_spec: Option<f64>,
}

fn default_sample_size() -> u32 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StackupAnalyzeResponse {
    pub task_id: String,
    pub nominal: f64,
    pub worst_case_min: f64,
    pub worst_case_max: f64,
    pub rss_sigma: f64,
    pub rss_min: f64,
    pub rss_max: f64,
    /// Fraction of assemblies expected within spec, when limits were given.
    #[serde(default)]
    pub yield_estimate: Option<f64>,
    pub confidence: f64,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

impl Contract for StackupAnalyzeRequest {
    const NAME: &'static str = "StackupAnalyzeRequest";

    fn check(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        check_non_empty(&mut reasons, "task_id", &self.task_id);
        if self.features.is_empty() {
            reasons.push("features must contain at least one feature".to_string());
        }
        for (idx, feature) in self.features.iter().enumerate() {
            check_non_empty(&mut reasons, &format!("features[{idx}].name"), &feature.name);
            check_range(
                &mut reasons,
                &format!("features[{idx}].tol_plus"),
                feature.tol_plus,
                0.0,
                f64::MAX,
            );
            check_range(
                &mut reasons,
                &format!("features[{idx}].tol_minus"),
                feature.tol_minus,
                0.0,
                f64::MAX,
            );
        }
        if self.sample_size == 0 {
            reasons.push("sample_size must be positive".to_string());
        }
        if let (Some(lower), Some(upper)) = (self.lower_spec, self.upper_spec) {
            if lower > upper {
                reasons.push(format!("lower_spec {lower} exceeds upper_spec {upper}"));
            }
        }
        reasons
    }
}

impl TaskRequest for StackupAnalyzeRequest {
    fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl Contract for StackupAnalyzeResponse {
    const NAME: &'static str = "StackupAnalyzeResponse";

    fn check(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        check_non_empty(&mut reasons, "task_id", &self.task_id);
        check_range(&mut reasons, "confidence", self.confidence, 0.0, 1.0);
        check_range(&mut reasons, "rss_sigma", self.rss_sigma, 0.0, f64::MAX);
        if self.worst_case_min > self.worst_case_max {
            reasons.push("worst_case_min exceeds worst_case_max".to_string());
        }
        if let Some(estimate) = self.yield_estimate {
            check_range(&mut reasons, "yield_estimate", estimate, 0.0, 1.0);
        }
        reasons
    }
}

impl ResultContract for StackupAnalyzeResponse {
    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn assumptions(&self) -> Vec<String> {
        self.assumptions.clone()
    }
}

pub fn schemas() -> Vec<(&'static str, Value)> {
    vec![
        super::schema_of::<StackupAnalyzeRequest>(),
        super::schema_of::<StackupAnalyzeResponse>(),
    ]
}
