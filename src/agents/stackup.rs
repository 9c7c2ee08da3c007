//! Worst-case and root-sum-square tolerance stack analysis.

use super::{round3, AgentError, AgentLogic, AgentOutput, BlobPayload};
use crate::contracts::stackup::{
    Distribution, Feature, StackupAnalyzeRequest, StackupAnalyzeResponse,
};

pub const AGENT_NAME: &str = "stackup";

#[derive(Debug, Clone, Default)]
pub struct StackupAgent;

impl AgentLogic for StackupAgent {
    type Request = StackupAnalyzeRequest;
    type Response = StackupAnalyzeResponse;

    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    fn compute(&self, request: &StackupAnalyzeRequest) -> Result<AgentOutput, AgentError> {
        let response = analyze(request)?;
        let result = serde_json::to_value(&response).map_err(|e| AgentError(e.to_string()))?;
        Ok(AgentOutput {
            result,
            blobs: vec![BlobPayload {
                bytes: feature_table_csv(&request.features).into_bytes(),
                ext: "csv".to_string(),
            }],
        })
    }
}

fn feature_sigma(feature: &Feature) -> f64 {
    let width = feature.tol_plus + feature.tol_minus;
    match feature.distribution {
        Distribution::Normal => width / 6.0,
        Distribution::Uniform => width / 12f64.sqrt(),
    }
}

pub fn analyze(request: &StackupAnalyzeRequest) -> Result<StackupAnalyzeResponse, AgentError> {
    if request.features.is_empty() {
        return Err(AgentError("stack has no features".to_string()));
    }

    let mut nominal = 0.0;
    let mut mean = 0.0;
    let mut worst_min = 0.0;
    let mut worst_max = 0.0;
    let mut variance = 0.0;
    for feature in &request.features {
        let sign = feature.direction.sign();
        let low = sign * (feature.nominal - feature.tol_minus);
        let high = sign * (feature.nominal + feature.tol_plus);
        nominal += sign * feature.nominal;
        mean += sign * (feature.nominal + (feature.tol_plus - feature.tol_minus) / 2.0);
        worst_min += low.min(high);
        worst_max += low.max(high);
        variance += feature_sigma(feature).powi(2);
    }
    let sigma = variance.sqrt();

    let yield_estimate = match (request.lower_spec, request.upper_spec) {
        (None, None) => None,
        (lower, upper) => {
            let below = lower.map_or(0.0, |l| normal_cdf(l, mean, sigma));
            let within_upper = upper.map_or(1.0, |u| normal_cdf(u, mean, sigma));
            Some(round3((within_upper - below).clamp(0.0, 1.0)))
        }
    };

    let mut assumptions = vec![
        "feature deviations are independent".to_string(),
        "tolerance band spans +/-3 sigma for normal features".to_string(),
        format!(
            "analytic RSS used in place of {} Monte Carlo samples",
            request.sample_size
        ),
    ];
    let uniform = request
        .features
        .iter()
        .any(|f| f.distribution == Distribution::Uniform);
    if uniform {
        assumptions.push("uniform features approximated as normal in the stack".to_string());
    }

    Ok(StackupAnalyzeResponse {
        task_id: request.task_id.clone(),
        nominal: round3(nominal),
        worst_case_min: round3(worst_min),
        worst_case_max: round3(worst_max),
        rss_sigma: round3(sigma),
        rss_min: round3(mean - 3.0 * sigma),
        rss_max: round3(mean + 3.0 * sigma),
        yield_estimate,
        confidence: if uniform { 0.7 } else { 0.85 },
        assumptions,
    })
}

pub fn feature_table_csv(features: &[Feature]) -> String {
    let mut out = String::from("name,nominal,tol_plus,tol_minus,distribution,direction,sigma\n");
    for f in features {
        out.push_str(&format!(
            "{},{},{},{},{:?},{:?},{}\n",
            f.name.replace(',', " "),
            f.nominal,
            f.tol_plus,
            f.tol_minus,
            f.distribution,
            f.direction,
            round3(feature_sigma(f)),
        ));
    }
    out
}

fn normal_cdf(x: f64, mean: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return if x >= mean { 1.0 } else { 0.0 };
    }
    0.5 * (1.0 + erf((x - mean) / (sigma * std::f64::consts::SQRT_2)))
}

/// Abramowitz–Stegun 7.1.26; absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}
