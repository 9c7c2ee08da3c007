//! Weighted-score material ranking over a small built-in candidate table.

use super::{round3, AgentError, AgentLogic, AgentOutput};
use crate::contracts::materials::{
    Contribution, MaterialPickRequest, MaterialPickResponse, Recommendation,
};

pub const AGENT_NAME: &str = "materials";
const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: &'static str,
    pub yield_mpa: f64,
    /// Relative cost index; lower is cheaper.
    pub cost_index: f64,
    /// Qualitative corrosion resistance; higher is better.
    pub corrosion_ordinal: u8,
}

pub const BUILTIN_CANDIDATES: [Candidate; 5] = [
    Candidate {
        name: "6061-T6 Al",
        yield_mpa: 275.0,
        cost_index: 1.0,
        corrosion_ordinal: 3,
    },
    Candidate {
        name: "7075-T6 Al",
        yield_mpa: 505.0,
        cost_index: 1.5,
        corrosion_ordinal: 2,
    },
    Candidate {
        name: "304 SS",
        yield_mpa: 215.0,
        cost_index: 1.8,
        corrosion_ordinal: 4,
    },
    Candidate {
        name: "316L SS",
        yield_mpa: 170.0,
        cost_index: 2.0,
        corrosion_ordinal: 5,
    },
    Candidate {
        name: "Ti-6Al-4V",
        yield_mpa: 830.0,
        cost_index: 5.0,
        corrosion_ordinal: 4,
    },
];

#[derive(Debug, Clone, Default)]
pub struct MaterialsAgent;

struct Span {
    min: f64,
    max: f64,
}

impl Span {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Self {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |acc, v| Self {
                min: acc.min.min(v),
                max: acc.max.max(v),
            },
        )
    }

    /// 0..=100, higher is better; `invert` flips the scale for lower-is-better inputs.
    fn normalize(&self, value: f64, invert: bool) -> f64 {
        if self.max == self.min {
            return 0.0;
        }
        let ratio = if invert {
            (self.max - value) / (self.max - self.min)
        } else {
            (value - self.min) / (self.max - self.min)
        };
        100.0 * ratio
    }
}

impl AgentLogic for MaterialsAgent {
    type Request = MaterialPickRequest;
    type Response = MaterialPickResponse;

    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    fn compute(&self, request: &MaterialPickRequest) -> Result<AgentOutput, AgentError> {
        let response = rank(request, &BUILTIN_CANDIDATES)?;
        let result = serde_json::to_value(&response).map_err(|e| AgentError(e.to_string()))?;
        Ok(AgentOutput {
            result,
            blobs: Vec::new(),
        })
    }
}

pub fn rank(
    request: &MaterialPickRequest,
    candidates: &[Candidate],
) -> Result<MaterialPickResponse, AgentError> {
    if candidates.is_empty() {
        return Err(AgentError("no material candidates available".to_string()));
    }
    let w = &request.weights;
    let total = (w.cost + w.strength + w.corrosion).max(1e-9);
    let (w_cost, w_strength, w_corrosion) = (w.cost / total, w.strength / total, w.corrosion / total);

    let strength = Span::of(candidates.iter().map(|c| c.yield_mpa));
    let cost = Span::of(candidates.iter().map(|c| c.cost_index));
    let corrosion = Span::of(candidates.iter().map(|c| f64::from(c.corrosion_ordinal)));
    let considers_corrosion = request
        .key_requirements
        .iter()
        .any(|k| k.to_ascii_lowercase().contains("corrosion"));

    let normalized = |c: &Candidate| {
        (
            strength.normalize(c.yield_mpa, false),
            cost.normalize(c.cost_index, true),
            corrosion.normalize(f64::from(c.corrosion_ordinal), false),
        )
    };

    let mut scored: Vec<(Recommendation, &Candidate)> = candidates
        .iter()
        .map(|c| {
            let (y, k, q) = normalized(c);
            let mut constraints = Vec::new();
            if request.min_yield_mpa.is_some_and(|min| c.yield_mpa >= min) {
                constraints.push("min_yield_mpa".to_string());
            }
            if considers_corrosion {
                constraints.push("corrosion_considered".to_string());
            }
            let rec = Recommendation {
                material: c.name.to_string(),
                score: round3(w_strength * y + w_cost * k + w_corrosion * q),
                reason: "weighted sum of normalized properties".to_string(),
                constraints_satisfied: constraints,
            };
            (rec, c)
        })
        .collect();
    scored.sort_by(|a, b| b.0.score.total_cmp(&a.0.score));

    let (y, k, q) = normalized(scored[0].1);
    let contributions = [
        ("strength", w_strength, y),
        ("cost", w_cost, k),
        ("corrosion", w_corrosion, q),
    ]
    .into_iter()
    .map(|(property, weight, value)| Contribution {
        property: property.to_string(),
        weight: round3(weight),
        normalized_value: round3(value),
        contribution: round3(weight * value),
    })
    .collect();

    let coverage = [request.min_yield_mpa.is_some(), !request.key_requirements.is_empty()]
        .iter()
        .filter(|covered| **covered)
        .count() as f64
        / 2.0;
    let top3: Vec<f64> = scored.iter().take(3).map(|(r, _)| r.score).collect();
    let spread = if top3.len() < 2 {
        0.0
    } else {
        top3.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            - top3.iter().cloned().fold(f64::INFINITY, f64::min)
    };
    let spread_factor = (spread / 10.0).min(1.0);
    // Built-in table only, so the source factor is fixed at its "synthesized" level.
    let source_factor = 0.6;
    let confidence = round3((0.3 * coverage + 0.4 * spread_factor + 0.3 * source_factor).clamp(0.0, 1.0));

    Ok(MaterialPickResponse {
        task_id: request.task_id.clone(),
        top_recommendations: scored.into_iter().take(TOP_N).map(|(r, _)| r).collect(),
        contributions,
        confidence,
        caveats: vec!["Using built-in material table; results illustrative.".to_string()],
        provenance: vec!["builtin".to_string()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::materials::WeightVector;

    fn request(strength: f64, cost: f64) -> MaterialPickRequest {
        MaterialPickRequest {
            task_id: "t1".to_string(),
            application: "bracket".to_string(),
            key_requirements: vec!["outdoor corrosion".to_string()],
            min_yield_mpa: Some(240.0),
            weights: WeightVector {
                cost,
                strength,
                corrosion: 0.0,
            },
        }
    }

    #[test]
    fn pure_strength_weighting_ranks_titanium_first() {
        let response = rank(&request(1.0, 0.0), &BUILTIN_CANDIDATES).expect("rank");
        assert_eq!(response.top_recommendations[0].material, "Ti-6Al-4V");
        assert_eq!(response.top_recommendations[0].score, 100.0);
        assert!(response.top_recommendations[0]
            .constraints_satisfied
            .contains(&"corrosion_considered".to_string()));
    }

    #[test]
    fn pure_cost_weighting_ranks_cheapest_first() {
        let response = rank(&request(0.0, 1.0), &BUILTIN_CANDIDATES).expect("rank");
        assert_eq!(response.top_recommendations[0].material, "6061-T6 Al");
        assert!((0.0..=1.0).contains(&response.confidence));
    }
}
