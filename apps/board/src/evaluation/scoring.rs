//! Scoring Aggregator: per-persona means and the weighted composite.
//! Everything here is a pure function of its inputs.

use std::collections::BTreeMap;

use tracing::warn;

use crate::errors::EvaluationError;
use crate::models::evaluation::{CriterionScore, PersonaEvaluation};
use crate::personas::Persona;

/// Gap between the model-reported and derived persona score that gets logged.
pub const CROSS_CHECK_TOLERANCE: f64 = 1.5;

/// Arithmetic mean of all criterion scores.
pub fn persona_score(scores: &BTreeMap<String, CriterionScore>) -> Result<f64, EvaluationError> {
    if scores.is_empty() {
        return Err(EvaluationError::EmptyScores);
    }
    let total: f64 = scores.values().map(|s| f64::from(s.score)).sum();
    Ok(total / scores.len() as f64)
}

/// `Σ persona_score(p) * weight(p)` over the evaluated personas.
/// Weights were validated to sum to 1.0 when the roster was loaded.
pub fn composite_score(
    per_persona: &[PersonaEvaluation],
    weights: &BTreeMap<Persona, f64>,
) -> Result<f64, EvaluationError> {
    per_persona.iter().try_fold(0.0, |acc, evaluation| {
        let weight = weights.get(&evaluation.persona_key).ok_or_else(|| {
            EvaluationError::ConfigMalformed {
                key: evaluation.persona_key.key().to_string(),
                reason: "no weight configured".to_string(),
            }
        })?;
        Ok(acc + persona_score(&evaluation.scores)? * weight)
    })
}

/// Compares the model's self-reported score with the derived mean.
/// Returns `true` when they diverge by more than the tolerance.
pub fn cross_check(evaluation: &PersonaEvaluation, derived: f64) -> bool {
    let reported = evaluation.overall_assessment.persona_score;
    let divergent = (reported - derived).abs() > CROSS_CHECK_TOLERANCE;
    if divergent {
        warn!(
            persona = evaluation.persona_key.key(),
            reported,
            derived,
            "Model-reported persona score diverges from criterion mean"
        );
    }
    divergent
}
