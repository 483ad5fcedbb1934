use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::personas::Persona;

/// One criterion's score. `score` is always an integer in 1..=10; the parser
/// rejects anything else rather than clamping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub score: u8,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    /// Model-reported score in [1.0, 10.0]. Cross-checked, never used for the composite.
    pub persona_score: f64,
    pub recommendation: String,
}

/// A single persona's parsed review. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaEvaluation {
    /// Display name from configuration, never from the model.
    pub persona: String,
    pub persona_key: Persona,
    pub scores: BTreeMap<String, CriterionScore>,
    pub overall_assessment: OverallAssessment,
}

/// Final output of a run. Written once and not mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResult {
    pub run_id: Uuid,
    pub candidate_name: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub per_persona: Vec<PersonaEvaluation>,
    pub composite_score: f64,
}

/// Raw results artifact persisted next to the human-readable summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResultsArtifact {
    pub evaluation_timestamp: DateTime<Utc>,
    pub model: String,
    pub candidate: String,
    pub evaluations: Vec<PersonaEvaluation>,
}

impl From<&CompositeResult> for RawResultsArtifact {
    fn from(result: &CompositeResult) -> Self {
        Self {
            evaluation_timestamp: result.timestamp,
            model: result.model.clone(),
            candidate: result.candidate_name.clone(),
            evaluations: result.per_persona.clone(),
        }
    }
}
