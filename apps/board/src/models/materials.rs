use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EvaluationError;
use crate::models::keywords::RankedKeywords;

const FALLBACK_CANDIDATE_NAME: &str = "Candidate";

/// Read-only inputs to one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMaterials {
    #[serde(default)]
    pub candidate_name: Option<String>,
    pub job_posting: String,
    pub resume: Value,
    #[serde(default)]
    pub ranked_keywords: RankedKeywords,
}

impl EvaluationMaterials {
    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.job_posting.trim().is_empty() {
            return Err(EvaluationError::MaterialsInvalid(
                "job_posting cannot be empty".to_string(),
            ));
        }
        if !self.resume.is_object() {
            return Err(EvaluationError::MaterialsInvalid(
                "resume must be a JSON object".to_string(),
            ));
        }
        Ok(())
    }

    /// Explicit name, then `resume.name`, then `resume.basics.name`.
    pub fn candidate_name(&self) -> String {
        self.candidate_name
            .as_deref()
            .or_else(|| self.resume.get("name").and_then(Value::as_str))
            .or_else(|| self.resume.pointer("/basics/name").and_then(Value::as_str))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_CANDIDATE_NAME)
            .to_string()
    }
}
