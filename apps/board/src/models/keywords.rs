use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::personas::Persona;

/// One ranked keyword from the upstream analysis. Only `kw` is required;
/// everything else the ranker emits is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub kw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The ranked-keywords document produced by the external keyword ranker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedKeywords {
    #[serde(default)]
    pub knockout_requirements: Vec<Keyword>,
    #[serde(default)]
    pub skills_ranked: Vec<Keyword>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl RankedKeywords {
    /// Knockout requirements first, then ranked skills, in artifact order.
    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.knockout_requirements.iter().chain(self.skills_ranked.iter())
    }
}

/// Keywords routed to one persona for this run. Recomputed every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordContext {
    pub persona: Persona,
    pub keywords: Vec<String>,
}
