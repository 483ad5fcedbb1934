//! Review-board personas: the closed set of evaluator roles and the
//! configuration each one is loaded from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod domains;
pub mod loader;

pub use loader::PersonaRoster;

/// Evaluator roles on the review board. Adding or removing one is a
/// compile-checked change: every `match` over this enum must be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Hr,
    Technical,
    Design,
    Finance,
    Ceo,
    Team,
}

impl Persona {
    /// Canonical dispatch order. Keyword ties resolve in this order too.
    pub const ALL: [Persona; 6] = [
        Persona::Hr,
        Persona::Technical,
        Persona::Design,
        Persona::Finance,
        Persona::Ceo,
        Persona::Team,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Persona::Hr => "hr",
            Persona::Technical => "technical",
            Persona::Design => "design",
            Persona::Finance => "finance",
            Persona::Ceo => "ceo",
            Persona::Team => "team",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when a key outside the closed persona set is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPersona(pub String);

impl FromStr for Persona {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Persona::ALL
            .into_iter()
            .find(|p| p.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPersona(s.to_string()))
    }
}

/// One scored dimension of a persona's review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, rename = "rubric")]
    pub rubric_bullets: Vec<String>,
}

/// Immutable description of a persona, loaded once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaDefinition {
    pub key: Persona,
    pub name: String,
    pub background: String,
    pub criteria: Vec<Criterion>,
    /// Share of the composite score.
    pub weight: f64,
    /// Persona-specific template; the shared default is used when absent.
    pub prompt_template: Option<String>,
}

impl PersonaDefinition {
    /// Criterion ids in declaration order. These drive the response schema.
    pub fn criterion_ids(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(|c| c.id.as_str())
    }
}
