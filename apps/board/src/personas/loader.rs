//! Persona Config Loader: reads `<dir>/<key>.yaml` into a `PersonaDefinition`
//! and validates the roster's weight table at startup.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::{Criterion, Persona, PersonaDefinition};
use crate::errors::EvaluationError;

/// Allowed drift of the weight sum from 1.0.
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// On-disk shape of a persona file. `criteria` and `weight` are required.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonaFile {
    name: String,
    #[serde(default)]
    background: String,
    weight: f64,
    criteria: Vec<Criterion>,
    #[serde(default)]
    prompt_template: Option<String>,
}

pub fn config_path(dir: &Path, persona: Persona) -> PathBuf {
    dir.join(format!("{}.yaml", persona.key()))
}

/// Loads one persona definition. Read-only.
pub fn load(dir: &Path, persona: Persona) -> Result<PersonaDefinition, EvaluationError> {
    let path = config_path(dir, persona);
    let raw = std::fs::read_to_string(&path).map_err(|_| EvaluationError::ConfigNotFound {
        key: persona.key().to_string(),
        path: path.clone(),
    })?;

    let definition = parse(persona, &raw)?;
    debug!(
        persona = persona.key(),
        criteria = definition.criteria.len(),
        "Loaded persona config from {}",
        path.display()
    );
    Ok(definition)
}

fn parse(persona: Persona, raw: &str) -> Result<PersonaDefinition, EvaluationError> {
    let malformed = |reason: String| EvaluationError::ConfigMalformed {
        key: persona.key().to_string(),
        reason,
    };

    let file: PersonaFile = serde_yaml::from_str(raw).map_err(|e| malformed(e.to_string()))?;

    if file.name.trim().is_empty() {
        return Err(malformed("name must not be empty".to_string()));
    }
    if file.criteria.is_empty() {
        return Err(malformed("criteria must list at least one criterion".to_string()));
    }
    if !(0.0..=1.0).contains(&file.weight) || !file.weight.is_finite() {
        return Err(malformed(format!("weight {} is outside [0, 1]", file.weight)));
    }

    let mut seen = HashSet::new();
    for criterion in &file.criteria {
        if criterion.id.trim().is_empty() {
            return Err(malformed("criterion id must not be empty".to_string()));
        }
        if !seen.insert(criterion.id.as_str()) {
            return Err(malformed(format!("duplicate criterion id '{}'", criterion.id)));
        }
    }

    Ok(PersonaDefinition {
        key: persona,
        name: file.name,
        background: file.background,
        criteria: file.criteria,
        weight: file.weight,
        prompt_template: file.prompt_template,
    })
}

/// The configured board: one definition per persona, in dispatch order.
/// Construction guarantees the weights sum to 1.0.
#[derive(Debug, Clone)]
pub struct PersonaRoster {
    definitions: Vec<PersonaDefinition>,
}

impl PersonaRoster {
    /// Loads every persona from `dir`. Any failure here is fatal at startup.
    pub fn load(dir: &Path) -> Result<Self, EvaluationError> {
        let definitions = Persona::ALL
            .into_iter()
            .map(|p| load(dir, p))
            .collect::<Result<Vec<_>, _>>()?;
        let roster = Self::from_definitions(definitions)?;
        info!(
            personas = roster.definitions.len(),
            "Persona roster loaded from {}",
            dir.display()
        );
        Ok(roster)
    }

    /// Requires exactly one definition per persona and a weight sum of 1.0.
    pub fn from_definitions(mut definitions: Vec<PersonaDefinition>) -> Result<Self, EvaluationError> {
        definitions.sort_by_key(|d| d.key);
        for persona in Persona::ALL {
            let count = definitions.iter().filter(|d| d.key == persona).count();
            if count != 1 {
                let reason = if count == 0 {
                    "missing from the board".to_string()
                } else {
                    format!("defined {count} times")
                };
                return Err(EvaluationError::ConfigMalformed {
                    key: persona.key().to_string(),
                    reason,
                });
            }
        }
        let sum: f64 = definitions.iter().map(|d| d.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(EvaluationError::WeightSumInvalid { sum });
        }
        Ok(Self { definitions })
    }

    pub fn definitions(&self) -> &[PersonaDefinition] {
        &self.definitions
    }

    pub fn get(&self, persona: Persona) -> Option<&PersonaDefinition> {
        self.definitions.iter().find(|d| d.key == persona)
    }

    pub fn weights(&self) -> BTreeMap<Persona, f64> {
        self.definitions.iter().map(|d| (d.key, d.weight)).collect()
    }
}
