//! Response Parser: defensive extraction of one evaluation object from
//! free-form model text, followed by validation against the persona's
//! expected shape.
//!
//! Extraction stages, each tried only when the previous one found nothing:
//! 1. drop every `<think>...</think>` block, each matched to its own close tag
//! 2. the trimmed remainder is itself a JSON object
//! 3. the interior of a ```json fenced block
//! 4. everything from the first `{` to the last `}`
//!
//! Text that yields no object is `PARSE_FAILED`. An object that does not
//! satisfy the schema is `SCHEMA_VIOLATION`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{EvaluationError, Excerpt};
use crate::llm_client::schema::{
    PERSONA_SCORE_MAX, PERSONA_SCORE_MIN, REASONING_MAX_CHARS, RECOMMENDATION_MAX_CHARS,
    SCORE_MAX, SCORE_MIN,
};
use crate::models::evaluation::{CriterionScore, OverallAssessment, PersonaEvaluation};
use crate::personas::PersonaDefinition;

/// Which extraction stage produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Direct,
    FencedBlock,
    BraceSpan,
}

fn think_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block regex"))
}

fn fenced_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?si)```json\s*(.*?)```").expect("valid fence regex"))
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Runs the staged extraction and returns the first JSON object found.
pub fn extract_json(raw: &str) -> Result<(Map<String, Value>, Stage), EvaluationError> {
    let stripped = think_block().replace_all(raw, "");
    let text = stripped.trim();

    if text.starts_with('{') && text.ends_with('}') {
        if let Some(map) = parse_object(text) {
            return Ok((map, Stage::Direct));
        }
    }

    if let Some(inner) = fenced_json().captures(text).and_then(|c| c.get(1)) {
        if let Some(map) = parse_object(inner.as_str()) {
            return Ok((map, Stage::FencedBlock));
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(map) = parse_object(&text[start..=end]) {
                return Ok((map, Stage::BraceSpan));
            }
        }
    }

    Err(EvaluationError::ParseFailed {
        excerpt: Excerpt::of(raw),
    })
}

/// Parses raw model text into a `PersonaEvaluation` for `definition`.
/// The persona identity comes from configuration, never from the model.
pub fn parse(raw: &str, definition: &PersonaDefinition) -> Result<PersonaEvaluation, EvaluationError> {
    let (object, stage) = extract_json(raw)?;
    debug!(persona = definition.key.key(), ?stage, "Extracted evaluation JSON");

    let violation = |reason: String| EvaluationError::SchemaViolation {
        reason,
        excerpt: Excerpt::of(raw),
    };

    let scores_obj = object
        .get("scores")
        .and_then(Value::as_object)
        .ok_or_else(|| violation("missing object 'scores'".to_string()))?;

    let mut scores = BTreeMap::new();
    for id in definition.criterion_ids() {
        let entry = scores_obj
            .get(id)
            .and_then(Value::as_object)
            .ok_or_else(|| violation(format!("missing criterion '{id}'")))?;
        let score = read_score(entry.get("score"))
            .map_err(|why| violation(format!("criterion '{id}': {why}")))?;
        let reasoning = entry
            .get("reasoning")
            .and_then(Value::as_str)
            .ok_or_else(|| violation(format!("criterion '{id}': missing string 'reasoning'")))?;
        scores.insert(
            id.to_string(),
            CriterionScore {
                score,
                reasoning: bounded(reasoning, REASONING_MAX_CHARS),
            },
        );
    }

    let undeclared: Vec<&str> = scores_obj
        .keys()
        .map(String::as_str)
        .filter(|k| !definition.criterion_ids().any(|id| id == *k))
        .collect();
    if !undeclared.is_empty() {
        debug!(persona = definition.key.key(), ?undeclared, "Ignoring undeclared criteria");
    }

    let overall = object
        .get("overall_assessment")
        .and_then(Value::as_object)
        .ok_or_else(|| violation("missing object 'overall_assessment'".to_string()))?;
    let persona_score = overall
        .get("persona_score")
        .and_then(Value::as_f64)
        .ok_or_else(|| violation("overall_assessment.persona_score must be a number".to_string()))?;
    if !(PERSONA_SCORE_MIN..=PERSONA_SCORE_MAX).contains(&persona_score) {
        return Err(violation(format!(
            "overall_assessment.persona_score {persona_score} outside [{PERSONA_SCORE_MIN}, {PERSONA_SCORE_MAX}]"
        )));
    }
    let recommendation = overall
        .get("recommendation")
        .and_then(Value::as_str)
        .ok_or_else(|| violation("overall_assessment.recommendation must be a string".to_string()))?;

    Ok(PersonaEvaluation {
        persona: definition.name.clone(),
        persona_key: definition.key,
        scores,
        overall_assessment: OverallAssessment {
            persona_score,
            recommendation: bounded(recommendation, RECOMMENDATION_MAX_CHARS),
        },
    })
}

/// Accepts only JSON integers in range. `8.0`, `0.5`, `"8"` and `11` are all rejected.
fn read_score(value: Option<&Value>) -> Result<u8, String> {
    let value = value.ok_or("missing 'score'")?;
    let score = value
        .as_u64()
        .ok_or_else(|| format!("score {value} is not an integer"))?;
    if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
        return Err(format!("score {score} outside [{SCORE_MIN}, {SCORE_MAX}]"));
    }
    Ok(score as u8)
}

fn bounded(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
