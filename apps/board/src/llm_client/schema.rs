//! JSON Schema sent as the `format` constraint of a generate request.
//! Built per persona from its configured criteria.

use serde_json::{json, Map, Value};

use crate::personas::PersonaDefinition;

pub const SCORE_MIN: u64 = 1;
pub const SCORE_MAX: u64 = 10;
pub const PERSONA_SCORE_MIN: f64 = 1.0;
pub const PERSONA_SCORE_MAX: f64 = 10.0;
pub const REASONING_MAX_CHARS: usize = 300;
pub const RECOMMENDATION_MAX_CHARS: usize = 200;

/// Every criterion becomes a required `{score, reasoning}` object under
/// `scores`; `overall_assessment` is required alongside it.
pub fn evaluation_schema(definition: &PersonaDefinition) -> Value {
    let mut criteria = Map::new();
    for id in definition.criterion_ids() {
        criteria.insert(
            id.to_string(),
            json!({
                "type": "object",
                "properties": {
                    "score": {
                        "type": "integer",
                        "minimum": SCORE_MIN,
                        "maximum": SCORE_MAX
                    },
                    "reasoning": {
                        "type": "string",
                        "maxLength": REASONING_MAX_CHARS
                    }
                },
                "required": ["score", "reasoning"]
            }),
        );
    }
    let required: Vec<&str> = definition.criterion_ids().collect();

    json!({
        "type": "object",
        "properties": {
            "scores": {
                "type": "object",
                "properties": criteria,
                "required": required
            },
            "overall_assessment": {
                "type": "object",
                "properties": {
                    "persona_score": {
                        "type": "number",
                        "minimum": PERSONA_SCORE_MIN,
                        "maximum": PERSONA_SCORE_MAX
                    },
                    "recommendation": {
                        "type": "string",
                        "maxLength": RECOMMENDATION_MAX_CHARS
                    }
                },
                "required": ["persona_score", "recommendation"]
            }
        },
        "required": ["scores", "overall_assessment"]
    })
}
