//! Prompt Assembler: merges persona config, keyword focus block, job posting,
//! and résumé into one fully substituted prompt.

use serde_json::{json, Map, Value};

use crate::errors::EvaluationError;
use crate::evaluation::prompts::{PERSONA_PROMPT_TEMPLATE, REQUIRED_PLACEHOLDERS};
use crate::keywords;
use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, SCORING_INSTRUCTION};
use crate::models::keywords::KeywordContext;
use crate::personas::PersonaDefinition;

/// Builds the prompt for one persona. Fails with `TEMPLATE_ERROR` when the
/// template lacks a required placeholder.
pub fn build(
    definition: &PersonaDefinition,
    job_posting: &str,
    resume: &Value,
    keyword_context: &KeywordContext,
) -> Result<String, EvaluationError> {
    let template = definition
        .prompt_template
        .as_deref()
        .unwrap_or(PERSONA_PROMPT_TEMPLATE);

    if let Some(missing) = REQUIRED_PLACEHOLDERS
        .iter()
        .find(|p| !template.contains(*p))
    {
        return Err(EvaluationError::Template {
            placeholder: *missing,
        });
    }

    // serde_json's default map is ordered, so this is byte-stable for equal input.
    let resume_json = serde_json::to_string_pretty(resume)
        .map_err(|e| EvaluationError::MaterialsInvalid(format!("resume is not serializable: {e}")))?;

    let focus = keywords::render(keyword_context, &definition.name);
    let criteria = render_criteria(definition);
    let output_format = render_output_format(definition);

    Ok(fill(
        template,
        &[
            ("persona_name", definition.name.as_str()),
            ("persona_background", definition.background.trim()),
            ("keyword_context", focus.as_str()),
            ("job_posting", job_posting.trim()),
            ("resume_json", resume_json.as_str()),
            ("scoring_criteria", criteria.as_str()),
            ("scoring_instruction", SCORING_INSTRUCTION),
            ("output_format", output_format.as_str()),
            ("json_only_instruction", JSON_ONLY_INSTRUCTION),
        ],
    ))
}

/// Single-pass `{name}` substitution. Substituted text is never rescanned, so
/// braces inside the job posting or résumé pass through untouched. Unknown
/// `{...}` sequences are left as-is.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn render_criteria(definition: &PersonaDefinition) -> String {
    definition
        .criteria
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let mut block = format!("{}. {} (id: {})\n   {}", i + 1, c.title, c.id, c.description.trim());
            for bullet in &c.rubric_bullets {
                block.push_str("\n   - ");
                block.push_str(bullet);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_output_format(definition: &PersonaDefinition) -> String {
    let mut scores = Map::new();
    for id in definition.criterion_ids() {
        scores.insert(
            id.to_string(),
            json!({ "score": 7, "reasoning": "Specific evidence from the resume" }),
        );
    }
    let example = json!({
        "scores": scores,
        "overall_assessment": {
            "persona_score": 7.0,
            "recommendation": "One-sentence hiring recommendation from your perspective"
        }
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}
