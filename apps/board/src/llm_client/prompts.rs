// Shared prompt fragments used by every persona prompt.
// Persona-specific template text lives in evaluation::prompts.

/// Output discipline appended to all evaluation prompts.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Scoring discipline: integers only, no clamping by the model either.
pub const SCORING_INSTRUCTION: &str = "\
    Every criterion score MUST be a whole number from 1 to 10 (no decimals). \
    Keep each reasoning under 300 characters and cite concrete evidence from the resume. \
    persona_score is your overall view from 1.0 to 10.0. \
    Keep the recommendation under 200 characters.";
