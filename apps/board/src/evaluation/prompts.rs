// Persona evaluation prompt template.
// Placeholders are substituted in a single pass by `assembler::build`.

/// Placeholders every template must contain.
pub const REQUIRED_PLACEHOLDERS: [&str; 4] = [
    "{job_posting}",
    "{resume_json}",
    "{scoring_criteria}",
    "{output_format}",
];

/// Default persona prompt. A persona file may supply its own `prompt_template`
/// as long as it keeps the required placeholders.
///
/// Replace: {persona_name}, {persona_background}, {keyword_context},
///          {job_posting}, {resume_json}, {scoring_criteria},
///          {scoring_instruction}, {output_format}, {json_only_instruction}
pub const PERSONA_PROMPT_TEMPLATE: &str = r#"You are {persona_name}, sitting on a hiring review board.

ABOUT YOU:
{persona_background}

Review the candidate strictly from your own perspective. Other reviewers cover the other perspectives.

{keyword_context}

JOB POSTING:
{job_posting}

CANDIDATE RESUME (JSON):
{resume_json}

SCORING CRITERIA (score every one of them):
{scoring_criteria}

{scoring_instruction}

Return a JSON object with this EXACT shape (criterion ids as keys, no extra fields):
{output_format}

{json_only_instruction}"#;
