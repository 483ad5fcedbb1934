use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::llm_client::InferenceError;
use crate::personas::Persona;

/// Characters kept from each end of raw model output in diagnostics.
const EXCERPT_CHARS: usize = 200;

/// Bounded slice of raw model output attached to parse/schema failures.
/// Model output can be arbitrarily long, so only the two ends are kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Excerpt {
    pub head: String,
    pub tail: String,
    pub total_chars: usize,
}

impl Excerpt {
    pub fn of(raw: &str) -> Self {
        let total_chars = raw.chars().count();
        if total_chars <= EXCERPT_CHARS * 2 {
            return Self {
                head: raw.to_string(),
                tail: String::new(),
                total_chars,
            };
        }

        let head = raw.chars().take(EXCERPT_CHARS).collect();
        let tail = raw.chars().skip(total_chars - EXCERPT_CHARS).collect();
        Self {
            head,
            tail,
            total_chars,
        }
    }
}

/// Failure taxonomy of the evaluation core.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("No persona configuration for '{key}' (looked in {})", .path.display())]
    ConfigNotFound { key: String, path: PathBuf },

    #[error("Persona configuration for '{key}' is malformed: {reason}")]
    ConfigMalformed { key: String, reason: String },

    #[error("Prompt template is missing required placeholder {placeholder}")]
    Template { placeholder: &'static str },

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("Could not extract a JSON object from model output")]
    ParseFailed { excerpt: Excerpt },

    #[error("Model output violates the evaluation schema: {reason}")]
    SchemaViolation { reason: String, excerpt: Excerpt },

    #[error("Cannot compute a persona score from zero criterion scores")]
    EmptyScores,

    #[error("Persona weights sum to {sum}, expected 1.0")]
    WeightSumInvalid { sum: f64 },

    #[error("Invalid evaluation materials: {0}")]
    MaterialsInvalid(String),

    #[error("Failed to persist evaluation artifacts: {0}")]
    Persist(String),
}

impl EvaluationError {
    pub fn code(&self) -> &'static str {
        match self {
            EvaluationError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            EvaluationError::ConfigMalformed { .. } => "CONFIG_MALFORMED",
            EvaluationError::Template { .. } => "TEMPLATE_ERROR",
            EvaluationError::Inference(e) => e.code(),
            EvaluationError::ParseFailed { .. } => "PARSE_FAILED",
            EvaluationError::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            EvaluationError::EmptyScores => "EMPTY_SCORES",
            EvaluationError::WeightSumInvalid { .. } => "WEIGHT_SUM_INVALID",
            EvaluationError::MaterialsInvalid(_) => "MATERIALS_INVALID",
            EvaluationError::Persist(_) => "PERSIST_FAILED",
        }
    }

    pub fn excerpt(&self) -> Option<&Excerpt> {
        match self {
            EvaluationError::ParseFailed { excerpt }
            | EvaluationError::SchemaViolation { excerpt, .. } => Some(excerpt),
            _ => None,
        }
    }
}

/// One persona's failure, kept after the fan-in barrier for reporting.
#[derive(Debug)]
pub struct PersonaFailure {
    pub persona: Persona,
    pub error: EvaluationError,
}

/// Why a whole evaluation run did not produce a `CompositeResult`.
#[derive(Debug, Error)]
pub enum RunFailure {
    /// At least one persona request failed; every sibling result was discarded.
    #[error("Evaluation failed for persona(s): {}", describe_failures(.0))]
    Personas(Vec<PersonaFailure>),

    #[error(transparent)]
    Run(#[from] EvaluationError),
}

fn describe_failures(failures: &[PersonaFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({}: {})", f.persona.key(), f.error.code(), f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Run(#[from] RunFailure),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "code": "NOT_FOUND", "message": msg }),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "code": "VALIDATION_ERROR", "message": msg }),
            ),
            AppError::Run(RunFailure::Personas(failures)) => {
                tracing::error!("Evaluation run failed: {self}");
                let personas: Vec<_> = failures
                    .iter()
                    .map(|f| {
                        json!({
                            "persona": f.persona.key(),
                            "code": f.error.code(),
                            "message": f.error.to_string(),
                            "excerpt": f.error.excerpt(),
                        })
                    })
                    .collect();
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "code": "PERSONA_EVALUATION_FAILED",
                        "message": self.to_string(),
                        "failures": personas,
                    }),
                )
            }
            AppError::Run(RunFailure::Run(e)) => {
                let status = match e {
                    EvaluationError::MaterialsInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => {
                        tracing::error!("Evaluation run failed: {e}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, json!({ "code": e.code(), "message": e.to_string() }))
            }
        };

        (status, Json(json!({ "error": body }))).into_response()
    }
}
