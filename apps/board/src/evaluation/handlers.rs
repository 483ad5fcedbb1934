//! Axum route handlers for the Evaluation API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::evaluation::RunReport;
use crate::models::materials::EvaluationMaterials;
use crate::personas::{Criterion, Persona, PersonaDefinition};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PersonaSummary {
    pub key: Persona,
    pub name: String,
    pub weight: f64,
    pub criteria: Vec<String>,
}

impl From<&PersonaDefinition> for PersonaSummary {
    fn from(definition: &PersonaDefinition) -> Self {
        Self {
            key: definition.key,
            name: definition.name.clone(),
            weight: definition.weight,
            criteria: definition.criterion_ids().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PersonaDetail {
    #[serde(flatten)]
    pub summary: PersonaSummary,
    pub background: String,
    pub criteria_detail: Vec<Criterion>,
    pub custom_template: bool,
}

#[derive(Debug, Serialize)]
pub struct PersonasResponse {
    pub personas: Vec<PersonaSummary>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/personas
///
/// Returns the loaded review board in dispatch order.
pub async fn handle_list_personas(State(state): State<AppState>) -> Json<PersonasResponse> {
    let personas = state
        .orchestrator
        .roster()
        .definitions()
        .iter()
        .map(PersonaSummary::from)
        .collect();
    Json(PersonasResponse { personas })
}

/// GET /api/v1/personas/:key
///
/// Returns one persona's full rubric. Keys outside the board are 404.
pub async fn handle_get_persona(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PersonaDetail>, AppError> {
    let definition = key
        .parse::<Persona>()
        .ok()
        .and_then(|persona| state.orchestrator.roster().get(persona))
        .ok_or_else(|| AppError::NotFound(format!("Persona '{key}' is not on the board")))?;

    Ok(Json(PersonaDetail {
        summary: PersonaSummary::from(definition),
        background: definition.background.clone(),
        criteria_detail: definition.criteria.clone(),
        custom_template: definition.prompt_template.is_some(),
    }))
}

/// POST /api/v1/evaluations
///
/// Runs every persona against the submitted materials and returns the
/// composite result plus the paths of the persisted artifacts.
/// Any persona failure fails the whole request.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    payload: Result<Json<EvaluationMaterials>, JsonRejection>,
) -> Result<Json<RunReport>, AppError> {
    let Json(materials) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let report = state.orchestrator.run(&materials).await?;
    Ok(Json(report))
}
