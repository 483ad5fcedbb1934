use std::sync::Arc;

use crate::evaluation::EvaluationOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the loaded persona roster and the inference backend.
    pub orchestrator: Arc<EvaluationOrchestrator>,
}
