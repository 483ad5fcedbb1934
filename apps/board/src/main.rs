mod config;
mod errors;
mod evaluation;
mod keywords;
mod llm_client;
mod models;
mod personas;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::evaluation::{EvaluationOrchestrator, Persister, RetryPolicy};
use crate::keywords::TokenOverlap;
use crate::llm_client::{CallOptions, OllamaClient};
use crate::personas::PersonaRoster;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (malformed env values abort startup)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("review_board={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting review board v{}", env!("CARGO_PKG_VERSION"));

    // Persona configuration errors are fatal: no run may start with a bad roster
    let roster = PersonaRoster::load(&config.personas_dir).with_context(|| {
        format!(
            "Failed to load persona roster from {}",
            config.personas_dir.display()
        )
    })?;

    // Initialize inference client
    let inference = OllamaClient::new(&config.inference)?;
    info!(
        "Inference client initialized (model: {}, fast_mode: {}, timeout: {}s)",
        config.inference.model,
        config.inference.fast_mode,
        config.inference.timeout.as_secs()
    );

    let orchestrator = EvaluationOrchestrator::new(
        Arc::new(roster),
        Arc::new(inference),
        CallOptions::from(&config.inference),
        Persister::markdown(config.output_dir.clone()),
    )
    .with_retry(RetryPolicy::with_max_retries(config.inference.max_retries))
    // Word-overlap keyword routing by default; embedding similarity plugs in here
    .with_similarity(Arc::new(TokenOverlap));

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
