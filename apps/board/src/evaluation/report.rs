//! Artifact persistence: the raw results JSON plus a human-readable summary
//! produced by a pluggable renderer.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::EvaluationError;
use crate::evaluation::scoring::persona_score;
use crate::models::evaluation::{CompositeResult, RawResultsArtifact};

const FALLBACK_SLUG: &str = "candidate";

/// Renders the human-readable summary next to the raw results file.
#[async_trait]
pub trait SummaryRenderer: Send + Sync {
    /// `raw_results` is the already-written JSON artifact. Returns the path
    /// of the summary, or `None` when the renderer produced nothing.
    async fn render(
        &self,
        result: &CompositeResult,
        raw_results: &Path,
    ) -> Result<Option<PathBuf>, EvaluationError>;
}

/// Writes a Markdown summary with the same basename as the raw results.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownSummaryRenderer;

#[async_trait]
impl SummaryRenderer for MarkdownSummaryRenderer {
    async fn render(
        &self,
        result: &CompositeResult,
        raw_results: &Path,
    ) -> Result<Option<PathBuf>, EvaluationError> {
        let path = raw_results.with_extension("md");
        write_file(&path, markdown(result).as_bytes()).await?;
        Ok(Some(path))
    }
}

pub fn markdown(result: &CompositeResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Hiring Review Board: {}\n", result.candidate_name);
    let _ = writeln!(out, "- **Composite score:** {:.2} / 10", result.composite_score);
    let _ = writeln!(out, "- **Model:** {}", result.model);
    let _ = writeln!(out, "- **Evaluated:** {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "- **Run:** {}\n", result.run_id);

    out.push_str("| Persona | Score | Recommendation |\n|---|---|---|\n");
    for evaluation in &result.per_persona {
        let score = persona_score(&evaluation.scores)
            .map(|s| format!("{s:.2}"))
            .unwrap_or_else(|_| "n/a".to_string());
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            evaluation.persona,
            score,
            table_cell(&evaluation.overall_assessment.recommendation)
        );
    }

    for evaluation in &result.per_persona {
        let _ = writeln!(out, "\n## {}\n", evaluation.persona);
        for (id, criterion) in &evaluation.scores {
            let _ = writeln!(out, "- **{id}** ({}/10): {}", criterion.score, criterion.reasoning);
        }
    }
    out
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Paths written for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedArtifacts {
    pub raw_results: PathBuf,
    pub summary: Option<PathBuf>,
}

/// Owns the output directory and the summary renderer.
#[derive(Clone)]
pub struct Persister {
    output_dir: PathBuf,
    renderer: Arc<dyn SummaryRenderer>,
}

impl Persister {
    pub fn new(output_dir: PathBuf, renderer: Arc<dyn SummaryRenderer>) -> Self {
        Self {
            output_dir,
            renderer,
        }
    }

    pub fn markdown(output_dir: PathBuf) -> Self {
        Self::new(output_dir, Arc::new(MarkdownSummaryRenderer))
    }

    /// Writes the raw results artifact, then hands the result to the renderer.
    /// A failed render removes the raw results again, so a run leaves either
    /// both artifacts or neither.
    pub async fn persist(&self, result: &CompositeResult) -> Result<PersistedArtifacts, EvaluationError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| persist_error(&self.output_dir, e))?;

        let raw_results = self.output_dir.join(artifact_file_name(result));
        let body = serde_json::to_vec_pretty(&RawResultsArtifact::from(result))
            .map_err(|e| EvaluationError::Persist(e.to_string()))?;
        write_file(&raw_results, &body).await?;

        let summary = match self.renderer.render(result, &raw_results).await {
            Ok(summary) => summary,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&raw_results).await {
                    warn!(
                        raw_results = %raw_results.display(),
                        "Could not remove raw results after failed render: {cleanup}"
                    );
                }
                return Err(e);
            }
        };

        info!(
            run_id = %result.run_id,
            raw_results = %raw_results.display(),
            "Persisted evaluation artifacts"
        );
        Ok(PersistedArtifacts {
            raw_results,
            summary,
        })
    }
}

/// `evaluation_<slug>_<YYYYmmdd_HHMMSS>_<run8>.json`
pub fn artifact_file_name(result: &CompositeResult) -> String {
    let run = result.run_id.simple().to_string();
    format!(
        "evaluation_{}_{}_{}.json",
        slug(&result.candidate_name),
        result.timestamp.format("%Y%m%d_%H%M%S"),
        &run[..8]
    )
}

/// Lowercase ASCII alphanumerics joined by single underscores.
pub fn slug(name: &str) -> String {
    let joined = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    if joined.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        joined
    }
}

async fn write_file(path: &Path, body: &[u8]) -> Result<(), EvaluationError> {
    tokio::fs::write(path, body)
        .await
        .map_err(|e| persist_error(path, e))
}

fn persist_error(path: &Path, e: std::io::Error) -> EvaluationError {
    EvaluationError::Persist(format!("{}: {e}", path.display()))
}
