//! Evaluation Orchestrator: drives one run through
//! `LOADING_MATERIALS → DISPATCHING → AGGREGATING → PERSISTING → DONE`.
//!
//! Every persona is dispatched at once on the calling task; the fan-in waits
//! for all of them to settle. One failed persona fails the run, and the
//! sibling results are discarded.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{EvaluationError, PersonaFailure, RunFailure};
use crate::evaluation::report::{PersistedArtifacts, Persister};
use crate::evaluation::retry::RetryPolicy;
use crate::evaluation::{assembler, parser, scoring};
use crate::keywords::{KeywordRouter, KeywordSimilarity, TokenOverlap};
use crate::llm_client::schema::evaluation_schema;
use crate::llm_client::{CallOptions, InferenceBackend, InferenceError};
use crate::models::evaluation::{CompositeResult, PersonaEvaluation};
use crate::models::materials::EvaluationMaterials;
use crate::personas::{PersonaDefinition, PersonaRoster};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    LoadingMaterials,
    Dispatching { in_flight: usize },
    Aggregating,
    Persisting,
    Done,
    Error,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::LoadingMaterials => f.write_str("LOADING_MATERIALS"),
            RunPhase::Dispatching { in_flight } => write!(f, "DISPATCHING({in_flight})"),
            RunPhase::Aggregating => f.write_str("AGGREGATING"),
            RunPhase::Persisting => f.write_str("PERSISTING"),
            RunPhase::Done => f.write_str("DONE"),
            RunPhase::Error => f.write_str("ERROR"),
        }
    }
}

/// Logs each transition of a single run.
struct PhaseTracker {
    run_id: Uuid,
    phase: RunPhase,
    started: Instant,
}

impl PhaseTracker {
    fn start(run_id: Uuid) -> Self {
        info!(%run_id, phase = %RunPhase::LoadingMaterials, "Evaluation run started");
        Self {
            run_id,
            phase: RunPhase::LoadingMaterials,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: RunPhase) {
        info!(
            run_id = %self.run_id,
            from = %self.phase,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Run phase transition"
        );
        self.phase = next;
    }

    fn fail(&mut self, failure: &RunFailure) {
        error!(
            run_id = %self.run_id,
            from = %self.phase,
            to = %RunPhase::Error,
            "Evaluation run failed: {failure}"
        );
        self.phase = RunPhase::Error;
    }
}

/// One persona's fully prepared inference request.
#[derive(Debug)]
pub struct EvaluationRequest<'a> {
    pub definition: &'a PersonaDefinition,
    pub prompt: String,
    pub schema: Value,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub result: CompositeResult,
    pub artifacts: PersistedArtifacts,
}

#[derive(Clone)]
pub struct EvaluationOrchestrator {
    roster: Arc<PersonaRoster>,
    inference: Arc<dyn InferenceBackend>,
    options: CallOptions,
    retry: RetryPolicy,
    router: KeywordRouter<Arc<dyn KeywordSimilarity>>,
    persister: Persister,
}

impl EvaluationOrchestrator {
    pub fn new(
        roster: Arc<PersonaRoster>,
        inference: Arc<dyn InferenceBackend>,
        options: CallOptions,
        persister: Persister,
    ) -> Self {
        Self {
            roster,
            inference,
            options,
            retry: RetryPolicy::none(),
            router: KeywordRouter::new(Arc::new(TokenOverlap)),
            persister,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Swaps the keyword-to-persona similarity backend.
    pub fn with_similarity(mut self, similarity: Arc<dyn KeywordSimilarity>) -> Self {
        self.router = KeywordRouter::new(similarity);
        self
    }

    pub fn roster(&self) -> &PersonaRoster {
        &self.roster
    }

    /// Runs one full evaluation. Either every persona produces a valid
    /// evaluation and artifacts are written, or nothing is.
    pub async fn run(&self, materials: &EvaluationMaterials) -> Result<RunReport, RunFailure> {
        let run_id = Uuid::new_v4();
        let mut tracker = PhaseTracker::start(run_id);
        let outcome = self.drive(run_id, &mut tracker, materials).await;
        if let Err(failure) = &outcome {
            tracker.fail(failure);
        }
        outcome
    }

    async fn drive(
        &self,
        run_id: Uuid,
        tracker: &mut PhaseTracker,
        materials: &EvaluationMaterials,
    ) -> Result<RunReport, RunFailure> {
        materials.validate()?;
        let candidate_name = materials.candidate_name();

        let mut requests = Vec::with_capacity(self.roster.definitions().len());
        let mut failures = Vec::new();
        for definition in self.roster.definitions() {
            match self.prepare(definition, materials) {
                Ok(request) => requests.push(request),
                Err(error) => failures.push(PersonaFailure {
                    persona: definition.key,
                    error,
                }),
            }
        }
        if !failures.is_empty() {
            return Err(RunFailure::Personas(failures));
        }

        tracker.advance(RunPhase::Dispatching {
            in_flight: requests.len(),
        });
        let settled = join_all(requests.iter().map(|request| self.evaluate(run_id, request))).await;

        let mut per_persona = Vec::with_capacity(settled.len());
        for (request, outcome) in requests.iter().zip(settled) {
            match outcome {
                Ok(evaluation) => per_persona.push(evaluation),
                Err(error) => failures.push(PersonaFailure {
                    persona: request.definition.key,
                    error,
                }),
            }
        }
        if !failures.is_empty() {
            warn!(
                %run_id,
                failed = failures.len(),
                discarded = per_persona.len(),
                "Discarding completed persona evaluations after sibling failure"
            );
            return Err(RunFailure::Personas(failures));
        }

        tracker.advance(RunPhase::Aggregating);
        let composite_score = scoring::composite_score(&per_persona, &self.roster.weights())?;
        let result = CompositeResult {
            run_id,
            candidate_name,
            timestamp: Utc::now(),
            model: self.options.model.clone(),
            per_persona,
            composite_score,
        };

        tracker.advance(RunPhase::Persisting);
        let artifacts = self.persister.persist(&result).await?;

        tracker.advance(RunPhase::Done);
        info!(
            %run_id,
            candidate = %result.candidate_name,
            composite_score = result.composite_score,
            "Evaluation run complete"
        );
        Ok(RunReport { result, artifacts })
    }

    /// Keyword selection and prompt assembly for one persona.
    fn prepare<'a>(
        &self,
        definition: &'a PersonaDefinition,
        materials: &EvaluationMaterials,
    ) -> Result<EvaluationRequest<'a>, EvaluationError> {
        let context = self
            .router
            .select_for_persona(&materials.ranked_keywords, definition.key);
        debug!(
            persona = definition.key.key(),
            keywords = context.keywords.len(),
            "Selected focus keywords"
        );
        let prompt = assembler::build(definition, &materials.job_posting, &materials.resume, &context)?;
        Ok(EvaluationRequest {
            definition,
            prompt,
            schema: evaluation_schema(definition),
        })
    }

    /// Dispatch, parse, and score one persona.
    async fn evaluate(
        &self,
        run_id: Uuid,
        request: &EvaluationRequest<'_>,
    ) -> Result<PersonaEvaluation, EvaluationError> {
        let persona = request.definition.key.key();
        let started = Instant::now();
        debug!(%run_id, persona, prompt_chars = request.prompt.len(), "Dispatching persona request");

        let raw = self
            .retry
            .retry(persona, InferenceError::is_transient, || {
                self.inference
                    .call(&request.prompt, &request.schema, &self.options)
            })
            .await
            .map_err(|e| {
                warn!(%run_id, persona, code = e.code(), "Persona request failed: {e}");
                e
            })?;

        let evaluation = parser::parse(&raw, request.definition).map_err(|e| {
            warn!(%run_id, persona, code = e.code(), "Persona response rejected: {e}");
            e
        })?;
        let derived = scoring::persona_score(&evaluation.scores)?;
        scoring::cross_check(&evaluation, derived);

        info!(
            %run_id,
            persona,
            derived_score = derived,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Persona evaluation settled"
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::models::keywords::{Keyword, RankedKeywords};
    use crate::personas::fixtures::roster_definitions;
    use crate::personas::Persona;

    enum Reply {
        Text(String),
        Timeout,
        Unavailable,
        /// `Unavailable` on the first call, then the text.
        FlakyThen(String),
    }

    /// Replies per persona, identified by the prompt's opening line.
    struct ScriptedBackend {
        replies: HashMap<Persona, Reply>,
        prompts: Mutex<HashMap<Persona, String>>,
        flaked: AtomicBool,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(replies: HashMap<Persona, Reply>) -> Self {
            Self {
                replies,
                prompts: Mutex::new(HashMap::new()),
                flaked: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn persona_of(prompt: &str) -> Persona {
            Persona::ALL
                .into_iter()
                .find(|p| prompt.starts_with(&format!("You are {} Reviewer,", p.key())))
                .expect("prompt names a fixture persona")
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn call(
            &self,
            prompt: &str,
            _schema: &Value,
            options: &CallOptions,
        ) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let persona = Self::persona_of(prompt);
            self.prompts
                .lock()
                .unwrap()
                .insert(persona, prompt.to_string());

            match &self.replies[&persona] {
                Reply::Text(text) => Ok(text.clone()),
                Reply::Timeout => Err(InferenceError::Timeout {
                    limit: options.timeout,
                }),
                Reply::Unavailable => Err(InferenceError::Unavailable("connection refused".into())),
                Reply::FlakyThen(text) => {
                    if self.flaked.swap(true, Ordering::SeqCst) {
                        Ok(text.clone())
                    } else {
                        Err(InferenceError::Unavailable("connection reset".into()))
                    }
                }
            }
        }
    }

    fn answer(impact: u8, fit: u8) -> String {
        json!({
            "scores": {
                "impact": {"score": impact, "reasoning": "Quantified delivery wins"},
                "fit": {"score": fit, "reasoning": "Relevant domain"}
            },
            "overall_assessment": {
                "persona_score": (impact + fit) as f64 / 2.0,
                "recommendation": "Advance to onsite"
            }
        })
        .to_string()
    }

    /// Persona means 8.0, 6.0, 7.0, 9.0, 8.5, 6.5 in dispatch order.
    fn board_replies() -> HashMap<Persona, Reply> {
        HashMap::from([
            (Persona::Hr, Reply::Text(answer(8, 8))),
            (
                Persona::Technical,
                Reply::Text(format!("<think>weighing the stack</think>\n{}", answer(6, 6))),
            ),
            (
                Persona::Design,
                Reply::Text(format!("Here you go:\n```json\n{}\n```", answer(7, 7))),
            ),
            (Persona::Finance, Reply::Text(answer(9, 9))),
            (Persona::Ceo, Reply::Text(answer(8, 9))),
            (Persona::Team, Reply::Text(answer(6, 7))),
        ])
    }

    fn materials() -> EvaluationMaterials {
        EvaluationMaterials {
            candidate_name: None,
            job_posting: "Staff Engineer, distributed systems".to_string(),
            resume: json!({"name": "Ada Lovelace", "experience": []}),
            ranked_keywords: RankedKeywords {
                knockout_requirements: vec![],
                skills_ranked: vec![Keyword {
                    kw: "distributed systems".to_string(),
                    score: Some(0.92),
                    extra: Default::default(),
                }],
                metadata: None,
            },
        }
    }

    fn orchestrator(backend: Arc<ScriptedBackend>, output_dir: &std::path::Path) -> EvaluationOrchestrator {
        let roster = PersonaRoster::from_definitions(roster_definitions()).unwrap();
        EvaluationOrchestrator::new(
            Arc::new(roster),
            backend,
            CallOptions {
                model: "qwen3:8b".to_string(),
                temperature: 0.3,
                timeout: Duration::from_secs(5),
            },
            Persister::markdown(output_dir.to_path_buf()),
        )
    }

    fn written_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_full_board_produces_weighted_composite() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(board_replies()));
        let report = orchestrator(backend.clone(), dir.path())
            .run(&materials())
            .await
            .unwrap();

        let result = &report.result;
        assert!((result.composite_score - 7.7).abs() < 1e-9, "got {}", result.composite_score);
        assert_eq!(result.candidate_name, "Ada Lovelace");
        assert_eq!(result.model, "qwen3:8b");
        assert_eq!(
            result.per_persona.iter().map(|e| e.persona_key).collect::<Vec<_>>(),
            Persona::ALL.to_vec()
        );
        assert!(report.artifacts.raw_results.exists());
        assert!(report.artifacts.summary.as_ref().unwrap().exists());
    }

    #[tokio::test]
    async fn test_all_personas_are_in_flight_together() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(board_replies()));
        orchestrator(backend.clone(), dir.path())
            .run(&materials())
            .await
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
        assert_eq!(backend.peak.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_focus_keywords_reach_only_their_persona() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(board_replies()));
        orchestrator(backend.clone(), dir.path())
            .run(&materials())
            .await
            .unwrap();

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[&Persona::Technical].contains("PRIORITY FOCUS AREAS"));
        assert!(prompts[&Persona::Technical].contains("- distributed systems"));
        assert!(!prompts[&Persona::Finance].contains("PRIORITY FOCUS AREAS"));
    }

    /// Routes every keyword to the first persona in dispatch order.
    struct FirstPersonaWins;

    impl KeywordSimilarity for FirstPersonaWins {
        fn similarity(&self, _keyword: &str, _indicators: &[&str]) -> f64 {
            1.0
        }
    }

    #[tokio::test]
    async fn test_similarity_backend_is_swappable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(board_replies()));
        orchestrator(backend.clone(), dir.path())
            .with_similarity(Arc::new(FirstPersonaWins))
            .run(&materials())
            .await
            .unwrap();

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[&Persona::Hr].contains("- distributed systems"));
        assert!(!prompts[&Persona::Technical].contains("PRIORITY FOCUS AREAS"));
    }

    #[tokio::test]
    async fn test_single_parse_failure_fails_run_and_names_persona() {
        let dir = tempfile::tempdir().unwrap();
        let mut replies = board_replies();
        replies.insert(
            Persona::Technical,
            Reply::Text("I would rather not score this one.".to_string()),
        );
        let backend = Arc::new(ScriptedBackend::new(replies));
        let err = orchestrator(backend.clone(), dir.path())
            .run(&materials())
            .await
            .unwrap_err();

        let RunFailure::Personas(failures) = err else {
            panic!("expected persona failure, got {err:?}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].persona, Persona::Technical);
        assert_eq!(failures[0].error.code(), "PARSE_FAILED");
        assert!(failures[0].error.excerpt().unwrap().head.contains("rather not"));
        // The five good evaluations still ran, but nothing was persisted.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
        assert_eq!(written_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_every_failed_persona_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut replies = board_replies();
        replies.insert(Persona::Hr, Reply::Timeout);
        replies.insert(Persona::Team, Reply::Unavailable);
        replies.insert(
            Persona::Ceo,
            Reply::Text(answer(8, 9).replace(r#""score":8"#, r#""score":11"#)),
        );
        let backend = Arc::new(ScriptedBackend::new(replies));
        let err = orchestrator(backend, dir.path())
            .run(&materials())
            .await
            .unwrap_err();

        let RunFailure::Personas(failures) = err else {
            panic!("expected persona failures, got {err:?}");
        };
        let tagged: Vec<_> = failures.iter().map(|f| (f.persona, f.error.code())).collect();
        assert_eq!(
            tagged,
            vec![
                (Persona::Hr, "INFERENCE_TIMEOUT"),
                (Persona::Ceo, "SCHEMA_VIOLATION"),
                (Persona::Team, "INFERENCE_UNAVAILABLE"),
            ]
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut replies = board_replies();
        replies.insert(Persona::Finance, Reply::FlakyThen(answer(9, 9)));
        let backend = Arc::new(ScriptedBackend::new(replies));
        let report = orchestrator(backend.clone(), dir.path())
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1)))
            .run(&materials())
            .await
            .unwrap();

        assert!((report.result.composite_score - 7.7).abs() < 1e-9);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_transient_failure_is_not_retried_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut replies = board_replies();
        replies.insert(Persona::Finance, Reply::FlakyThen(answer(9, 9)));
        let backend = Arc::new(ScriptedBackend::new(replies));
        let err = orchestrator(backend.clone(), dir.path())
            .run(&materials())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("finance"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_invalid_materials_never_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(board_replies()));
        let mut bad = materials();
        bad.job_posting = String::new();
        let err = orchestrator(backend.clone(), dir.path())
            .run(&bad)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunFailure::Run(EvaluationError::MaterialsInvalid(_))
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_broken_template_fails_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut definitions = roster_definitions();
        definitions[4].prompt_template = Some("You are {persona_name}, {job_posting}".to_string());
        let roster = PersonaRoster::from_definitions(definitions).unwrap();
        let backend = Arc::new(ScriptedBackend::new(board_replies()));
        let orchestrator = EvaluationOrchestrator {
            roster: Arc::new(roster),
            ..orchestrator(backend.clone(), dir.path())
        };

        let err = orchestrator.run(&materials()).await.unwrap_err();
        let RunFailure::Personas(failures) = err else {
            panic!("expected persona failure, got {err:?}");
        };
        assert_eq!(failures[0].persona, Persona::Ceo);
        assert_eq!(failures[0].error.code(), "TEMPLATE_ERROR");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
