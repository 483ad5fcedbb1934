// Persona evaluation pipeline.
// Implements: prompt assembly, response parsing, scoring, retry, persistence, orchestration.
// All inference calls go through llm_client::InferenceBackend.

pub mod assembler;
pub mod handlers;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod report;
pub mod retry;
pub mod scoring;

pub use orchestrator::{EvaluationOrchestrator, RunReport};
pub use report::Persister;
pub use retry::RetryPolicy;
