/// LLM Client: the single point of entry for inference-server calls.
///
/// ARCHITECTURAL RULE: No other module may talk to the inference server directly.
/// All generate requests MUST go through `InferenceBackend`.
///
/// One call is one `POST /api/generate` with `stream: false` and a JSON-schema
/// `format` constraint. There is no retry here; the orchestrator owns that policy.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{InferenceConfig, MAX_TOKENS, NUM_CTX, REPEAT_PENALTY, TOP_P};

pub mod prompts;
pub mod schema;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on how much of an error body is kept.
const ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference request exceeded its {}s ceiling", .limit.as_secs_f64())]
    Timeout { limit: Duration },

    #[error("Inference server unavailable: {0}")]
    Unavailable(String),

    #[error("Inference server rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Inference server returned a malformed envelope: {0}")]
    Malformed(String),
}

impl InferenceError {
    pub fn code(&self) -> &'static str {
        match self {
            InferenceError::Timeout { .. } => "INFERENCE_TIMEOUT",
            InferenceError::Unavailable(_) => "INFERENCE_UNAVAILABLE",
            InferenceError::Rejected { .. } => "INFERENCE_REJECTED",
            InferenceError::Malformed(_) => "INFERENCE_MALFORMED",
        }
    }

    /// Transient network failures are the only retry candidates.
    pub fn is_transient(&self) -> bool {
        matches!(self, InferenceError::Unavailable(_))
    }
}

/// Per-call model selection and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl From<&InferenceConfig> for CallOptions {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a Value,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    repeat_penalty: f64,
    max_tokens: u32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Anything that can turn a prompt plus output schema into raw model text.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn call(
        &self,
        prompt: &str,
        schema: &Value,
        options: &CallOptions,
    ) -> Result<String, InferenceError>;
}

/// Client for a local Ollama-compatible `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    generate_url: String,
}

impl OllamaClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            generate_url: format!("{}/api/generate", config.base_url),
        })
    }

    async fn exchange(&self, body: &GenerateRequest<'_>) -> Result<String, InferenceError> {
        let response = self
            .client
            .post(&self.generate_url)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Inference server returned {}: {}", status, body);
            return Err(InferenceError::Rejected {
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        let envelope: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                InferenceError::Malformed(e.to_string())
            } else {
                classify(e)
            }
        })?;
        Ok(envelope.response)
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    /// Sends one generate request. The ceiling covers the whole exchange; when
    /// it fires, the in-flight request future is dropped, which closes its socket.
    async fn call(
        &self,
        prompt: &str,
        schema: &Value,
        options: &CallOptions,
    ) -> Result<String, InferenceError> {
        let body = GenerateRequest {
            model: &options.model,
            prompt,
            stream: false,
            format: schema,
            options: GenerateOptions {
                temperature: options.temperature,
                top_p: TOP_P,
                repeat_penalty: REPEAT_PENALTY,
                max_tokens: MAX_TOKENS,
                num_ctx: NUM_CTX,
            },
        };

        let started = Instant::now();
        match tokio::time::timeout(options.timeout, self.exchange(&body)).await {
            Ok(result) => {
                if result.is_ok() {
                    debug!(
                        model = %options.model,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Inference call succeeded"
                    );
                }
                result
            }
            Err(_) => {
                warn!(
                    model = %options.model,
                    limit_ms = options.timeout.as_millis() as u64,
                    "Inference call timed out; connection dropped"
                );
                Err(InferenceError::Timeout {
                    limit: options.timeout,
                })
            }
        }
    }
}

/// Transport failures, including a connect that runs past `CONNECT_TIMEOUT`,
/// are `Unavailable`. `Timeout` is reserved for the per-call ceiling.
fn classify(e: reqwest::Error) -> InferenceError {
    InferenceError::Unavailable(e.to_string())
}
