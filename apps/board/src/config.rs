use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen3:8b";
const DEFAULT_FAST_MODEL: &str = "llama3.2:3b";

/// Nucleus sampling cutoff sent with every generate request.
pub const TOP_P: f64 = 0.9;
pub const REPEAT_PENALTY: f64 = 1.1;
pub const MAX_TOKENS: u32 = 2048;
/// Context window requested from the inference server.
pub const NUM_CTX: u32 = 8192;

/// Sampling/timeout defaults for one model class.
///
/// Smaller models answer faster, so the fast profile gets the shorter ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    pub temperature: f64,
    pub timeout: Duration,
}

impl ModelProfile {
    pub const STANDARD: ModelProfile = ModelProfile {
        temperature: 0.3,
        timeout: Duration::from_secs(600),
    };

    pub const FAST: ModelProfile = ModelProfile {
        temperature: 0.1,
        timeout: Duration::from_secs(300),
    };
}

/// Everything the inference client needs, resolved once at startup and
/// handed to its constructor.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
    pub fast_mode: bool,
    /// Extra attempts for `INFERENCE_UNAVAILABLE` only. Zero keeps runs single-shot.
    pub max_retries: u32,
}

impl InferenceConfig {
    /// Picks the model and profile for the requested mode, then applies overrides.
    /// The request contract is identical for both modes; only these values move.
    pub fn resolve(
        base_url: String,
        standard_model: String,
        fast_model: String,
        fast_mode: bool,
        temperature_override: Option<f64>,
        timeout_override: Option<Duration>,
        max_retries: u32,
    ) -> Self {
        let (model, profile) = if fast_mode {
            (fast_model, ModelProfile::FAST)
        } else {
            (standard_model, ModelProfile::STANDARD)
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature: temperature_override.unwrap_or(profile.temperature),
            timeout: timeout_override.unwrap_or(profile.timeout),
            fast_mode,
            max_retries,
        }
    }
}

/// Application configuration loaded from environment variables.
/// Malformed values fail startup; everything else has a local-first default.
#[derive(Debug, Clone)]
pub struct Config {
    pub inference: InferenceConfig,
    pub personas_dir: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let fast_mode = parse_env::<bool>("BOARD_FAST_MODE")?.unwrap_or(false);
        let temperature = parse_env::<f64>("BOARD_TEMPERATURE")?;
        let timeout = parse_env::<u64>("BOARD_TIMEOUT_SECS")?.map(Duration::from_secs);
        let max_retries = parse_env::<u32>("BOARD_INFERENCE_RETRIES")?.unwrap_or(0);

        let inference = InferenceConfig::resolve(
            env_or("OLLAMA_BASE_URL", DEFAULT_BASE_URL),
            env_or("BOARD_MODEL", DEFAULT_MODEL),
            env_or("BOARD_FAST_MODEL", DEFAULT_FAST_MODEL),
            fast_mode,
            temperature,
            timeout,
            max_retries,
        );

        Ok(Config {
            inference,
            personas_dir: PathBuf::from(env_or("PERSONAS_DIR", "personas")),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "output")),
            port: parse_env::<u16>("PORT")?.unwrap_or(8080),
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        _ => Ok(None),
    }
}
