pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Everything a generator needs to produce a candidate query for one
/// question. `prev_invalid_sql` and `prev_error_msg` carry the failure
/// context of a rejected earlier attempt, forwarded from the questions
/// file by the driver.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub question: String,
    pub instructions: String,
    pub schema: String,
    pub prev_invalid_sql: String,
    pub prev_error_msg: String,
}

/// The per-question product of a generator. `error` is empty on success;
/// on failure `query` is empty and `error` holds the classification text.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub query: String,
    pub rationale: String,
    pub error: String,
    pub latency_seconds: f64,
}

/// A candidate-query generator. Implementations hold no mutable state and
/// are safe to share across concurrent evaluation tasks.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome;
}

pub struct GeneratorManager {
    generator: Box<dyn QueryGenerator>,
}

impl GeneratorManager {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self, LlmError> {
        let generator: Box<dyn QueryGenerator> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteGenerator::new(config, timeout)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { generator })
    }
}

#[async_trait]
impl QueryGenerator for GeneratorManager {
    async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        self.generator.generate(request).await
    }
}
