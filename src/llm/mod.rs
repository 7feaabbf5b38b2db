pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use models::{ModelReply, Prompt};
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    PromptError(String),
    RateLimited(String),
    Timeout(Duration),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
            LlmError::PromptError(msg) => write!(f, "LLM prompt error: {}", msg),
            LlmError::RateLimited(msg) => write!(f, "LLM provider is rate limiting requests: {}", msg),
            LlmError::Timeout(limit) => {
                write!(f, "LLM did not answer within {}s", limit.as_secs())
            }
        }
    }
}

impl Error for LlmError {}

/// A language-model backend. It only ever turns a prompt into text; it never
/// sees database handles or executes anything.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

pub struct LlmManager {
    generator: Box<dyn SqlGenerator + Send + Sync>,
    timeout: Duration,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn SqlGenerator + Send + Sync> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            generator,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Wraps an already constructed backend.
    pub fn with_generator(generator: Box<dyn SqlGenerator + Send + Sync>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn generate_sql(&self, prompt: &Prompt) -> Result<ModelReply, LlmError> {
        let content = match tokio::time::timeout(self.timeout, self.generator.complete(prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("LLM call exceeded {}s", self.timeout.as_secs());
                return Err(LlmError::Timeout(self.timeout));
            }
        };
        debug!("Raw model reply: {}", content);

        if content.trim().is_empty() {
            return Err(LlmError::ResponseError("Model returned an empty reply".to_string()));
        }
        Ok(ModelReply::parse(&content))
    }
}
