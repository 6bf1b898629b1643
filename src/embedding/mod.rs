//! Text-to-vector embedding over HTTP.
//!
//! Provides the [`EmbeddingProvider`] trait and two wire shapes: Ollama's
//! prompt/single-vector API and the OpenAI-compatible input/list API. The provider is
//! created via [`create_provider`] from configuration; the shape is never guessed.

pub mod ollama;
pub mod openai;

use std::sync::OnceLock;
use std::time::Duration;

use crate::config::{EmbeddingBackend, EmbeddingConfig};

/// Why an embedding request produced no vector.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("embedding request timed out")]
    Timeout,
    #[error("embedding endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Request(e)
        }
    }
}

/// Trait for embedding text into vectors.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Identifier recorded next to every stored vector.
    fn model_name(&self) -> &str;
}

/// Create an embedding provider from config.
pub fn create_provider(config: &EmbeddingConfig) -> Box<dyn EmbeddingProvider> {
    match config.provider {
        EmbeddingBackend::Ollama => Box::new(ollama::OllamaProvider::new(config)),
        EmbeddingBackend::OpenAi => Box::new(openai::OpenAiProvider::new(config)),
    }
}

/// Blocking HTTP client shared by both wire shapes.
///
/// The client is built on first use so that construction never happens on an
/// async runtime thread.
pub(crate) struct HttpTransport {
    client: OnceLock<reqwest::blocking::Client>,
    timeout: Duration,
}

impl HttpTransport {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            client: OnceLock::new(),
            timeout,
        }
    }

    pub(crate) fn client(&self) -> Result<&reqwest::blocking::Client, EmbeddingError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(EmbeddingError::Request)?;
        Ok(self.client.get_or_init(|| built))
    }
}

/// Reject empty vectors and non-finite components.
pub(crate) fn validate_vector(vector: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::Malformed("empty embedding vector".into()));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::Malformed(
            "embedding contains non-finite values".into(),
        ));
    }
    Ok(vector)
}
