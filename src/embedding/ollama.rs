//! Ollama embeddings: `POST {model, prompt}` → `{embedding: [...]}`.

use serde::{Deserialize, Serialize};

use super::{validate_vector, EmbeddingError, EmbeddingProvider, HttpTransport};
use crate::config::EmbeddingConfig;

pub struct OllamaProvider {
    transport: HttpTransport,
    url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            transport: HttpTransport::new(config.timeout()),
            url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

fn parse_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let resp: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
    let embedding = resp
        .embedding
        .ok_or_else(|| EmbeddingError::Malformed("response has no `embedding` field".into()))?;
    validate_vector(embedding)
}

impl EmbeddingProvider for OllamaProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let req = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let body = self
            .transport
            .client()?
            .post(&self.url)
            .json(&req)
            .send()?
            .error_for_status()?
            .text()?;

        parse_response(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
