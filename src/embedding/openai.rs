//! OpenAI-compatible embeddings: `POST {model, input}` → `{data: [{embedding}]}`.

use serde::{Deserialize, Serialize};

use super::{validate_vector, EmbeddingError, EmbeddingProvider, HttpTransport};
use crate::config::EmbeddingConfig;

pub struct OpenAiProvider {
    transport: HttpTransport,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let api_key = Some(config.api_key.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        Self {
            transport: HttpTransport::new(config.timeout()),
            url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Option<Vec<f32>>,
}

fn parse_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let resp: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
    let first = resp
        .data
        .into_iter()
        .next()
        .ok_or_else(|| EmbeddingError::Malformed("response has no data".into()))?;
    let embedding = first
        .embedding
        .ok_or_else(|| EmbeddingError::Malformed("data[0] has no `embedding` field".into()))?;
    validate_vector(embedding)
}

impl EmbeddingProvider for OpenAiProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let req = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let mut request = self.transport.client()?.post(&self.url).json(&req);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body = request.send()?.error_for_status()?.text()?;
        parse_response(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
