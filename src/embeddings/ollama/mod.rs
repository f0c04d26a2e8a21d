
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

const EMBEDDINGS_ENDPOINT: &str = "/api/embeddings";
const TAGS_ENDPOINT: &str = "/api/tags";

/// Every way an embedding request can fail to produce a usable vector
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to reach embedding service at {url}: {message}")]
    Transport { url: String, message: String },
    #[error("Embedding service returned HTTP {0}")]
    Status(u16),
    #[error("Malformed embedding response: {0}")]
    Malformed(String),
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid embedding service URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    dimension: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.ollama.model.clone(),
            dimension: config.ollama.embedding_dimension as usize,
            agent: ureq::Agent::new_with_defaults(),
        })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Check that the Ollama server answers on `/api/tags`
    #[inline]
    pub fn ping(&self) -> Result<(), EmbeddingError> {
        let url = self.endpoint(TAGS_ENDPOINT)?;
        debug!("Pinging Ollama server at {}", url);

        self.agent
            .get(url.as_str())
            .call()
            .map_err(|e| map_transport_error(&url, e))?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Embed a single text. Nothing is retried: a failed call is reported to the caller.
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint(EMBEDDINGS_ENDPOINT)?;
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EmbeddingError::Malformed(format!("unserializable request: {}", e)))?;

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| map_transport_error(&url, e))?;

        let status = response.status().as_u16();
        if status != 200 {
            warn!("Ollama returned status {} for embedding request", status);
            return Err(EmbeddingError::Status(status));
        }

        let response_text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| map_transport_error(&url, e))?;

        let embed_response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        let embedding = embed_response.embedding;
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn endpoint(&self, path: &str) -> Result<Url, EmbeddingError> {
        self.base_url
            .join(path)
            .map_err(|e| EmbeddingError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }
}

fn map_transport_error(url: &Url, error: ureq::Error) -> EmbeddingError {
    match error {
        ureq::Error::StatusCode(status) => EmbeddingError::Status(status),
        other => EmbeddingError::Transport {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}
