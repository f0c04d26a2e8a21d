//! Query handling for the `/retrieve` endpoint.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::lancedb::{CodeStore, StoredMatch};
use crate::embeddings::ollama::OllamaClient;
use crate::{RagError, Result};

/// Body sent by the editor's HTTP context provider
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RetrieveRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, rename = "fullInput")]
    pub full_input: String,
}

/// One context item in the `/retrieve` response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContextItem {
    pub name: String,
    pub description: String,
    pub content: String,
}

impl RetrieveRequest {
    /// `query` when it has content, else `fullInput`, else nothing to search for
    #[inline]
    pub fn search_text(&self) -> Option<&str> {
        let text = if self.query.trim().is_empty() {
            self.full_input.as_str()
        } else {
            self.query.as_str()
        };

        (!text.trim().is_empty()).then_some(text)
    }
}

impl ContextItem {
    /// Build an item from a search hit, or `None` when the chunk is blank
    #[inline]
    pub fn from_match(stored: StoredMatch) -> Option<Self> {
        let content = stored.text.trim();
        if content.is_empty() {
            return None;
        }

        Some(Self {
            description: format!("Similarity: {:.2}", stored.distance),
            content: content.to_string(),
            name: stored.filename,
        })
    }
}

/// Embeds queries and looks up the closest stored chunks
#[derive(Debug, Clone)]
pub struct Retriever {
    config: Arc<Config>,
    ollama_client: OllamaClient,
}

impl Retriever {
    #[inline]
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let ollama_client =
            OllamaClient::new(&config).context("Failed to initialize Ollama client")?;

        Ok(Self {
            config: Arc::new(config),
            ollama_client,
        })
    }

    /// Answer one retrieval request.
    ///
    /// A blank request or a failed embedding yields an empty list. Store
    /// errors are returned so the caller can log them.
    #[inline]
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<ContextItem>> {
        debug!(
            "Retrieve request: query={:?}, full_input length={}",
            request.query,
            request.full_input.len()
        );

        let Some(search_text) = request.search_text() else {
            info!("Empty query and fullInput received");
            return Ok(Vec::new());
        };

        let client = self.ollama_client.clone();
        let text = search_text.to_string();
        let embedding = tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .map_err(|e| RagError::Other(anyhow::anyhow!("Embedding task failed: {}", e)))?;

        let query_vector = match embedding {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Failed to get embedding for query: {}", e);
                return Ok(Vec::new());
            }
        };

        let store = CodeStore::open(&self.config).await?;
        let matches = store.search(&query_vector, self.config.server.top_k).await?;

        let items: Vec<ContextItem> = matches
            .into_iter()
            .filter_map(ContextItem::from_match)
            .collect();

        info!("Returning {} context items", items.len());
        for (idx, item) in items.iter().enumerate() {
            debug!("Result {}: {} ({})", idx + 1, item.name, item.description);
        }

        Ok(items)
    }
}
