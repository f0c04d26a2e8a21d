// LanceDB vector database module
// Handles vector storage and similarity search for code chunk embeddings

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{CodeStore, StoredMatch};

/// One row of the `code_chunks` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRecord {
    /// Path of the file the chunk came from
    pub filename: String,
    /// The chunk text
    pub text: String,
    /// The embedding (768 dimensions for nomic-embed-text)
    pub vector: Vec<f32>,
}
