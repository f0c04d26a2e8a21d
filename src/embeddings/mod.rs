// Embeddings module
// Ollama integration and source file chunking

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, CodeChunk, chunk_file, chunk_text};
pub use ollama::{EmbeddingError, OllamaClient};
