
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// A contiguous run of lines from one source file, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChunk {
    /// Path of the source file, as seen by the directory walk
    pub filename: String,
    /// The chunk text, lines joined with `\n`
    pub text: String,
}

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters. A single longer line still forms one chunk.
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

/// Split text into chunks along line boundaries.
///
/// Lines are accumulated until adding the next one would push the character
/// count (newlines excluded) past `max_chunk_size`. Joining the returned
/// chunks with `\n` yields `content` again.
#[inline]
pub fn chunk_text(content: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;

    for line in content.split('\n') {
        let line_size = line.chars().count();
        if current_size + line_size > max_chunk_size && !current.is_empty() {
            chunks.push(current.join("\n"));
            current.clear();
            current_size = 0;
        }
        current.push(line);
        current_size += line_size;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}

/// Read a file and chunk it.
///
/// Files that are not valid UTF-8 are treated as binary and yield no chunks.
#[inline]
pub fn chunk_file(path: &Path, config: &ChunkingConfig) -> Result<Vec<CodeChunk>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let Ok(content) = String::from_utf8(bytes) else {
        info!("Skipping binary file: {}", path.display());
        return Ok(Vec::new());
    };

    let filename = path.to_string_lossy().into_owned();
    let chunks: Vec<CodeChunk> = chunk_text(&content, config.max_chunk_size)
        .into_iter()
        .map(|text| CodeChunk {
            filename: filename.clone(),
            text,
        })
        .collect();

    debug!("Chunked {} into {} chunks", filename, chunks.len());
    Ok(chunks)
}
