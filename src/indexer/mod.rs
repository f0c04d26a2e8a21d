// Indexer module
// Walks a source tree, chunks each eligible file, embeds every chunk and appends it to LanceDB


use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::lancedb::{CodeRecord, CodeStore};
use crate::embeddings::chunking::{CodeChunk, chunk_file};
use crate::embeddings::ollama::{EmbeddingError, OllamaClient};

/// Indexes a codebase into the vector store, one file and one chunk at a time
pub struct Indexer {
    config: Config,
    store: CodeStore,
    ollama_client: OllamaClient,
}

/// Counters reported at the end of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    /// Eligible files visited, including ones that turned out to be binary
    pub files_processed: usize,
    /// Eligible files that produced no chunks (binary or unreadable)
    pub files_skipped: usize,
    /// Chunks produced by the chunker, whether or not they were stored
    pub chunks_created: usize,
    /// Chunks embedded and written to the store
    pub chunks_stored: usize,
    /// Chunks dropped because no embedding could be produced
    pub chunks_skipped: usize,
}

/// Whether any ignore pattern occurs anywhere in `path`
#[inline]
pub fn is_ignored(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| path.contains(pattern.as_str()))
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

impl Indexer {
    /// Create an indexer, opening (or creating) the vector store
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let store = CodeStore::open_or_create(&config)
            .await
            .context("Failed to initialize LanceDB vector store")?;

        let ollama_client =
            OllamaClient::new(&config).context("Failed to initialize Ollama client")?;

        Ok(Self {
            config,
            store,
            ollama_client,
        })
    }

    #[inline]
    pub fn store(&self) -> &CodeStore {
        &self.store
    }

    /// List the files under `root` that would be indexed, in walk order
    #[inline]
    pub fn discover_files(&self, root: &Path) -> Vec<PathBuf> {
        let patterns = self.config.ignore_patterns();
        let filter_patterns = patterns.clone();
        let filter_root = root.to_path_buf();

        // Patterns are matched against paths relative to the root
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                !is_ignored(&relative_path(&filter_root, entry.path()), &filter_patterns)
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            if is_ignored(&relative_path(root, path), &patterns) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if self.config.indexing.is_indexable(&file_name) {
                files.push(path.to_path_buf());
            }
        }

        files
    }

    /// Index every eligible file under `root`.
    ///
    /// Chunks whose embedding fails are dropped and counted in
    /// [`IndexingStats::chunks_skipped`]. A failed write to the store aborts the run.
    #[inline]
    pub async fn index_codebase(&self, root: &Path) -> Result<IndexingStats> {
        info!("Indexing codebase in {}", root.display());

        let files = self.discover_files(root);
        let mut stats = IndexingStats::default();

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(files.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        for path in &files {
            bar.set_message(path.display().to_string());
            self.index_file(path, &mut stats).await?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "Indexing complete: {} files, {} chunks created, {} stored, {} skipped",
            stats.files_processed, stats.chunks_created, stats.chunks_stored, stats.chunks_skipped
        );
        Ok(stats)
    }

    async fn index_file(&self, path: &Path, stats: &mut IndexingStats) -> Result<()> {
        info!("Processing {}", path.display());
        stats.files_processed += 1;

        let chunks = match chunk_file(path, &self.config.chunking) {
            Ok(chunks) if chunks.is_empty() => {
                stats.files_skipped += 1;
                return Ok(());
            }
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                stats.files_skipped += 1;
                return Ok(());
            }
        };

        for chunk in chunks {
            stats.chunks_created += 1;

            let vector = match self.embed(&chunk.text).await? {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(
                        "Dropping chunk {} from {}: {}",
                        stats.chunks_created, chunk.filename, e
                    );
                    stats.chunks_skipped += 1;
                    continue;
                }
            };

            let CodeChunk { filename, text } = chunk;
            self.store
                .add_record(CodeRecord {
                    filename,
                    text,
                    vector,
                })
                .await
                .with_context(|| format!("Failed to store chunk from {}", path.display()))?;

            stats.chunks_stored += 1;
            debug!(
                "Added chunk {} from {}",
                stats.chunks_created,
                path.display()
            );
        }

        Ok(())
    }

    /// Run the blocking HTTP call off the async executor
    async fn embed(&self, text: &str) -> Result<Result<Vec<f32>, EmbeddingError>> {
        let client = self.ollama_client.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .context("Embedding task panicked")
    }
}
