// Diagnostics module
// Read-only database inspection and an end-to-end smoke test of the running system


use std::time::Duration;

use console::style;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::database::lancedb::CodeStore;
use crate::embeddings::chunking::CodeChunk;
use crate::embeddings::ollama::OllamaClient;
use crate::server::ContextItem;
use crate::{RagError, Result};

const SERVER_CHECK_TIMEOUT_SECONDS: u64 = 30;
const PREVIEW_CHARS: usize = 200;

/// What `inspect` found in the vector store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseReport {
    pub total_chunks: usize,
    /// Distinct filenames with their chunk counts, sorted by filename
    pub files: Vec<(String, usize)>,
    pub sample: Option<CodeChunk>,
}

/// Pass/fail per smoke test check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmokeReport {
    pub database_ok: bool,
    pub embedding_service_ok: bool,
    pub server_ok: bool,
}

impl SmokeReport {
    #[inline]
    pub fn all_passed(&self) -> bool {
        self.database_ok && self.embedding_service_ok && self.server_ok
    }
}

/// Gather row count, per-file chunk counts and one sample record
#[inline]
pub async fn collect_database_report(config: &Config) -> Result<DatabaseReport> {
    let store = CodeStore::open(config).await?;

    Ok(DatabaseReport {
        total_chunks: store.count_rows().await?,
        files: store.file_chunk_counts().await?,
        sample: store.sample_chunk().await?,
    })
}

/// Print the contents of the vector store. Failures are printed, not returned.
#[inline]
pub async fn inspect_database(config: &Config) -> Option<DatabaseReport> {
    let report = match collect_database_report(config).await {
        Ok(report) => report,
        Err(e) => {
            print_store_error(&e);
            return None;
        }
    };

    println!();
    println!("{}", style("=== Database Statistics ===").bold().cyan());
    println!("Total chunks: {}", report.total_chunks);

    println!();
    println!("{}", style("=== Files in Database ===").bold().cyan());
    for (filename, count) in &report.files {
        println!("- {}: {} chunks", filename, count);
    }

    println!();
    println!("{}", style("=== Sample Content ===").bold().cyan());
    match &report.sample {
        Some(sample) => {
            println!("Sample from {}:", style(&sample.filename).yellow());
            println!("Content preview: {}...", preview(&sample.text, PREVIEW_CHARS));
        }
        None => println!("{}", style("The table is empty").dim()),
    }

    Some(report)
}

/// Check that the store exists and report how many chunks it holds
#[inline]
pub async fn check_database(config: &Config) -> bool {
    println!();
    println!("{}", style("=== Testing Database ===").bold().cyan());

    let store = match CodeStore::open(config).await {
        Ok(store) => store,
        Err(e) => {
            print_store_error(&e);
            return false;
        }
    };

    match store.count_rows().await {
        Ok(count) => {
            println!(
                "{}",
                style(format!("✓ Database exists and contains {} chunks", count)).green()
            );
            true
        }
        Err(e) => {
            println!(
                "{}",
                style(format!("✗ Error accessing database: {}", e)).red()
            );
            false
        }
    }
}

/// Check that Ollama answers
#[inline]
pub async fn check_embedding_service(config: &Config) -> bool {
    println!();
    println!("{}", style("=== Testing Embedding Service ===").bold().cyan());

    let client = match OllamaClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            println!("{}", style(format!("✗ {:#}", e)).red());
            return false;
        }
    };

    let url = client.base_url().to_string();
    let outcome = tokio::task::spawn_blocking(move || client.ping()).await;
    match outcome {
        Ok(Ok(())) => {
            println!(
                "{}",
                style(format!("✓ Ollama is reachable at {}", url)).green()
            );
            true
        }
        Ok(Err(e)) => {
            println!("{}", style(format!("✗ {}", e)).red());
            false
        }
        Err(e) => {
            warn!("Embedding service check panicked: {}", e);
            false
        }
    }
}

/// Check that the retrieval server is up and answers a live `/retrieve` call
#[inline]
pub async fn check_server(config: &Config) -> bool {
    println!();
    println!("{}", style("=== Testing Server ===").bold().cyan());

    let base_url = match config.server.client_url() {
        Ok(url) => url,
        Err(e) => {
            println!("{}", style(format!("✗ {}", e)).red());
            return false;
        }
    };

    match tokio::task::spawn_blocking(move || probe_server(&base_url)).await {
        Ok(Ok(items)) => {
            println!(
                "{}",
                style(format!("✓ Server responded with {} results", items.len())).green()
            );
            if let Some(first) = items.first() {
                println!("Sample result:");
                println!("  File: {}", first.name);
                println!("  Content: {}...", preview(&first.content, 100));
            }
            true
        }
        Ok(Err(message)) => {
            println!("{}", style(format!("✗ {}", message)).red());
            false
        }
        Err(e) => {
            warn!("Server check panicked: {}", e);
            false
        }
    }
}

/// Run every check and print a summary with remediation hints
#[inline]
pub async fn smoke_test(config: &Config) -> SmokeReport {
    println!("{}", style("=== Testing Code Search System ===").bold());

    let report = SmokeReport {
        database_ok: check_database(config).await,
        embedding_service_ok: check_embedding_service(config).await,
        server_ok: check_server(config).await,
    };

    println!();
    println!("{}", style("=== Summary ===").bold().cyan());
    if report.all_passed() {
        println!(
            "{}",
            style("✓ All tests passed! Your system is working correctly.").green()
        );
        println!("The /retrieve endpoint is ready for your editor's HTTP context provider.");
    } else {
        println!(
            "{}",
            style("✗ Some tests failed. Please check the errors above.").red()
        );
        if !report.database_ok {
            println!("  - Try running 'code-rag index' to rebuild the database");
        }
        if !report.embedding_service_ok {
            println!(
                "  - Make sure Ollama is running and '{}' is pulled",
                config.ollama.model
            );
        }
        if !report.server_ok {
            println!("  - Try running 'code-rag serve' to start the server");
        }
    }

    report
}

fn print_store_error(error: &RagError) {
    match error {
        RagError::DatabaseMissing(path) => {
            println!(
                "{}",
                style(format!("✗ Database not found at {}", path.display())).red()
            );
            println!("  Run 'code-rag index' to create it.");
        }
        RagError::TableMissing(table) => {
            println!(
                "{}",
                style(format!("✗ Table '{}' not found in database", table)).red()
            );
            println!("  Run 'code-rag index' to create it.");
        }
        other => println!(
            "{}",
            style(format!("✗ Error inspecting database: {}", other)).red()
        ),
    }
}

fn probe_server(base_url: &Url) -> std::result::Result<Vec<ContextItem>, String> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(SERVER_CHECK_TIMEOUT_SECONDS)))
        .build()
        .into();

    let health_url = base_url
        .join("/health")
        .map_err(|e| format!("Invalid server URL: {}", e))?;
    debug!("Probing {}", health_url);

    match agent.get(health_url.as_str()).call() {
        Ok(_) => println!("{}", style("✓ Server is running (health check passed)").green()),
        Err(ureq::Error::StatusCode(status)) => {
            return Err(format!("Server returned status code {}", status));
        }
        Err(e) => {
            debug!("Health check failed: {}", e);
            return Err("Could not connect to server. Is it running?".to_string());
        }
    }

    let retrieve_url = base_url
        .join("/retrieve")
        .map_err(|e| format!("Invalid server URL: {}", e))?;
    let body = serde_json::json!({"query": "test query", "fullInput": "test input"}).to_string();

    let response_text = agent
        .post(retrieve_url.as_str())
        .header("Content-Type", "application/json")
        .send(&body)
        .and_then(|mut resp| resp.body_mut().read_to_string())
        .map_err(|e| match e {
            ureq::Error::StatusCode(status) => format!("Server returned status code {}", status),
            other => format!("Error testing retrieve endpoint: {}", other),
        })?;

    serde_json::from_str(&response_text)
        .map_err(|e| format!("Retrieve endpoint returned malformed JSON: {}", e))
}

/// First `max_chars` characters of `text`
fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
