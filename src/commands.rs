use anyhow::{Context, Result, bail};
use console::style;
use std::path::Path;
use tracing::info;

use crate::config::{CONFIG_FILE_NAME, Config, show_config};
use crate::indexer::{Indexer, IndexingStats};
use crate::server;

/// Walk `root`, embed every chunk and append it to the vector store
#[inline]
pub async fn index_directory(config: Config, root: &Path) -> Result<IndexingStats> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    config.validate().context("Invalid configuration")?;

    info!("Indexing codebase at {}", root.display());
    println!("Indexing {} ...", style(root.display()).cyan());

    let indexer = Indexer::new(config)
        .await
        .context("Failed to initialize indexer")?;
    let stats = indexer
        .index_codebase(root)
        .await
        .context("Indexing failed")?;

    print_index_summary(&stats, indexer.store().path());
    Ok(stats)
}

fn print_index_summary(stats: &IndexingStats, db_path: &Path) {
    println!();
    println!("{}", style("Indexing complete!").bold().green());
    println!("  Files processed: {}", stats.files_processed);
    if stats.files_skipped > 0 {
        println!("  Files skipped (binary or unreadable): {}", stats.files_skipped);
    }
    println!("  Chunks created: {}", stats.chunks_created);
    println!("  Chunks stored: {}", stats.chunks_stored);
    if stats.chunks_skipped > 0 {
        println!(
            "  {}",
            style(format!(
                "Chunks skipped (embedding failed): {}",
                stats.chunks_skipped
            ))
            .yellow()
        );
    }
    println!("  Database: {}", db_path.display());
}

/// Start the retrieval server and block until shutdown
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let url = config.server.client_url()?;
    println!(
        "Serving context on {} (POST /retrieve)",
        style(url.join("/retrieve")?).cyan()
    );

    server::serve(config).await
}

/// Show the effective configuration, or write the defaults with `init`
#[inline]
pub fn configure(config_dir: &Path, init: bool) -> Result<()> {
    if init {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            bail!(
                "Configuration already exists at {}",
                config_path.display()
            );
        }

        let config = Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        };
        config.save()?;
        println!(
            "{}",
            style(format!(
                "✓ Wrote default configuration to {}",
                config_path.display()
            ))
            .green()
        );
        return Ok(());
    }

    let config = Config::load(config_dir)?;
    show_config(&config)
}
