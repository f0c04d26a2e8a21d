// Configuration management module
// Loads `code-rag.toml` and hands an explicit `Config` to every component

pub mod settings;


use anyhow::Result;
use console::style;

pub use settings::{
    CONFIG_FILE_NAME, Config, ConfigError, DatabaseConfig, IndexingConfig, OllamaConfig,
    ServerConfig,
};

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", style("Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Ollama Settings:").bold().yellow());
    println!("  Host: {}", style(&config.ollama.host).cyan());
    println!("  Port: {}", style(config.ollama.port).cyan());
    println!("  Model: {}", style(&config.ollama.model).cyan());
    println!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );
    match config.ollama_url() {
        Ok(url) => println!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => println!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    println!();
    println!("{}", style("Indexing:").bold().yellow());
    println!(
        "  Max Chunk Size: {} characters",
        style(config.chunking.max_chunk_size).cyan()
    );
    println!(
        "  Extensions: {}",
        style(config.indexing.extensions.join(" ")).cyan()
    );
    println!(
        "  Ignored: {}",
        style(config.ignore_patterns().join(" ")).cyan()
    );

    println!();
    println!("{}", style("Storage & Server:").bold().yellow());
    println!(
        "  Database: {} (table {})",
        style(config.database_path().display()).cyan(),
        style(&config.database.table_name).cyan()
    );
    println!("  Listen Address: {}", style(config.server.bind_addr()).cyan());
    println!("  Results Per Query: {}", style(config.server.top_k).cyan());

    println!();
    println!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
