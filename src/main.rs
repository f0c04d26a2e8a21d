use anyhow::Result;
use clap::{Parser, Subcommand};
use code_rag::commands::{configure, index_directory, serve};
use code_rag::config::Config;
use code_rag::diagnostics::{inspect_database, smoke_test};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "code-rag")]
#[command(about = "Index a codebase into a local vector store and serve code context over HTTP")]
#[command(version)]
struct Cli {
    /// Directory holding code-rag.toml; relative database paths resolve against it
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store every source file under a directory
    Index {
        /// Root directory to index
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Start the retrieval HTTP server
    Serve,
    /// Print the contents of the vector store
    Inspect,
    /// Check the database, Ollama and the running server end to end
    SmokeTest,
    /// Show the current configuration
    Config {
        /// Write a default code-rag.toml instead
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index { dir } => {
            index_directory(Config::load(&cli.config_dir)?, &dir).await?;
        }
        Commands::Serve => {
            serve(Config::load(&cli.config_dir)?).await?;
        }
        Commands::Inspect => {
            inspect_database(&Config::load(&cli.config_dir)?).await;
        }
        Commands::SmokeTest => {
            let report = smoke_test(&Config::load(&cli.config_dir)?).await;
            if !report.all_passed() {
                std::process::exit(1);
            }
        }
        Commands::Config { init } => {
            configure(&cli.config_dir, init)?;
        }
    }

    Ok(())
}
