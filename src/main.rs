//! archivist CLI entry point

use archivist::{
    commands::{
        cmd_ask, cmd_crawl, cmd_embed_dir, cmd_index_artifact, cmd_ingest_dir, cmd_init,
        cmd_query, cmd_status, print_answer, print_index_summary, print_ingest_stats,
        print_init_summary, print_query_results, print_status, InitOptions, QueryPipeline,
    },
    config::Config,
    embed::create_embedder,
    error::{Error, Result},
    progress::LogWriterFactory,
    retrieve::Retriever,
    store::open_store,
    synth::HttpSynthesizer,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "archivist")]
#[command(version, about = "Retrieval-augmented question answering over your documents", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the vector store
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Chunk, embed and index a directory of documents
    Ingest {
        /// Path to directory
        path: PathBuf,
    },

    /// Embed a directory into an artifact file without indexing it
    Embed {
        /// Path to directory
        path: PathBuf,

        /// Artifact file to write
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Index a previously written embedding artifact
    Index {
        /// Artifact file
        artifact: PathBuf,

        /// Record id prefix (defaults to the artifact file name)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Crawl web pages from seed URLs and index them
    Crawl {
        /// Seed URLs
        #[arg(required = true)]
        seeds: Vec<String>,

        /// Maximum pages to keep
        #[arg(long)]
        max_pages: Option<usize>,

        /// Also save page texts to this directory
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Retrieve the chunks most similar to a query
    Query {
        /// The search query
        query: String,

        /// Number of results
        #[arg(short)]
        k: Option<usize>,
    },

    /// Answer a question from the indexed documents
    Ask {
        /// The question
        query: String,

        /// Number of chunks to retrieve
        #[arg(short)]
        k: Option<usize>,

        /// Context budget in characters
        #[arg(long)]
        budget: Option<usize>,

        /// Synthesis retries after a failure
        #[arg(long, default_value = "1")]
        retries: u32,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let config_path = resolve_config_path(cli.config.as_deref());
            let config = cmd_init(InitOptions { config_path, force }).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "config": config.paths.config_file,
                        "store": config.store_path(),
                    })
                );
            } else {
                print_init_summary(&config);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "archivist", &mut std::io::stdout());
        }

        Commands::Ingest { path } => {
            let config = load_config(cli.config.as_deref())?;
            let embedder = create_embedder(&config.embedding)?;
            let store = open_store(&config).await?;
            let stats = cmd_ingest_dir(&config, embedder.as_ref(), &store, &path).await?;
            emit(cli.json, &stats, print_ingest_stats)?;
        }

        Commands::Embed { path, out } => {
            let config = load_config(cli.config.as_deref())?;
            let embedder = create_embedder(&config.embedding)?;
            let summary = cmd_embed_dir(&config, embedder.as_ref(), &path, &out).await?;
            emit(cli.json, &summary, |s| {
                println!("\n✓ Wrote {} embeddings to {}", s.embeddings, s.output.display());
                println!("  Documents: {}", s.documents);
                println!("  Model: {} (dim {})", s.model, s.dimension);
            })?;
        }

        Commands::Index { artifact, prefix } => {
            let config = load_config(cli.config.as_deref())?;
            let store = open_store(&config).await?;
            let summary = cmd_index_artifact(&config, &store, &artifact, prefix).await?;
            emit(cli.json, &summary, print_index_summary)?;
        }

        Commands::Crawl {
            seeds,
            max_pages,
            save,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let embedder = create_embedder(&config.embedding)?;
            let store = open_store(&config).await?;
            let stats = cmd_crawl(
                &config,
                embedder.as_ref(),
                &store,
                &seeds,
                max_pages,
                save.as_deref(),
            )
            .await?;
            emit(cli.json, &stats, print_ingest_stats)?;
        }

        Commands::Query { query, k } => {
            let config = load_config(cli.config.as_deref())?;
            let retriever = build_retriever(&config).await?;
            let output = cmd_query(&retriever, &query, k).await?;
            emit(cli.json, &output, print_query_results)?;
        }

        Commands::Ask {
            query,
            k,
            budget,
            retries,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let retriever = build_retriever(&config).await?;
            let synthesizer = Arc::new(HttpSynthesizer::new(&config.llm, config.llm_api_key())?);

            let mut pipeline = QueryPipeline::from_config(&config, retriever, synthesizer);
            if let Some(budget) = budget {
                pipeline = pipeline.with_budget(budget);
            }

            match cmd_ask(&pipeline, &query, k, retries).await {
                Ok(answer) => emit(cli.json, &answer, print_answer)?,
                Err(Error::Synthesis(failure)) => {
                    // Retrieval worked; show what was found before failing
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&serde_json::json!({
                                "query": failure.query,
                                "retrieved_chunks": failure.retrieved_chunks,
                                "context": failure.context,
                                "error": failure.reason,
                            }))?
                        );
                    } else {
                        eprintln!("Retrieved {} chunks before synthesis failed.", failure.retrieved_chunks.len());
                    }
                    return Err(Error::Synthesis(failure));
                }
                Err(e) => return Err(e),
            }
        }

        Commands::Status => {
            let config = load_config(cli.config.as_deref())?;
            let store = open_store(&config).await?;
            let status = cmd_status(&config, &store).await?;
            emit(cli.json, &status, print_status)?;
        }
    }

    Ok(())
}

fn emit<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

async fn build_retriever(config: &Config) -> Result<Retriever> {
    let embedder = create_embedder(&config.embedding)?;
    let store = Arc::new(open_store(config).await?);
    Ok(Retriever::from_config(config, embedder, store))
}

/// A `.toml` path is used as is; anything else is treated as a directory
fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => p.to_path_buf(),
        Some(dir) => dir.join("config.toml"),
        None => Config::default_config_path(),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = resolve_config_path(path);
    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }
    Config::load(&config_path)
}
