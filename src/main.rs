//! Redraft CLI - fetch, rewrite, review and version chapters
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use redraft::agent::GeminiModel;
use redraft::embedding::create_embedder;
use redraft::narration::Narrator;
use redraft::scraper::HttpFetcher;
use redraft::storage::DEFAULT_TOP_K;
use redraft::{ui, Config, SearchIndex, Session, Style, VersionStore, Workflow};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "redraft")]
#[command(author, version, about = "Fetch a chapter, spin and polish it with an LLM, keep every version", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to redraft.toml (defaults to ./redraft.toml, then ~/.config/redraft/)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a chapter and save its text and snapshot
    Scrape {
        /// Chapter URL
        url: String,
        /// Also store the text as an `original` version
        #[arg(long)]
        save: bool,
    },
    /// Fetch, rewrite and review a chapter in one go
    Rewrite {
        /// Chapter URL
        url: String,
        /// Rewrite style: default, formal or creative
        #[arg(long, default_value = "default")]
        style: Style,
        /// Optional tone, e.g. "mysterious"
        #[arg(long)]
        tone: Option<String>,
        /// Store original, rewritten and reviewed versions
        #[arg(long)]
        save: bool,
    },
    /// Search stored versions
    Search {
        /// Search query
        query: String,
        /// Number of results
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Match keywords through the full-text index instead of embeddings
        #[arg(long)]
        keyword: bool,
    },
    /// List all stored versions
    List,
    /// Show a unified diff between two stored versions
    Diff {
        /// Id of version A
        a: String,
        /// Id of version B
        b: String,
    },
    /// Narrate text into an MP3
    Narrate {
        /// Text to speak
        text: String,
    },
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Some(Commands::Completions { shell }) = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "redraft", &mut std::io::stdout());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let embedder = create_embedder(&config)?;
    let store = VersionStore::open(config.versions_path(), embedder.as_ref())
        .context("failed to open version store")?;
    let mut workflow = Workflow::new(
        Box::new(HttpFetcher::from_config(&config)),
        Box::new(GeminiModel::from_config(&config)?),
        Narrator::from_config(&config)?,
        store,
        embedder.as_ref(),
        config.export_path(),
    );
    match SearchIndex::open(config.search_index_path()) {
        Ok(index) => workflow = workflow.with_index(index),
        Err(e) => tracing::warn!(error = %e, "keyword index unavailable"),
    }

    match cli.command {
        Some(Commands::Scrape { url, save }) => {
            let mut session = Session::new(save);
            let chapter = workflow.scrape(&mut session, &url).await?;
            println!("✅ Scraped chapter: {}", chapter.title);
            println!("📸 Snapshot saved at: {}", chapter.snapshot_path.display());
            ui::print_preview("📝 Original", &chapter.text);
        }
        Some(Commands::Rewrite {
            url,
            style,
            tone,
            save,
        }) => {
            let mut session = Session::new(save);
            println!("🌐 Fetching chapter from: {url}");
            let chapter = workflow.scrape(&mut session, &url).await?;
            println!("✅ Scraped chapter: {}", chapter.title);

            println!("\n🛠️ Using rewrite style: {}", style.as_str().to_uppercase());
            let rewritten = workflow.rewrite(&mut session, style, tone.as_deref()).await?;
            ui::print_preview("📝 AI-Rewritten Version (Spin):", &rewritten);

            let reviewed = workflow.review(&mut session).await?;
            ui::print_preview("🔍 AI-Reviewed Version (Refined):", &reviewed);
        }
        Some(Commands::Search {
            query,
            top_k,
            keyword,
        }) => {
            if keyword {
                let versions = workflow.keyword_search(&query, top_k)?;
                if versions.is_empty() {
                    println!("No results found for: {query}");
                }
                for version in versions {
                    println!("📄 {}", version.label());
                    println!("   id: {}\n", version.id);
                }
            } else {
                ui::print_results(&workflow.search(&query, top_k)?);
            }
        }
        Some(Commands::List) => {
            let versions = workflow.versions()?;
            if versions.is_empty() {
                println!("No stored versions found.");
            } else {
                println!("Stored versions ({}):\n", versions.len());
                for version in versions {
                    println!("📄 {}", version.label());
                    println!("   id: {}", version.id);
                    if let Some(url) = &version.metadata.source_url {
                        println!("   {url}");
                    }
                    println!();
                }
            }
        }
        Some(Commands::Diff { a, b }) => {
            ui::print_comparison(&workflow.compare(&a, &b)?);
        }
        Some(Commands::Narrate { text }) => {
            let path = workflow.narrate(&text).await?;
            println!("🔊 Audio written to {}", path.display());
        }
        Some(Commands::Completions { .. }) => {}
        None => {
            // Default: launch the interactive session
            ui::run(&workflow, &config).await?;
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "redraft=info",
        1 => "redraft=debug",
        _ => "redraft=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so they never mix with command output
    match cli.log_format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
