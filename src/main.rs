//! docqa CLI - document ingestion and Q&A
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments, wiring components and handling top-level errors.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;
use docqa::api::create_router;
use docqa::api::handlers::AppState;
use docqa::mapping::SourceMapper;
use docqa::sync::SyncReport;
use docqa::{build_summarizer, chat, ranking, BrowserFetcher, Config, DocumentStore, SyncEngine, SyncStatus};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(author, version, about = "Document ingestion and Q&A service", long_about = None)]
struct Cli {
    /// Path to docqa.toml (defaults to ./docqa.toml or ~/.config/docqa/docqa.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on, overrides server.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Add or refresh documents from URLs
    Sync {
        /// URLs to sync
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// List all stored documents
    List,
    /// Delete a document and its PDF
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Store a local PDF with summary and metadata
    Upload { path: PathBuf },
    /// Rank stored documents against a query
    Rank { query: String },
    /// Ask a question about a stored document
    Ask {
        question: String,
        /// Document id, defaults to chat.document_id
        #[arg(long)]
        document: Option<String>,
    },
    /// Map the configured sources through Firecrawl
    MapSources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docqa=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Serve { bind } => {
            let engine = build_engine(&config)?;
            let state = AppState {
                engine,
                auth: config.auth.clone(),
                mapping: config.mapping.clone(),
                chat_document: config.chat.document_id.clone(),
            };
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {}", bind))?;
            tracing::info!("Listening on {}", bind);

            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutdown signal received");
                })
                .await?;
        }
        Commands::Sync { urls } => {
            let engine = build_engine(&config)?;
            for url in urls {
                println!("Syncing: {}", url);
                let result = engine.sync(&url).await;
                print_report(&SyncReport::new(&url, &result));
            }
        }
        Commands::List => {
            let store = open_store(&config)?;
            let documents = store.list().await;
            if documents.is_empty() {
                println!("No stored documents found.");
            } else {
                println!("Stored documents ({}):\n", documents.len());
                for doc in documents {
                    let title = doc.title.as_deref().unwrap_or("Untitled");
                    println!("📄 {} [{}]", title, doc.id);
                    println!("   {}", doc.url);
                    println!("   {}\n", first_line(&doc.description));
                }
            }
        }
        Commands::Delete { id, yes } => {
            let engine = build_engine(&config)?;
            let Some(doc) = engine.store().get(&id).await else {
                anyhow::bail!("document not found: {}", id);
            };
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("Delete {} ({})?", doc.id, doc.url))
                    .default(false)
                    .interact()?;
            if confirmed {
                engine.delete(&id).await?;
                println!("{} {}", "deleted".red(), id);
            }
        }
        Commands::Upload { path } => {
            let engine = build_engine(&config)?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.pdf".to_string());
            let doc = engine.upload(&file_name, &bytes).await?;
            println!("{} {} ({})", "added".green(), doc.id, file_name);
            if !doc.tags.is_empty() {
                println!("   🏷️  {}", doc.tags.join(", "));
            }
        }
        Commands::Rank { query } => {
            let engine = build_engine(&config)?;
            let documents = engine.store().list().await;
            let ranked = ranking::rank(&query, &documents, engine.summarizer().as_ref()).await?;
            if ranked.is_empty() {
                println!("No matching documents for: {}", query);
            }
            for (position, entry) in ranked.iter().enumerate() {
                println!("{}. [{:.2}] {} {}", position + 1, entry.relevance, entry.id, entry.url);
            }
        }
        Commands::Ask { question, document } => {
            let engine = build_engine(&config)?;
            let id = document
                .or_else(|| config.chat.document_id.clone())
                .context("no document given and chat.document_id is not set")?;
            let doc = engine
                .store()
                .get(&id)
                .await
                .with_context(|| format!("document not found: {}", id))?;
            let answer = chat::ask(
                engine.summarizer().as_ref(),
                &engine.pdf_path(&doc),
                &question,
            )
            .await?;
            println!("{}", answer.display());
        }
        Commands::MapSources => {
            let mapper = SourceMapper::from_config(&config.mapping)?;
            let maps = mapper
                .map_sources(&config.mapping.sources, &config.storage.path)
                .await?;
            for (source, map) in maps {
                let links = map
                    .get("links")
                    .and_then(|links| links.as_array())
                    .map_or(0, |links| links.len());
                println!("🗺️  {} ({} links)", source, links);
            }
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<DocumentStore>> {
    let store = DocumentStore::open_file(config.documents_file())
        .with_context(|| format!("failed to load {}", config.documents_file().display()))?;
    Ok(Arc::new(store))
}

fn build_engine(config: &Config) -> anyhow::Result<Arc<SyncEngine>> {
    let store = open_store(config)?;
    let fetcher = Arc::new(BrowserFetcher::new(&config.fetcher));
    let summarizer = build_summarizer(config)?;
    Ok(Arc::new(SyncEngine::new(
        store,
        fetcher,
        summarizer,
        config.storage.path.clone(),
    )))
}

fn print_report(report: &SyncReport) {
    let label = match report.status {
        SyncStatus::Added => report.status.to_string().green(),
        SyncStatus::Updated => report.status.to_string().yellow(),
        SyncStatus::Unchanged => report.status.to_string().dimmed(),
        SyncStatus::Error => report.status.to_string().red(),
    };
    match (&report.id, &report.detail) {
        (Some(id), _) => println!("  {} {}", label, id),
        (None, Some(detail)) => println!("  {} {}", label, detail),
        (None, None) => println!("  {}", label),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
