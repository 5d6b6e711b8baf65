//! docqa - ask questions about your own documents, offline.
//!
//! ```bash
//! docqa add ~/papers report.docx     # ingest files and directories
//! docqa ask "What was revenue in Q3?" --show-sources
//! docqa chat                         # interactive session with history
//! docqa stats
//! docqa reset --yes
//! docqa serve-check --start --pull   # make sure the inference server is usable
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use docqa_core::config::{Config, EmbeddingProvider, Settings};
use docqa_embed::embedder_from_settings;
use docqa_llm::{OllamaClient, ServerHandle, ServerSupervisor, DEFAULT_STARTUP_TIMEOUT};
use docqa_pipeline::{Answer, DocStatus, IngestEvent, Orchestrator};
use docqa_vector::LanceStore;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Offline question answering over local PDF, DOCX and text files")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config profile: dev, prod or test (defaults to RUST_ENV, then dev)
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest files; directories are searched recursively for supported files
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer one question from the knowledge base
    Ask {
        question: String,

        /// Print the passages the answer was based on
        #[arg(short, long)]
        show_sources: bool,
    },

    /// Interactive session (:history, :clear, :quit)
    Chat {
        #[arg(short, long)]
        show_sources: bool,
    },

    /// Document and chunk counts
    Stats,

    /// Delete everything in the knowledge base
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Check that the inference server is reachable and has the models
    ServeCheck {
        /// Start the server if it is not running
        #[arg(long)]
        start: bool,

        /// Pull missing models
        #[arg(long)]
        pull: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let settings = Config::load_for_env(cli.env.as_deref())?
        .settings()
        .context("loading configuration")?;

    match cli.command {
        Commands::Add { paths } => add(&settings, &paths).await,
        Commands::Ask { question, show_sources } => {
            let _server = prepare_server(&settings, true).await?;
            let mut pipeline = open_pipeline(&settings).await?;
            let answer = pipeline.ask(&question).await?;
            print_answer(&answer, show_sources);
            Ok(())
        }
        Commands::Chat { show_sources } => chat(&settings, show_sources).await,
        Commands::Stats => stats(&settings).await,
        Commands::Reset { yes } => reset(&settings, yes).await,
        Commands::ServeCheck { start, pull } => serve_check(&settings, start, pull).await,
    }
}

async fn open_pipeline(settings: &Settings) -> Result<Orchestrator<LanceStore>> {
    let cwd = std::env::current_dir()?;
    let path = settings.store_path(&cwd);
    let store = LanceStore::open(&path, &settings.store.table)
        .await
        .with_context(|| format!("opening knowledge base at {}", path.display()))?;
    let embedder = embedder_from_settings(settings)?;
    let generator = Arc::new(OllamaClient::from_config(&settings.llm)?);
    Ok(Orchestrator::new(store, embedder, generator, settings)?)
}

/// Makes sure the server answers before a command that needs it.
///
/// A server started here is stopped when the returned handle drops, unless
/// `llm.keep_server_running` is set.
async fn prepare_server(settings: &Settings, generating: bool) -> Result<Option<ServerHandle>> {
    let needs_server = generating || uses_server_embeddings(settings);
    if !needs_server {
        return Ok(None);
    }
    let supervisor = ServerSupervisor::new(&settings.llm.base_url)?;
    let handle = supervisor.ensure_running(DEFAULT_STARTUP_TIMEOUT).await?;
    if let Some(h) = &handle {
        tracing::info!(pid = ?h.id(), url = supervisor.base_url(), keep = settings.llm.keep_server_running, "started inference server");
    }
    match handle {
        Some(h) if settings.llm.keep_server_running => {
            h.detach();
            Ok(None)
        }
        other => Ok(other),
    }
}

fn uses_server_embeddings(settings: &Settings) -> bool {
    settings.embedding.provider == EmbeddingProvider::Ollama && !docqa_core::config::use_fake_embeddings()
}

async fn add(settings: &Settings, inputs: &[PathBuf]) -> Result<()> {
    let files = docqa_reader::collect_files(inputs);
    if files.is_empty() {
        bail!("no supported files (.pdf, .docx, .txt) found");
    }
    let _server = prepare_server(settings, false).await?;
    let mut pipeline = open_pipeline(settings).await?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let progress = pb.clone();
    let report = pipeline
        .ingest(&files, &mut move |event| match event {
            IngestEvent::Started { path, .. } => {
                progress.set_message(path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
            }
            IngestEvent::Finished { path, status, .. } => {
                if let DocStatus::Failed(reason) = &status {
                    progress.println(format!("failed: {} ({reason})", path.display()));
                }
                progress.inc(1);
            }
        })
        .await?;
    pb.finish_and_clear();
    tracing::info!(
        ingested = report.ingested.len(),
        chunks = report.total_chunks(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "ingest finished"
    );

    println!(
        "Ingested {} document(s), {} chunk(s); skipped {}; failed {}",
        report.ingested.len(),
        report.total_chunks(),
        report.skipped.len(),
        report.failed.len()
    );
    for (path, reason) in &report.skipped {
        println!("  skipped {} ({reason:?})", path.display());
    }
    if report.ingested.is_empty() && report.has_failures() {
        bail!("no document could be ingested");
    }
    Ok(())
}

fn print_answer(answer: &Answer, show_sources: bool) {
    println!("{}", answer.text);
    if show_sources && !answer.context.is_empty() {
        println!("\nSources:");
        for hit in &answer.context {
            let preview: String = hit.chunk.content.chars().take(120).collect();
            println!(
                "  [{:.3}] {} #{}/{}: {}",
                hit.score,
                hit.chunk.source,
                hit.chunk.index + 1,
                hit.chunk.total,
                preview.replace('\n', " ")
            );
        }
    }
}

async fn chat(settings: &Settings, show_sources: bool) -> Result<()> {
    let _server = prepare_server(settings, true).await?;
    let mut pipeline = open_pipeline(settings).await?;
    println!("Ask about your documents. Commands: :history, :clear, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":clear" => {
                pipeline.clear_history();
                println!("History cleared.");
            }
            ":history" => {
                for (i, ex) in pipeline.history().iter().enumerate() {
                    println!("{}. Q: {}\n   A: {}\n   sources: {}", i + 1, ex.question, ex.answer, ex.sources.join(", "));
                }
            }
            question => match pipeline.ask(question).await {
                Ok(answer) => print_answer(&answer, show_sources),
                Err(e) if e.is_retryable() => println!("error: {e}\nhint: `docqa serve-check --start` starts the server"),
                Err(e) => println!("error: {e}"),
            },
        }
    }
    Ok(())
}

async fn stats(settings: &Settings) -> Result<()> {
    let pipeline = open_pipeline(settings).await?;
    let stats = pipeline.stats().await?;
    println!("Documents: {}", stats.documents);
    println!("Chunks:    {}", stats.chunks);
    for (format, count) in &stats.formats {
        println!("  {format}: {count}");
    }
    Ok(())
}

async fn reset(settings: &Settings, yes: bool) -> Result<()> {
    if !yes {
        print!("Delete every document from the knowledge base? [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }
    let mut pipeline = open_pipeline(settings).await?;
    pipeline.reset().await?;
    println!("Knowledge base cleared.");
    Ok(())
}

async fn serve_check(settings: &Settings, start: bool, pull: bool) -> Result<()> {
    let supervisor = ServerSupervisor::new(&settings.llm.base_url)?;
    match supervisor.installed_version().await {
        Some(v) => println!("ollama: {v}"),
        None => println!("ollama: not found in PATH"),
    }

    // a server started here stays up until the model checks are done
    let mut server = None;
    if supervisor.is_running().await {
        println!("server: running at {}", supervisor.base_url());
    } else if start {
        server = supervisor.ensure_running(DEFAULT_STARTUP_TIMEOUT).await?;
        println!("server: started at {}", supervisor.base_url());
        if settings.llm.keep_server_running {
            if let Some(h) = server.take() {
                h.detach();
            }
        }
    } else {
        bail!("server not reachable at {} (rerun with --start)", supervisor.base_url());
    }

    let mut wanted = vec![settings.llm.model.clone()];
    if uses_server_embeddings(settings) {
        wanted.push(settings.embedding.model.clone());
    }
    let available = supervisor.list_models().await?;
    for model in wanted {
        let present = available.iter().any(|m| *m == model || *m == format!("{model}:latest"));
        if present {
            println!("model {model}: available");
        } else if pull {
            println!("model {model}: pulling...");
            supervisor.ensure_model(&model).await?;
            println!("model {model}: available");
        } else {
            println!("model {model}: missing (rerun with --pull)");
        }
    }
    drop(server);
    Ok(())
}
