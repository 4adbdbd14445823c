//! Resonance: ingestion-and-retrieval orchestration engine for audio-sourced RAG.

mod adapters;
mod bootstrap;
mod commands;
mod logging;

use clap::{Parser, Subcommand};
use resonance_core::error::ResonanceError;

#[derive(Parser)]
#[command(name = "resonance", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Identity this CLI invocation acts as (chat-bot/HTTP callers use their own ids).
    #[arg(long, global = true, default_value = "cli")]
    user: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one or more sources for ingestion.
    Process {
        urls: Vec<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// Ask a question against the Retrieval Engine.
    Query {
        text: String,
        #[arg(long, default_value = "5")]
        top_k: u32,
    },
    /// Print submission counts, storage size and worker pool status.
    Status,
    /// Run a curated case set through every retrieval variant.
    Evaluate {
        #[arg(long, default_value = "eval_cases.json")]
        cases: String,
        #[arg(long, default_value = "5")]
        top_k: u32,
    },
    /// Submit sources and force their immediate Pipeline Job enqueue.
    IngestJob {
        urls: Vec<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// Run the Scheduler (and, with the `api` feature, the HTTP control plane) until interrupted.
    RunIngestion {
        #[arg(long)]
        all: bool,
    },
    /// Denser terminal view of stage counts and configured worker pools.
    Dashboard,
    /// Interactive first-run setup.
    Init,
}

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    load_dotenv();
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        return match commands::init::run() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: {e}");
                2
            }
        };
    }

    let engine = match bootstrap::assemble().await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: failed to start: {e}");
            return 2;
        }
    };
    logging::init_logging(&engine.config);

    let result = dispatch(&cli, engine).await;
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}

async fn dispatch(cli: &Cli, engine: bootstrap::Engine) -> Result<(), ResonanceError> {
    match &cli.command {
        Commands::Process { urls, language } => commands::process::run(&engine, urls, &cli.user, language.as_deref()).await,
        Commands::Query { text, top_k } => commands::query::run(&engine, text, *top_k, &cli.user).await,
        Commands::Status => commands::status::run(&engine).await,
        Commands::Evaluate { cases, top_k } => commands::evaluate::run(&engine, cases, *top_k).await,
        Commands::IngestJob { urls, language } => commands::ingest_job::run(&engine, urls, &cli.user, language.as_deref()).await,
        Commands::RunIngestion { all } => {
            if !all {
                return Err(ResonanceError::InputInvalid("run-ingestion currently only supports --all".into()));
            }
            commands::run_ingestion::run(engine).await
        }
        Commands::Dashboard => commands::dashboard::run(&engine).await,
        Commands::Init => unreachable!("handled above"),
    }
}

/// Loads a local `.env` (written by `init`) into the process environment
/// without overriding variables already set by the caller's shell.
fn load_dotenv() {
    let Ok(text) = std::fs::read_to_string(".env") else { return };
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
    }
}
