//! CLI entry point for the margin backend (for dev and testing).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use margin_core::{
    app_data_dir, chunk_note, load_config, scan_notes, set_notes_root, status, Config, NoteIndex,
    OllamaClient,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "margin")]
#[command(about = "margin: ask questions of a folder of markdown notes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where margin stores its config (app data directory).
    DataDir,
    /// Remember a notes folder as the default root.
    SetRoot {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Scan a directory for markdown notes and list them.
    Scan {
        /// Root directory to scan. Defaults to the configured notes root.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Print the chunks a single note would be split into.
    Chunk {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Maximum characters per chunk. Defaults to the configured limit.
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Bring the index in line with the notes folder.
    Sync {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Rank note chunks against a query.
    Query {
        text: String,
        #[arg(long)]
        path: Option<PathBuf>,
        /// Number of matches to return (0 for all).
        #[arg(long)]
        top_k: Option<usize>,
        /// Print matches as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Answer a question from the notes using the chat model.
    Ask {
        question: String,
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match run(cli.command.unwrap_or(Commands::Status), &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

async fn run(command: Commands, config: &Config) -> CliResult {
    match command {
        Commands::Status => {
            println!("margin backend");
            println!("  core: {}", status());
            match notes_root(None, config) {
                Ok(root) => println!("  notes: {}", root.display()),
                Err(_) => println!("  notes: (not set)"),
            }
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => return Err("could not determine app data directory".into()),
        },
        Commands::SetRoot { path } => {
            set_notes_root(&path)?;
            println!("Notes root set to {}", path.display());
        }
        Commands::Scan { path } => {
            let root = notes_root(path, config)?;
            let notes = scan_notes(&root)?;
            println!("Scanned {} note(s) under {}", notes.len(), root.display());
            for n in notes {
                println!("  {}  {}", n.modified, n.path);
            }
        }
        Commands::Chunk { file, max_chars } => {
            let body = std::fs::read_to_string(&file)?;
            let limit = max_chars.unwrap_or(config.index.chunk_char_limit);
            for c in chunk_note(&body, limit) {
                println!("--- [{}] {} ({} chars)", c.index, c.heading, c.text.chars().count());
                println!("{}", c.text);
            }
        }
        Commands::Sync { path } => {
            let index = open_index(path, config)?;
            let cancel = cancel_on_ctrl_c();
            let report = index.reconcile(&cancel).await?;
            println!(
                "{} scanned, {} unchanged, {} reindexed ({} chunks), {} removed",
                report.scanned, report.unchanged, report.reindexed, report.embedded_chunks, report.removed
            );
        }
        Commands::Query {
            text,
            path,
            top_k,
            json,
        } => {
            let index = open_index(path, config)?;
            let cancel = cancel_on_ctrl_c();
            let top_k = top_k.unwrap_or(index.settings().top_k);
            let matches = index.query_top(&text, top_k, &cancel).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                for m in matches {
                    println!("{:.4}  {}  {}", m.score, m.note_path, m.heading);
                    println!("    {}", preview(&m.text));
                }
            }
        }
        Commands::Ask { question, path } => {
            let index = open_index(path, config)?;
            let cancel = cancel_on_ctrl_c();
            let answer = index.ask(&question, &cancel).await?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for (i, s) in answer.sources.iter().enumerate() {
                    println!("  [{}] {}  {}", i + 1, s.note_path, s.heading);
                    println!("      {}", s.snippet.replace('\n', " "));
                }
            }
        }
    }
    Ok(())
}

fn notes_root(arg: Option<PathBuf>, config: &Config) -> Result<PathBuf, Box<dyn std::error::Error>> {
    arg.or_else(|| config.notes_root.as_deref().filter(|s| !s.is_empty()).map(PathBuf::from))
        .ok_or_else(|| "no notes folder given and none configured (see `margin set-root`)".into())
}

fn open_index(path: Option<PathBuf>, config: &Config) -> Result<NoteIndex, Box<dyn std::error::Error>> {
    let root = notes_root(path, config)?;
    let settings = config.index.clone();
    let client = OllamaClient::from_url(&settings.ollama_url)?
        .with_embed_model(settings.embed_model.clone())
        .with_chat_model(settings.chat_model.clone())
        .with_generation_options(settings.temperature, settings.max_output_tokens);
    tracing::debug!(root = %root.display(), model = client.embed_model(), "opening index");
    Ok(NoteIndex::open(root, Arc::new(client), settings)?)
}

/// Token cancelled on Ctrl+C, so an in-flight provider call is abandoned cleanly.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    if first.chars().count() > 80 {
        format!("{}...", first.chars().take(80).collect::<String>())
    } else {
        first.to_string()
    }
}
