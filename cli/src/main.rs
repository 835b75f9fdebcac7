use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use herald_cli::{commands, readline};
use herald_core::AppState;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    // If HERALD_LOG_PATH is set, append to that file instead of interleaving with the prompt
    if let Ok(path) = std::env::var("HERALD_LOG_PATH") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), String> {
    init_logging();

    let mut app = AppState::new();
    app.pipeline.add_display_sink(commands::print_display);
    let state = Arc::new(RwLock::new(app));

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, Arc::clone(&state)).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "herald pipeline console")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one raw JSON payload at the current clock
    Ingest { json: String },
    /// Ingest every payload in an NDJSON file
    Replay {
        path: String,
        /// Virtual time between payloads
        #[arg(short, long, default_value_t = 250)]
        gap_ms: i64,
    },
    /// Move the virtual clock forward
    Advance { ms: i64 },
    /// End the displayed notification
    Skip,
    /// Close all gift-bomb buffers
    Flush,
    /// Print overlay state
    State,
    /// Print the display slot and queue
    Queue,
    /// Render a template against what is displayed
    Render {
        template: Option<String>,
        #[arg(short, long)]
        file: Option<String>,
    },
    Config {
        #[arg(long)]
        save: bool,
    },
    Exit,
}

async fn respond(line: &str, state: Arc<RwLock<AppState>>) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "herald".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Ingest { json }) => commands::ingest(state, json).await,
        Some(Commands::Replay { path, gap_ms }) => commands::replay(state, path, *gap_ms).await,
        Some(Commands::Advance { ms }) => commands::advance(state, *ms).await,
        Some(Commands::Skip) => commands::skip(state).await,
        Some(Commands::Flush) => commands::flush(state).await,
        Some(Commands::State) => commands::show_state(state).await,
        Some(Commands::Queue) => commands::show_queue(state).await,
        Some(Commands::Render { template, file }) => {
            let template = match (template, file) {
                (_, Some(path)) => std::fs::read_to_string(path).map_err(|e| e.to_string())?,
                (Some(t), None) => t.clone(),
                (None, None) => return Err("error: give a template or --file\n".to_string()),
            };
            commands::render(state, &template).await
        }
        Some(Commands::Config { save }) => commands::show_settings(state, *save).await,
        Some(Commands::Exit) => {
            commands::exit(state).await;
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
