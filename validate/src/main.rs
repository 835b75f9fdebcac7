//! Offline checks for overlay templates and rule files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use herald_core::rules::{load_file, load_rules};
use herald_core::{EventType, RuleSet, extract_tags, render_with_report, validate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "herald-validate", version, about = "Validate herald templates and rules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a template for authoring errors
    Check {
        template: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Render a template against JSON data
    Render {
        template: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// JSON object to render against
        #[arg(short, long, default_value = "{}")]
        data: String,
    },
    /// List the substitution tags a template reads
    Tags {
        template: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Load a rule file, or a directory merged over the builtin rules
    Rules { path: PathBuf },
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_template(template: Option<String>, file: Option<PathBuf>) -> Result<String, String> {
    match (template, file) {
        (_, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display())),
        (Some(t), None) => Ok(t),
        (None, None) => Err("give a template or --file".to_string()),
    }
}

fn run(cli: Cli) -> Result<bool, String> {
    match cli.command {
        Commands::Check { template, file } => {
            let template = read_template(template, file)?;
            match validate(&template) {
                Ok(summary) => {
                    println!(
                        "OK: {} tag(s), {} conditional(s), max depth {}",
                        summary.tags.len(),
                        summary.conditionals,
                        summary.max_depth
                    );
                    for tag in &summary.tags {
                        println!("  {tag}");
                    }
                    Ok(true)
                }
                Err(e) => {
                    println!("ERROR: {e}");
                    Ok(false)
                }
            }
        }
        Commands::Render {
            template,
            file,
            data,
        } => {
            let template = read_template(template, file)?;
            let data: serde_json::Value =
                serde_json::from_str(&data).map_err(|e| format!("invalid --data: {e}"))?;
            let out = render_with_report(&template, &data);
            println!("{}", out.text);
            for warning in &out.warnings {
                eprintln!("warning: {warning}");
            }
            Ok(out.warnings.is_empty())
        }
        Commands::Tags { template, file } => {
            let template = read_template(template, file)?;
            for tag in extract_tags(&template) {
                println!("{tag}");
            }
            Ok(true)
        }
        Commands::Rules { path } => {
            let rules = if path.is_dir() {
                load_rules(Some(path.as_path())).map_err(|e| e.to_string())?
            } else {
                let config = load_file(&path).map_err(|e| e.to_string())?;
                let mut set = RuleSet::new();
                set.add_config(config);
                set
            };
            println!("{} rule(s)", rules.len());
            for name in rules.event_types() {
                let event_type = EventType::parse(name);
                for rule in rules.rules_for(&event_type) {
                    let state = if rule.enabled { "" } else { " (disabled)" };
                    println!(
                        "  {:<32} {:<6} {:<24}{}",
                        name,
                        rule.op.as_str(),
                        rule.tag,
                        state
                    );
                }
            }
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
