use std::path::Path;
use std::sync::Arc;

use herald_core::{AppState, QueuedNotification, validate};
use tokio::sync::RwLock;

use crate::replay::read_payloads;

/// Display sink for the REPL
pub fn print_display(current: Option<&QueuedNotification>) {
    match current {
        Some(n) => println!(
            "  >> [{}] {} {} x{} for {}ms",
            n.priority,
            n.event.event_type,
            n.event
                .actor_name
                .as_deref()
                .or(n.event.gifter_name.as_deref())
                .unwrap_or("-"),
            n.count,
            n.display_duration_ms
        ),
        None => println!("  >> (display cleared)"),
    }
}

fn describe(n: &QueuedNotification) -> String {
    format!(
        "{:<28} {:<22} prio {:>2}  x{:<4} {:>6}ms  queued @{}",
        n.id,
        n.event.event_type.as_str(),
        n.priority,
        n.count,
        n.display_duration_ms,
        n.enqueued_at
    )
}

pub async fn ingest(state: Arc<RwLock<AppState>>, json: &str) {
    let raw: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            println!("Invalid JSON: {e}");
            return;
        }
    };
    let mut s = state.write().await;
    let now = s.clock_ms;
    match s.pipeline.ingest(&raw, now) {
        Some(outcome) => {
            println!(
                "{} ({}): {} forwarded, {} queued, state changed {:?}",
                outcome.event_id,
                outcome.event_type,
                outcome.forwarded,
                outcome.admitted,
                outcome.rules.changed
            );
            for op in &outcome.rules.unknown_ops {
                println!("  unknown rule op {op}");
            }
        }
        None => println!("Pipeline is shut down"),
    }
}

pub async fn replay(state: Arc<RwLock<AppState>>, path: &str, gap_ms: i64) {
    let (payloads, bad) = match read_payloads(Path::new(path)).await {
        Ok(read) => read,
        Err(e) => {
            println!("Failed to read {path}: {e}");
            return;
        }
    };
    for line in &bad {
        println!("line {}: {}", line.line, line.error);
    }

    let mut s = state.write().await;
    let mut ingested = 0;
    for raw in &payloads {
        let now = s.clock_ms;
        if s.pipeline.ingest(raw, now).is_some() {
            ingested += 1;
        }
        s.advance(gap_ms);
    }
    println!(
        "Replayed {} payload(s), {} skipped, clock now {}",
        ingested,
        bad.len(),
        s.clock_ms
    );
}

pub async fn advance(state: Arc<RwLock<AppState>>, ms: i64) {
    let mut s = state.write().await;
    let fired = s.advance(ms);
    println!("Clock {} ({} deadline(s) fired)", s.clock_ms, fired);
}

pub async fn skip(state: Arc<RwLock<AppState>>) {
    let mut s = state.write().await;
    let now = s.clock_ms;
    match s.pipeline.skip_current(now) {
        Some(n) => println!("Skipped {}", n.id),
        None => println!("Nothing displayed"),
    }
}

pub async fn flush(state: Arc<RwLock<AppState>>) {
    let mut s = state.write().await;
    let now = s.clock_ms;
    let count = s.pipeline.flush_all(now);
    println!("Flushed {count} event(s) from gift buffers");
}

pub async fn show_state(state: Arc<RwLock<AppState>>) {
    let s = state.read().await;
    if s.pipeline.state().is_empty() {
        println!("(no overlay state)");
        return;
    }
    for (tag, value) in s.pipeline.state().iter() {
        println!("{tag:<24} {value}");
    }
}

pub async fn show_queue(state: Arc<RwLock<AppState>>) {
    let s = state.read().await;
    match s.pipeline.current() {
        Some(n) => println!("showing  {}", describe(n)),
        None => println!("showing  (nothing)"),
    }
    for (i, n) in s.pipeline.queued().iter().enumerate() {
        println!("{:>6}.  {}", i + 1, describe(n));
    }
    let buffers = s.pipeline.aggregator().active_buffers();
    if buffers > 0 {
        println!("{buffers} gift buffer(s) open");
    }
    if let Some(next) = s.pipeline.next_deadline() {
        println!("next timer in {}ms", next - s.clock_ms);
    }
}

pub async fn render(state: Arc<RwLock<AppState>>, template: &str) {
    if let Err(e) = validate(template) {
        println!("warning: {e}");
    }
    let s = state.read().await;
    let out = s.pipeline.render_current(template);
    println!("{}", out.text);
    for warning in &out.warnings {
        println!("warning: {warning}");
    }
}

pub async fn show_settings(state: Arc<RwLock<AppState>>, save: bool) {
    let s = state.read().await;
    if let Some(path) = AppState::config_path() {
        println!("config file: {}", path.display());
    }
    match s.rules_dir() {
        Some(dir) => println!("rules dir:   {}", dir.display()),
        None => println!("rules dir:   (none)"),
    }
    println!("rules:       {}", s.pipeline.rules().len());
    match serde_json::to_string_pretty(&s.config) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("Failed to show config: {e}"),
    }
    if save {
        match s.save_config() {
            Ok(()) => println!("Saved"),
            Err(e) => println!("Failed to save config: {e}"),
        }
    }
}

pub async fn exit(state: Arc<RwLock<AppState>>) {
    let mut s = state.write().await;
    let now = s.clock_ms;
    s.pipeline.shutdown(now);
}
