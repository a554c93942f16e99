//! Command execution

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufRead, BufReader};

use crate::app::initialization::{backlog_store, client_options};
use crate::cli::{self, BacklogAction, ConfigAction, InputSummary};
use crate::client::Client;
use crate::config::ConfigManager;
use crate::lifecycle::LifecycleEvent;
use crate::transport::{OfflineBacklog, TransportStats};

/// Dispatch the parsed subcommand
pub async fn run_command(args: &cli::Args, config: &ConfigManager) -> Result<()> {
    match &args.command {
        cli::Command::Send { file, settle } => {
            let stats = run_send(args, config, file.as_deref(), Duration::from_secs(*settle)).await?;
            print_send_summary(&stats);
            Ok(())
        }
        cli::Command::Backlog { action } => run_backlog(args, config, *action),
        cli::Command::Config { action: ConfigAction::Show } => {
            print!("{}", render_config(config));
            Ok(())
        }
    }
}

/// What a `send` run did
#[derive(Debug, Clone, Default)]
pub struct SendStats {
    pub input: InputSummary,
    pub transport: TransportStats,
    pub interrupted: bool,
}

/// Track every input event, then destroy the client so the tail is flushed.
/// Ctrl-C is treated like the host going away: an urgent flush, then exit.
pub async fn run_send(
    args: &cli::Args,
    config: &ConfigManager,
    file: Option<&Path>,
    settle: Duration,
) -> Result<SendStats> {
    let options = client_options(args, config)?;
    let store = backlog_store(config, &options.context.app_id)?;
    let client = Client::builder(options).store(store).settle_timeout(settle).build()?;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match file {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open event file: {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut stats = SendStats::default();
    tokio::select! {
        summary = cli::read_events(reader, |event| client.track(event)) => {
            stats.input = summary?;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; flushing queued events");
            client.lifecycle().emit(LifecycleEvent::PageHide);
            stats.interrupted = true;
        }
    }

    client.destroy().await;
    stats.transport = client.transport().stats();
    info!(
        "Send finished: {} accepted, {} skipped, {} batches delivered",
        stats.input.accepted, stats.input.skipped, stats.transport.batches_delivered
    );
    Ok(stats)
}

fn print_send_summary(stats: &SendStats) {
    println!(
        "Tracked {} events ({} skipped){}",
        stats.input.accepted,
        stats.input.skipped,
        if stats.interrupted { ", interrupted" } else { "" }
    );
    println!(
        "Delivered {} batches, persisted {} batches ({} events)",
        stats.transport.batches_delivered, stats.transport.batches_persisted, stats.transport.events_persisted
    );
    if let Some(strategy) = stats.transport.last_strategy {
        println!("Last strategy: {}", strategy);
    }
}

/// Show or clear the offline backlog
pub fn run_backlog(args: &cli::Args, config: &ConfigManager, action: BacklogAction) -> Result<()> {
    let options = client_options(args, config)?;
    let app_id = options.context.app_id.trim();
    if app_id.is_empty() {
        return Err(anyhow::anyhow!("An application id is required (--app-id or client.app-id)"));
    }

    let backlog = OfflineBacklog::new(backlog_store(config, app_id)?, options.transport.backlog_capacity);
    let events = backlog.peek().context("Failed to read the offline backlog")?;

    match action {
        BacklogAction::Show => {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
            eprintln!("{} events in backlog", events.len());
        }
        BacklogAction::Clear => {
            backlog.clear().context("Failed to clear the offline backlog")?;
            println!("Cleared {} events", events.len());
        }
    }
    Ok(())
}

/// `[section]` blocks with sorted keys
pub fn render_config(config: &ConfigManager) -> String {
    let mut out = match config.config_file_path() {
        Some(path) => format!("# {}\n", path.display()),
        None => "# no configuration file; using defaults\n".to_string(),
    };
    for (section, values) in config.sections() {
        if !section.is_empty() {
            out.push_str(&format!("[{}]\n", section));
        }
        for (key, value) in values {
            out.push_str(&format!("{} = {}\n", key, value));
        }
    }
    out
}
