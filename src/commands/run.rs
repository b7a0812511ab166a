//! `vpnpulse run`: poll loop plus WebSocket feed until Ctrl-C.

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::core::telemetry::{feed, Broadcaster, CommandSource, Poller, SqliteStore};
use crate::core::Config;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = super::load_config(matches)?;
    apply_overrides(&mut config, matches);

    // Poller and feed share a small dedicated worker pool
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("vpnpulse-worker")
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve(config))
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.poll_interval_secs = *interval;
    }
    if let Some(listen) = matches.get_one::<String>("listen") {
        config.listen_addr = listen.clone();
    }
    if let Some(dir) = matches.get_one::<String>("config-dir") {
        config.config_dir = dir.clone();
    }
    if let Some(db) = matches.get_one::<String>("db") {
        config.database_path = db.clone();
    }
}

async fn serve(config: Config) -> Result<()> {
    let store = SqliteStore::open(Path::new(&config.database_path))
        .with_context(|| format!("Failed to open sample store {}", config.database_path))?;

    let listener = feed::bind(&config.listen_addr).await?;

    let broadcaster = Broadcaster::new(config.subscriber_buffer);
    let source = CommandSource::new(config.status_command.clone(), config.command_timeout());
    let poller = Poller::new(
        config.poller_config(),
        source,
        Arc::new(store),
        broadcaster.clone(),
    );

    let handle = poller.spawn();
    let shutdown_tx = handle.shutdown_sender();

    let ctrlc_tx = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    println!(
        "{} polling `{}` every {}s, feed on ws://{}",
        "vpnpulse".bold().bright_cyan(),
        config.status_command.join(" "),
        config.poll_interval().as_secs(),
        config.listen_addr
    );
    println!("{}", "Press Ctrl-C to stop.".dimmed());

    feed::serve(listener, broadcaster, handle.latest(), shutdown_tx.subscribe()).await;
    handle.join().await;

    println!("{}", "Stopped.".green());
    Ok(())
}
