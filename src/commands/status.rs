//! `vpnpulse status`: one cycle, printed instead of broadcast.

use anyhow::{Context, Result};
use clap::ArgMatches;
use std::fs;
use std::sync::Arc;

use crate::core::telemetry::{
    Broadcaster, CommandSource, CycleReport, FixedSource, MemoryStore, Poller, PollerConfig,
    StatusSource,
};
use crate::ui::print_snapshot;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = super::load_config(matches)?;
    if let Some(dir) = matches.get_one::<String>("config-dir") {
        config.config_dir = dir.clone();
    }
    let json_output = matches.get_flag("json");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let report = match matches.get_one::<String>("input") {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read status dump: {}", path))?;
            runtime.block_on(one_cycle(config.poller_config(), FixedSource::new(raw)))
        }
        None => {
            let source =
                CommandSource::new(config.status_command.clone(), config.command_timeout());
            runtime.block_on(one_cycle(config.poller_config(), source))
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&*report.snapshot)?);
    } else {
        print_snapshot(&report.snapshot);
        for issue in report.issues.iter().filter(|i| i.kind().is_alert()) {
            eprintln!("warning: {}", issue);
        }
    }

    Ok(())
}

async fn one_cycle<S: StatusSource + 'static>(config: PollerConfig, source: S) -> CycleReport {
    let mut poller = Poller::new(
        config,
        source,
        Arc::new(MemoryStore::new()),
        Broadcaster::default(),
    );
    poller.run_cycle().await
}
