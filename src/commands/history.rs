use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::Path;

use crate::core::telemetry::SqliteStore;
use crate::ui::print_history;

const SECONDS_PER_HOUR: i64 = 3600;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = super::load_config(matches)?;
    if let Some(db) = matches.get_one::<String>("db") {
        config.database_path = db.clone();
    }

    let hours = matches.get_one::<u64>("hours").copied().unwrap_or(24);
    let client = matches.get_one::<String>("client").map(String::as_str);

    let store = SqliteStore::open(Path::new(&config.database_path))
        .with_context(|| format!("Failed to open sample store {}", config.database_path))?;

    let hours_secs = i64::try_from(hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(SECONDS_PER_HOUR);
    let since = chrono::Utc::now().timestamp().saturating_sub(hours_secs);
    let rows = store.query(client, since)?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_history(&rows, hours);
    }

    Ok(())
}
