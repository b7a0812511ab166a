// Command handlers module
pub mod config;
pub mod history;
pub mod run;
pub mod status;

use anyhow::Result;
use clap::ArgMatches;
use std::path::Path;

use crate::core::Config;

/// Load the config named by the global `--config` flag, or the default file
pub fn load_config(matches: &ArgMatches) -> Result<Config> {
    match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(Path::new(path)),
        None => Config::load(),
    }
}
