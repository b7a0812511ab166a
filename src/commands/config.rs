use anyhow::{bail, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::PathBuf;

use crate::core::Config;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", sub_matches)) => show(sub_matches),
        Some(("path", sub_matches)) => {
            println!("{}", target_path(sub_matches)?.display());
            Ok(())
        }
        Some(("init", sub_matches)) => init(sub_matches),
        _ => {
            println!("Use 'vpnpulse config --help' for more information.");
            Ok(())
        }
    }
}

fn target_path(matches: &ArgMatches) -> Result<PathBuf> {
    match matches.get_one::<String>("config") {
        Some(path) => Ok(PathBuf::from(path)),
        None => Config::get_config_path(),
    }
}

fn show(matches: &ArgMatches) -> Result<()> {
    let path = target_path(matches)?;
    let config = Config::load_from(&path)?;

    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, defaults)", path.display())
    };
    println!("{} {}", "Config:".bold(), source.dimmed());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn init(matches: &ArgMatches) -> Result<()> {
    let path = target_path(matches)?;
    if path.exists() && !matches.get_flag("force") {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save_to(&path)?;
    println!(
        "{} {}",
        "✓ Wrote default configuration to".green(),
        path.display()
    );
    Ok(())
}
