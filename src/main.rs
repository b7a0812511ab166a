use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use vpnpulse::commands;

fn cli() -> Command {
    Command::new("vpnpulse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live WireGuard peer telemetry with traffic logging and a WebSocket feed")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Use this configuration file instead of the default one")
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Poll the status source and serve the live feed until Ctrl-C")
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECONDS")
                        .help("Seconds between poll cycles")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("listen")
                        .short('l')
                        .long("listen")
                        .value_name("ADDR")
                        .help("Address for the WebSocket feed (e.g. 0.0.0.0:8765)"),
                )
                .arg(
                    Arg::new("config-dir")
                        .long("config-dir")
                        .value_name("DIR")
                        .help("Directory with one <client>.conf per peer"),
                )
                .arg(
                    Arg::new("db")
                        .long("db")
                        .value_name("FILE")
                        .help("SQLite file for traffic samples"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Run a single poll cycle and print the result")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the snapshot as JSON")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .value_name("FILE")
                        .help("Parse a saved status dump instead of running the status command"),
                )
                .arg(
                    Arg::new("config-dir")
                        .long("config-dir")
                        .value_name("DIR")
                        .help("Directory with one <client>.conf per peer"),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("Show recorded traffic samples")
                .arg(
                    Arg::new("client")
                        .long("client")
                        .value_name("NAME")
                        .help("Only show samples for this client"),
                )
                .arg(
                    Arg::new("hours")
                        .long("hours")
                        .value_name("N")
                        .help("How far back to look")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("24"),
                )
                .arg(
                    Arg::new("db")
                        .long("db")
                        .value_name("FILE")
                        .help("SQLite file for traffic samples"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print rows as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create the configuration file")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the configuration file path"))
                .subcommand(
                    Command::new("init")
                        .about("Write a configuration file with default values")
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .help("Overwrite an existing file")
                                .action(ArgAction::SetTrue),
                        ),
                ),
        )
}

fn main() -> Result<()> {
    vpnpulse::init_logging();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub_matches)) => commands::run::execute(sub_matches),
        Some(("status", sub_matches)) => commands::status::execute(sub_matches),
        Some(("history", sub_matches)) => commands::history::execute(sub_matches),
        Some(("config", sub_matches)) => commands::config::execute(sub_matches),
        _ => {
            println!("Use 'vpnpulse --help' for more information.");
            Ok(())
        }
    }
}
