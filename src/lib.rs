// vpnpulse Library - Public API

// Re-export error types
pub mod error;
pub use error::{Error, ErrorKind, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod ui;

// Re-export commonly used types
pub use core::config::Config;

// Initialize logging: `Info` unless RUST_LOG says otherwise
pub fn init_logging() {
    logging_builder(env_logger::Env::default()).init();
}

fn logging_builder(env: env_logger::Env<'_>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .parse_env(env);
    builder
}
