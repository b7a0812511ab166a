// UI and formatting module

pub mod formatters;
pub mod status_formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{format_bytes, format_timestamp, parse_size};
pub use status_formatters::{print_history, print_snapshot};
