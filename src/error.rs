use std::io;
use thiserror::Error;

/// Custom error type for the telemetry pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sample store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Status command missing, denied, timed out or exited non-zero
    #[error("Status source unavailable: {0}")]
    SourceUnavailable(String),

    /// One status line failed structural parsing
    #[error("Malformed status record (line {line}): {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Virtual IP without a matching peer-config artifact
    #[error("No client identity for virtual IP {0}")]
    IdentityUnresolved(String),

    #[error("Counter regression for {client}: rx {prev_rx} -> {rx}, tx {prev_tx} -> {tx}")]
    CounterRegression {
        client: String,
        prev_rx: u64,
        rx: u64,
        prev_tx: u64,
        tx: u64,
    },

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the telemetry pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], so callers can alert on some
/// conditions and silently skip others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceUnavailable,
    MalformedRecord,
    IdentityUnresolved,
    CounterRegression,
    Persistence,
    Internal,
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        Error::SourceUnavailable(msg.into())
    }

    pub fn malformed<S: Into<String>>(line: usize, reason: S) -> Self {
        Error::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Error::Persistence(msg.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Error::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Error::IdentityUnresolved(_) => ErrorKind::IdentityUnresolved,
            Error::CounterRegression { .. } => ErrorKind::CounterRegression,
            Error::Persistence(_) | Error::Store(_) => ErrorKind::Persistence,
            _ => ErrorKind::Internal,
        }
    }
}

impl ErrorKind {
    /// Whether the condition deserves an operator's attention.
    ///
    /// Unresolved identities, dropped lines and counter regressions are part
    /// of normal operation; an unavailable source or a failing store is not.
    pub fn is_alert(self) -> bool {
        matches!(
            self,
            ErrorKind::SourceUnavailable | ErrorKind::Persistence | ErrorKind::Internal
        )
    }
}
