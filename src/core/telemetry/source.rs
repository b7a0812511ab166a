//! Status sources: where each cycle's raw peer listing comes from.

use std::future::Future;
use std::io::ErrorKind as IoErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Produces the raw status text once per cycle.
///
/// Every failure is reported as [`Error::SourceUnavailable`] so the poll
/// loop can degrade to an empty cycle instead of stopping.
pub trait StatusSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Runs an external command (normally `wg show all dump`) and captures stdout
#[derive(Debug, Clone)]
pub struct CommandSource {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

impl StatusSource for CommandSource {
    async fn fetch(&self) -> Result<String> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(Error::source_unavailable("no status command configured"));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(Error::source_unavailable(format!(
                    "{} did not finish within {:?}",
                    program, self.timeout
                )))
            }
            Ok(Err(e)) if e.kind() == IoErrorKind::NotFound => {
                return Err(Error::source_unavailable(format!("{} not found", program)))
            }
            Ok(Err(e)) if e.kind() == IoErrorKind::PermissionDenied => {
                return Err(Error::source_unavailable(format!(
                    "permission denied running {}",
                    program
                )))
            }
            Ok(Err(e)) => {
                return Err(Error::source_unavailable(format!(
                    "failed to run {}: {}",
                    program, e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::source_unavailable(format!(
                "{} exited with {}: {}",
                self.command_line(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Serves a captured listing, e.g. a saved dump passed on the command line
#[derive(Debug, Clone, Default)]
pub struct FixedSource {
    raw: Option<String>,
}

impl FixedSource {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    /// A source that always fails, for exercising the degraded path
    pub fn unavailable() -> Self {
        Self { raw: None }
    }
}

impl StatusSource for FixedSource {
    async fn fetch(&self) -> Result<String> {
        self.raw
            .clone()
            .ok_or_else(|| Error::source_unavailable("fixed source has no data"))
    }
}
