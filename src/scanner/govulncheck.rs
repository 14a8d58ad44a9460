use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Longest stretch of stderr carried into an error message.
const MAX_STDERR: usize = 2000;

/// Runs the `govulncheck` binary in JSON mode.
#[derive(Debug, Clone)]
pub struct Govulncheck {
    binary: PathBuf,
    timeout: Duration,
    /// `go` binary used to tidy a project before scanning, if enabled.
    tidy_with: Option<String>,
}

impl Govulncheck {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            tidy_with: None,
        }
    }

    /// Runs `<go> mod tidy` in [`prepare`](super::VulnScanner::prepare).
    pub fn with_tidy(mut self, go_binary: impl Into<String>) -> Self {
        self.tidy_with = Some(go_binary.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl super::VulnScanner for Govulncheck {
    fn name(&self) -> &str {
        "govulncheck"
    }

    async fn prepare(&self, dir: &Path) -> Result<()> {
        let Some(go) = self.tidy_with.as_deref() else {
            return Ok(());
        };
        info!(dir = %dir.display(), "running go mod tidy");
        run_command(go, ["mod", "tidy"], Some(dir), self.timeout).await?;
        Ok(())
    }

    async fn scan(&self, dir: &Path) -> Result<String> {
        info!(dir = %dir.display(), "running govulncheck");
        let args = [OsStr::new("-json"), OsStr::new("-C"), dir.as_os_str(), OsStr::new("./...")];
        run_command(self.binary.as_os_str(), args, None, self.timeout).await
    }
}

/// Runs `program` to completion within `timeout` and returns its stdout.
///
/// The child is killed if the deadline passes or the future is dropped.
pub async fn run_command<I, S>(
    program: impl AsRef<OsStr>,
    args: I,
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program.as_ref());
    command.args(args).kill_on_drop(true);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    let shown = format!("{:?}", command.as_std());
    debug!(command = %shown, "spawning");

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(Error::Scanner {
                command: shown,
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(Error::ScannerTimeout {
                command: shown,
                secs: timeout.as_secs(),
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let cut = stderr
            .char_indices()
            .nth(MAX_STDERR)
            .map_or(stderr.len(), |(idx, _)| idx);
        return Err(Error::Scanner {
            command: shown,
            reason: format!("{} - {}", output.status, &stderr[..cut]),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
