// ── Reload hook ──
//
// Runs the configured command after artifacts change so the shaper picks
// up the new tables (LibreQoS `--updateonly`, a systemctl reload, ...).

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::CoreError;

/// An argv to run after each artifact change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadHook {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ReloadHook {
    /// `None` when the argv is empty.
    pub fn from_argv(argv: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    /// Run the command to completion. A non-zero exit, a spawn failure or
    /// a timeout is an error; stdout/stderr are logged at debug level.
    pub async fn run(&self) -> Result<(), CoreError> {
        debug!(program = %self.program, args = ?self.args, "running reload command");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::ReloadHook {
                message: format!("cannot start {}: {e}", self.program),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CoreError::ReloadHook {
                message: format!("{} timed out after {}s", self.program, self.timeout.as_secs()),
            })?
            .map_err(|e| CoreError::ReloadHook {
                message: format!("{} failed: {e}", self.program),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(stdout = %stdout.trim(), stderr = %stderr.trim(), "reload command output");

        if !output.status.success() {
            return Err(CoreError::ReloadHook {
                message: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }
        info!(program = %self.program, "shaper reloaded");
        Ok(())
    }
}
