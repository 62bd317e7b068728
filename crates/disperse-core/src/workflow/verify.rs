//! Running the pre-dist and verify commands

use std::path::Path;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::VerificationError;

/// Run `command` through `sh -c` in `cwd`
pub async fn run_command(command: &str, cwd: &Path) -> Result<(), VerificationError> {
    info!(command, cwd = %cwd.display(), "running command");
    let start = Instant::now();
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| VerificationError::SpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
    debug!(
        command,
        duration_ms = start.elapsed().as_millis() as u64,
        success = status.success(),
        "command finished"
    );
    if !status.success() {
        return Err(VerificationError::CommandFailed {
            command: command.to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}
