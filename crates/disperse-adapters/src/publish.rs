//! Running the external build and upload tools

use std::ffi::OsStr;
use std::path::Path;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

/// Last lines of a tool's stderr, enough to explain a failure
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(5)..].join("\n")
}

/// Run `program args…` in `cwd`; the error is a human-readable reason
pub(crate) async fn run_tool<I, S>(
    program: &str,
    args: I,
    cwd: &Path,
    envs: &[(&str, String)],
) -> Result<(), String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd).kill_on_drop(true);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    let output = cmd
        .output()
        .await
        .map_err(|e| format!("unable to run {program}: {e}"))?;
    debug!(
        program,
        duration_ms = start.elapsed().as_millis() as u64,
        success = output.status.success(),
        "tool finished"
    );
    if !output.status.success() {
        let tail = stderr_tail(&output.stderr);
        return Err(if tail.is_empty() {
            format!("{program} exited with {}", output.status)
        } else {
            format!("{program} exited with {}: {tail}", output.status)
        });
    }
    info!(program, "tool succeeded");
    Ok(())
}
