//! Child-process invocation helpers: quiet levels capture stdout/stderr and
//! fold them into the error message, while verbose levels stream output
//! live. All SCM and compiler invocations in this workspace route through
//! here so exit-code failures are reported uniformly.

use anyhow::{ensure, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Runs `cmd`, capturing output when the active trace level is quieter than
/// `DEBUG`, streaming it live otherwise.
pub async fn exec_log(cmd: &mut Command) -> Result<()> {
    let quiet = !tracing::enabled!(tracing::Level::DEBUG);
    exec(cmd, quiet).await
}

/// Runs `cmd`. When `quiet` is true, stdout/stderr are captured and only
/// surfaced in the error message on failure; otherwise they stream directly
/// to the parent's stdout/stderr.
pub async fn exec(cmd: &mut Command, quiet: bool) -> Result<()> {
    debug!(?cmd, "running command");
    if quiet {
        let output = cmd.output().await.context("unable to start command")?;
        ensure!(
            output.status.success(),
            "command was unsuccessful, exit code {}:\n{}\n{}",
            output.status.code().unwrap_or(1),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    } else {
        let status = cmd.status().await.context("unable to start command")?;
        ensure!(
            status.success(),
            "command was unsuccessful, exit code {}",
            status.code().unwrap_or(1),
        );
    }
    Ok(())
}

/// Runs `cmd` and returns its captured stdout, regardless of log level.
/// Used where the caller needs the output (e.g. resolving a default branch
/// name) rather than just a pass/fail result.
pub async fn exec_capture(cmd: &mut Command) -> Result<String> {
    debug!(?cmd, "running command (capturing output)");
    let output = cmd.output().await.context("unable to start command")?;
    ensure!(
        output.status.success(),
        "command was unsuccessful, exit code {}:\n{}\n{}",
        output.status.code().unwrap_or(1),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
