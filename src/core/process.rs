//! Process execution utilities with timeout support
//!
//! Provides helpers for running yt-dlp and ffmpeg with configurable timeouts
//! so a hung child cannot block a download job forever.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::download::error::DownloadError;

/// Run an async Command with a timeout.
///
/// The child is killed when the timeout fires (`kill_on_drop`).
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, DownloadError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(DownloadError::Io(e)),
        Err(_) => Err(DownloadError::Stream(format!(
            "Process timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Last non-empty stderr line, used as the error message of a failed child
pub fn stderr_summary(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("exited with {}", output.status))
}
