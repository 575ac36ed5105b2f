//! Merging a silent video track with an audio track.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::config;
use crate::core::process::{run_with_timeout, stderr_summary};
use crate::download::error::DownloadError;

#[async_trait]
pub trait Muxer: Send + Sync {
    /// Writes `output` from `video` and `audio` without re-encoding.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError>;
}

/// Stream copy through the ffmpeg binary
pub struct FfmpegMuxer {
    bin: String,
    timeout: Duration,
}

impl FfmpegMuxer {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    pub fn from_config() -> Self {
        Self::new(config::FFMPEG_BIN.as_str(), config::download::mux_timeout())
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        log::info!(
            "🎞️ Muxing {} + {} -> {}",
            video.display(),
            audio.display(),
            output.display()
        );

        let mut cmd = Command::new(&self.bin);
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c", "copy", "-shortest"])
            .arg(output)
            .args(["-loglevel", "warning"]);

        let output_result = run_with_timeout(&mut cmd, self.timeout)
            .await
            .map_err(|e| DownloadError::Mux(format!("{} failed to run: {}", self.bin, e)))?;

        if !output_result.status.success() {
            return Err(DownloadError::Mux(stderr_summary(&output_result)));
        }
        Ok(())
    }
}
