use thiserror::Error;

/// Structured error type for download operations.
///
/// Resolution failures are never retried; the other variants describe a
/// single job and are mapped to a canned chat notice by the orchestrator.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Platform refused or failed to describe the media
    #[error("resolution failed: {0}")]
    Resolution(String),
    /// Estimated size is over the configured ceiling
    #[error("file too large: {estimated} bytes exceeds {limit} bytes")]
    TooLarge { estimated: u64, limit: u64 },
    /// Size could not be derived from the provider metadata
    #[error("size estimation failed: {0}")]
    Estimation(String),
    /// Track selection or ffmpeg failure while merging video and audio
    #[error("mux failed: {0}")]
    Mux(String),
    /// File extension has no matching send method
    #[error("unknown extension: {0}")]
    UnsupportedDeliveryFormat(String),
    /// Expected file not found after download
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// Byte transfer failed midway
    #[error("stream failed: {0}")]
    Stream(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Resolution(_) => "resolution",
            DownloadError::TooLarge { .. } => "too_large",
            DownloadError::Estimation(_) => "estimation",
            DownloadError::Mux(_) => "mux",
            DownloadError::UnsupportedDeliveryFormat(_) => "unsupported_format",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Stream(_) => "stream",
            DownloadError::Io(_) => "io",
        }
    }

    /// True when retrying the same request cannot succeed
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DownloadError::Resolution(_) | DownloadError::TooLarge { .. } | DownloadError::UnsupportedDeliveryFormat(_)
        )
    }
}
