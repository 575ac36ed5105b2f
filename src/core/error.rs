use thiserror::Error;

use crate::download::error::DownloadError;
use crate::storage::profile::ProfileError;
use crate::telegram::selection::SelectionError;

/// Centralized error types for the application
///
/// Every layer has its own error enum; they all convert into this one so
/// handlers can log with `?`-propagated context and pick a user-facing notice.
///
/// # Example
///
/// ```no_run
/// use ytdrop::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Resolution, fetch, mux and delivery failures
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// User profile service failures
    #[error("Profile service error: {0}")]
    Profile(#[from] ProfileError),

    /// Malformed or oversized callback data
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
