//! Configuration constants for the bot

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN, TELEGRAM_BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELEGRAM_BOT_TOKEN"))
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Local Bot API server, if any
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary path used for muxing separate video and audio tracks
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// Download folder path
/// Read from DOWNLOAD_DIR environment variable, defaults to "download"
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_DIR: Lazy<String> = Lazy::new(|| {
    let raw = env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "download".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Base URL of the user profile service
/// Read from PROFILE_SERVICE_URL, falls back to DB_URL
pub static PROFILE_SERVICE_URL: Lazy<String> = Lazy::new(|| {
    env::var("PROFILE_SERVICE_URL")
        .or_else(|_| env::var("DB_URL"))
        .unwrap_or_else(|_| "https://localhost:8443".to_string())
});

/// Bearer token presented to the profile service
/// Read from PROFILE_SERVICE_TOKEN, falls back to the bot token
pub static PROFILE_SERVICE_TOKEN: Lazy<String> =
    Lazy::new(|| env::var("PROFILE_SERVICE_TOKEN").unwrap_or_else(|_| BOT_TOKEN.clone()));

/// PEM certificate trusted when talking to the profile service
/// Missing file means the system roots are used as-is
pub static PROFILE_CERT_PATH: Lazy<String> = Lazy::new(|| {
    let raw = env::var("PROFILE_CERT_PATH").unwrap_or_else(|_| "cert.pem".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// Size and quota limits
pub mod limits {
    /// Largest file the bot will try to fetch (2 GiB)
    pub const MAX_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

    /// Lifetime traffic ceiling for users without an active subscription
    pub const TRAFFIC_LIMIT_MB: f64 = 5000.0;

    /// Telegram callback data ceiling
    pub const CALLBACK_DATA_MAX_BYTES: usize = 64;

    /// Playlist entries offered in one prompt
    pub const MAX_PLAYLIST_ITEMS: usize = 50;
}

/// Profile service call bounds
pub mod profile {
    use super::Duration;

    /// Single quota lookup or traffic update (in seconds)
    pub const CALL_TIMEOUT_SECS: u64 = 60;

    /// Subscription update after a payment (in seconds)
    pub const PAYMENT_TIMEOUT_SECS: u64 = 120;

    /// reqwest client timeout (in seconds)
    pub const HTTP_TIMEOUT_SECS: u64 = 20;

    pub fn call_timeout() -> Duration {
        Duration::from_secs(CALL_TIMEOUT_SECS)
    }

    pub fn payment_timeout() -> Duration {
        Duration::from_secs(PAYMENT_TIMEOUT_SECS)
    }

    pub fn http_timeout() -> Duration {
        Duration::from_secs(HTTP_TIMEOUT_SECS)
    }
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// yt-dlp metadata extraction timeout (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 240;

    /// ffmpeg stream copy timeout (in seconds)
    pub const MUX_TIMEOUT_SECS: u64 = 600;

    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }

    pub fn mux_timeout() -> Duration {
        Duration::from_secs(MUX_TIMEOUT_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Telegram request timeout (in seconds); uploads of large files need room
    pub const TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}
