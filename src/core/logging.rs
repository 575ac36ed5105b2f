//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at startup. Secrets are never printed.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Startup configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::BOT_TOKEN.is_empty() {
        log::error!("❌ BOT_TOKEN is not set, Telegram requests will fail");
    } else {
        log::info!("✅ BOT_TOKEN: set");
    }

    log::info!("🔗 Profile service: {}", *config::PROFILE_SERVICE_URL);
    let cert = Path::new(config::PROFILE_CERT_PATH.as_str());
    if cert.exists() {
        log::info!("✅ Profile certificate: {}", cert.display());
    } else {
        log::warn!(
            "⚠️  Profile certificate {} not found, using system roots only",
            cert.display()
        );
    }

    log::info!("📁 Download dir: {}", *config::DOWNLOAD_DIR);
    log::info!("🎬 yt-dlp: {}", *config::YTDL_BIN);
    log::info!("🎞️  ffmpeg: {}", *config::FFMPEG_BIN);
    log::info!(
        "📏 Limits: {} MB per file, {} MB traffic per plan",
        config::limits::MAX_FILE_SIZE_BYTES / (1024 * 1024),
        config::limits::TRAFFIC_LIMIT_MB
    );
}
