use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;
use tokio::time::sleep;

use ytdrop::cli::{Cli, Commands};
use ytdrop::core::cleanup::{clear_directory, clear_download_dirs};
use ytdrop::core::traffic::LedgerSettings;
use ytdrop::core::{config, init_logger, log_startup_configuration, TrafficLedger};
use ytdrop::download::catalog::build_catalog;
use ytdrop::download::{FetcherSettings, FfmpegMuxer, MediaFetcher, VideoPlatform, YtDlpPlatform};
use ytdrop::storage::ProfileClient;
use ytdrop::telegram::classify::classify;
use ytdrop::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, Orchestrator, TelegramMessenger};

const MAX_DISPATCHER_RESTARTS: u32 = 5;

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, profile client, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up global panic handler to catch panics in dispatcher
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) => run_bot().await,
        Some(Commands::Formats { url }) => run_cli_formats(url).await,
        Some(Commands::Clean { root }) => run_cli_clean(root),
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot().await
        }
    }
}

/// Removes leftovers of jobs that died with the previous process
fn startup_cleanup(root: &Path) {
    match clear_download_dirs(root) {
        Ok(report) => log::info!(
            "🧹 Startup cleanup: {} entries removed from {} download dirs",
            report.removed_entries,
            report.directories
        ),
        Err(e) => log::warn!("Startup cleanup of {} failed: {}", root.display(), e),
    }

    let configured = Path::new(config::DOWNLOAD_DIR.as_str());
    if configured.is_dir() {
        let removed = clear_directory(configured);
        if removed > 0 {
            log::info!("🧹 Removed {} entries from {}", removed, configured.display());
        }
    }
}

fn run_cli_clean(root: Option<PathBuf>) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let report = clear_download_dirs(&root)?;
    println!(
        "Removed {} entries from {} download directories under {}",
        report.removed_entries,
        report.directories,
        root.display()
    );
    Ok(())
}

/// Prints what the format prompt would offer for `url`
async fn run_cli_formats(url: String) -> Result<()> {
    let url = classify(&url).map(|link| link.url().to_string()).unwrap_or(url);
    let platform = YtDlpPlatform::from_config();
    let source = platform
        .resolve_video(&url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to resolve {}: {}", url, e))?;

    println!("{} ({})", source.title, source.url);
    for entry in build_catalog(&source) {
        let mux = if entry.encoding.needs_mux() { "  [mux]" } else { "" };
        println!("  {:>4}  {}{}", entry.encoding.tag, entry.label, mux);
    }
    Ok(())
}

async fn run_bot() -> Result<()> {
    log_startup_configuration();
    startup_cleanup(&std::env::current_dir()?);

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let fetcher = Arc::new(MediaFetcher::new(
        Arc::new(YtDlpPlatform::from_config()),
        Arc::new(FfmpegMuxer::from_config()),
        FetcherSettings::from_config(),
    ));
    let profiles = ProfileClient::from_config().map_err(|e| anyhow::anyhow!("Profile client: {}", e))?;
    let ledger = Arc::new(TrafficLedger::new(Arc::new(profiles), LedgerSettings::from_config()));
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));

    let orchestrator = Orchestrator::new(messenger, fetcher, ledger);
    let handler = schema(HandlerDeps::new(orchestrator));

    log::info!("================================================");
    log::info!("📡 Starting bot in long polling mode");
    log::info!("================================================");

    // Run the dispatcher with retry logic
    let mut restarts = 0;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Dispatcher runs in its own task so a panic surfaces as a JoinError
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if restarts < MAX_DISPATCHER_RESTARTS => {
                restarts += 1;
                let delay = Duration::from_secs(2u64.pow(restarts));
                log::error!(
                    "Dispatcher stopped: {}. Restart {}/{} in {}s",
                    join_err,
                    restarts,
                    MAX_DISPATCHER_RESTARTS,
                    delay.as_secs()
                );
                sleep(delay).await;
            }
            Err(join_err) => {
                return Err(anyhow::anyhow!(
                    "Dispatcher failed {} times, giving up: {}",
                    restarts + 1,
                    join_err
                ));
            }
        }
    }

    Ok(())
}
