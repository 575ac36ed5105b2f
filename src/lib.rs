//! ytdrop - Telegram bot for downloading YouTube videos and audio
//!
//! A user sends a link, picks a format from an inline keyboard and gets the
//! file back in the chat. Traffic is accounted per user in an external
//! profile service; users without a subscription are capped.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, traffic accounting and subscriptions
//! - `download`: media resolution, format catalog, fetching and muxing
//! - `storage`: profile service client
//! - `telegram`: link classification, prompts, delivery and dispatcher handlers

pub mod cli;
pub mod core;
pub mod download;
pub mod i18n;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use download::{MediaFetcher, VideoPlatform};
pub use storage::{ProfileClient, ProfileStore};
pub use telegram::{create_bot, schema, HandlerDeps, Orchestrator};
