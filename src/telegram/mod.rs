//! Telegram bot integration and handlers

pub mod bot;
pub mod classify;
pub mod delivery;
pub mod handlers;
pub mod keyboard;
pub mod messenger;
pub mod orchestrator;
pub mod selection;

/// Bot type used across handlers
pub type Bot = teloxide::Bot;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use messenger::{Messenger, TelegramMessenger};
pub use orchestrator::{Orchestrator, RequestContext};
