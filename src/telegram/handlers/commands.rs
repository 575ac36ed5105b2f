//! Command handler implementations (/start, /help, /status)

use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{context_from_message, HandlerDeps, HandlerError};
use crate::core::subscription::status_text;
use crate::i18n;
use crate::telegram::Bot;

/// Handle /start command
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(ctx) = context_from_message(msg) else {
        return Ok(());
    };

    match deps.ledger.ensure_user(&ctx.user).await {
        Ok(true) => log::info!("👤 New user {} (chat {})", ctx.user.username, ctx.chat.0),
        Ok(false) => {}
        Err(e) => log::warn!("Failed to ensure profile of {}: {}", ctx.user.username, e),
    }

    bot.send_message(msg.chat.id, i18n::t(&ctx.lang, "start-message")).await?;
    Ok(())
}

/// Handle /help command
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let lang = i18n::lang_from_code(msg.from.as_ref().and_then(|u| u.language_code.as_deref()));
    bot.send_message(msg.chat.id, i18n::t(&lang, "help-message")).await?;
    Ok(())
}

/// Handle /status command
pub(super) async fn handle_status_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(ctx) = context_from_message(msg) else {
        return Ok(());
    };

    let record = match deps.ledger.user_record(&ctx.user).await {
        Ok(record) => record,
        Err(e) => {
            log::warn!("Status lookup for {} failed: {}", ctx.user.username, e);
            None
        }
    };
    bot.send_message(msg.chat.id, status_text(&ctx.lang, record.as_ref())).await?;
    Ok(())
}
