//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{Message, PreCheckoutQuery};

use super::commands::{handle_help_command, handle_start_command, handle_status_command};
use super::types::{context_from_callback, context_from_message, user_ref, HandlerDeps, HandlerError};
use crate::i18n;
use crate::storage::profile::PlanDuration;
use crate::telegram::bot::Command;
use crate::telegram::messenger::Messenger;
use crate::telegram::Bot;

/// Creates the dispatcher schema for the bot.
///
/// The same tree is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_payment = deps.clone();
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps.clone();

    dptree::entry()
        // Successful payment handler must be first
        .branch(successful_payment_handler(deps_payment))
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(pre_checkout_handler())
        .branch(callback_handler(deps_callback))
}

/// Handler for successful Telegram payments
fn successful_payment_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.successful_payment().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let (Some(payment), Some(from)) = (msg.successful_payment(), msg.from.as_ref()) else {
                    return Ok(());
                };
                let lang = i18n::lang_from_code(from.language_code.as_deref());
                let user = user_ref(from, msg.chat.id.0);
                log::info!(
                    "💳 Payment from {}: {} {} ({})",
                    user.username,
                    payment.total_amount,
                    payment.currency,
                    payment.invoice_payload
                );

                let Some(plan) = PlanDuration::from_payload(&payment.invoice_payload) else {
                    log::error!("Unknown payment payload {:?} from {}", payment.invoice_payload, user.username);
                    if let Err(e) = bot.send_message(msg.chat.id, i18n::t(&lang, "subscription-error")).await {
                        log::warn!("Failed to report payment error in chat {}: {}", msg.chat.id, e);
                    }
                    return Ok(());
                };

                let reply = match deps.ledger.activate_subscription(&user, plan, chrono::Utc::now()).await {
                    Ok(_) => "payment-thanks",
                    Err(e) => {
                        log::error!("Failed to activate {:?} subscription for {}: {}", plan, user.username, e);
                        "subscription-error"
                    }
                };
                if let Err(e) = bot.send_message(msg.chat.id, i18n::t(&lang, reply)).await {
                    log::warn!("Failed to confirm payment in chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

/// Handler for bot commands (/start, /help, /status)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                let result = match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await,
                    Command::Help => handle_help_command(&bot, &msg).await,
                    Command::Status => handle_status_command(&bot, &msg, &deps).await,
                };
                if let Err(e) = result {
                    log::error!("❌ {:?} failed in chat {}: {}", cmd, msg.chat.id, e);
                }
                Ok(())
            }
        },
    ))
}

/// Handler for regular text messages
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let (Some(text), Some(ctx)) = (msg.text(), context_from_message(&msg)) else {
                    return Ok(());
                };

                let ledger = deps.ledger.clone();
                let user = ctx.user.clone();
                tokio::spawn(async move {
                    if let Err(e) = ledger.ensure_user(&user).await {
                        log::warn!("Failed to ensure profile of {}: {}", user.username, e);
                    }
                });

                if !deps.orchestrator.handle_link(&ctx, text).await {
                    let reply = format!(
                        "{}\n\n{}",
                        i18n::t(&ctx.lang, "default-message"),
                        i18n::t(&ctx.lang, "help-message")
                    );
                    if let Err(e) = deps.orchestrator.messenger().send_text(ctx.chat, &reply).await {
                        log::warn!("Failed to answer chat {}: {}", ctx.chat.0, e);
                    }
                }
                Ok(())
            }
        })
}

/// Handler for pre-checkout queries (Telegram payments)
fn pre_checkout_handler() -> UpdateHandler<HandlerError> {
    Update::filter_pre_checkout_query().endpoint(|bot: Bot, query: PreCheckoutQuery| async move {
        log::info!("Received pre_checkout_query: id={}, payload={}", query.id, query.invoice_payload);

        let answer = if PlanDuration::from_payload(&query.invoice_payload).is_some() {
            bot.answer_pre_checkout_query(query.id.clone(), true).await
        } else {
            let lang = i18n::lang_from_code(query.from.language_code.as_deref());
            bot.answer_pre_checkout_query(query.id.clone(), false)
                .error_message(i18n::t(&lang, "unsupported-payment"))
                .await
        };
        if let Err(e) = answer {
            log::error!("Failed to answer pre_checkout_query: {:?}", e);
        }
        Ok(())
    })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
                log::warn!("Failed to answer callback query: {}", e);
            }

            let (Some(data), Some(ctx)) = (q.data.as_deref(), context_from_callback(&q)) else {
                log::warn!("Callback query {:?} without data or message", q.id);
                return Ok(());
            };
            let prompt = q.regular_message().and_then(|m| m.text());

            // The job reports its own outcome; the handle is not awaited here.
            let _job = deps.orchestrator.handle_selection(&ctx, data, prompt).await;
            Ok(())
        }
    })
}
