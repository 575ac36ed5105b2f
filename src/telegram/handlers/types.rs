//! Handler types, dependencies, and request context helpers

use std::sync::Arc;

use teloxide::types::{CallbackQuery, Message, User};

use crate::core::traffic::{TrafficLedger, UserRef};
use crate::i18n;
use crate::telegram::messenger::{ChatRef, MessageRef};
use crate::telegram::orchestrator::{Orchestrator, RequestContext};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub orchestrator: Orchestrator,
    pub ledger: Arc<TrafficLedger>,
}

impl HandlerDeps {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let ledger = Arc::clone(orchestrator.ledger());
        Self { orchestrator, ledger }
    }
}

/// Profile key of a Telegram user: the @username, or `id<telegram id>`
/// for accounts without one
pub fn profile_username(user: &User) -> String {
    user.username.clone().unwrap_or_else(|| format!("id{}", user.id.0))
}

pub fn user_ref(user: &User, chat_id: i64) -> UserRef {
    UserRef::new(profile_username(user), chat_id)
}

/// Context for replies to a user message
pub fn context_from_message(msg: &Message) -> Option<RequestContext> {
    let from = msg.from.as_ref()?;
    Some(RequestContext {
        chat: ChatRef(msg.chat.id.0),
        message: MessageRef(msg.id.0),
        user: user_ref(from, msg.chat.id.0),
        lang: i18n::lang_from_code(from.language_code.as_deref()),
    })
}

/// Context for a button press; replies go to the prompt message
pub fn context_from_callback(q: &CallbackQuery) -> Option<RequestContext> {
    let prompt = q.regular_message()?;
    Some(RequestContext {
        chat: ChatRef(prompt.chat.id.0),
        message: MessageRef(prompt.id.0),
        user: user_ref(&q.from, prompt.chat.id.0),
        lang: i18n::lang_from_code(q.from.language_code.as_deref()),
    })
}
