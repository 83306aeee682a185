//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{inbound_from_callback, inbound_from_message, HandlerDeps, HandlerError};
use crate::conversation::event::Inbound;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Every update is translated into an [`Inbound`] event and handed to the
/// dialogue engine. Failures are logged and swallowed so one bad update never
/// stops the dispatcher.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

async fn dispatch(deps: &HandlerDeps, inbound: Inbound) {
    let user_id = inbound.user_id;
    if let Err(e) = deps.engine.handle(inbound).await {
        if e.is_delivery() {
            log::warn!("Delivery failed while handling update from {}: {}", user_id, e);
        } else {
            log::error!("Failed to handle update from {}: {}", user_id, e);
        }
    }
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |msg: Message| {
        let deps = deps.clone();
        async move {
            let admin_chat_id = deps.engine.settings().admin_chat_id;
            match inbound_from_message(&msg, deps.bot_username.as_deref(), admin_chat_id) {
                Some(inbound) => dispatch(&deps, inbound).await,
                None => log::debug!("Skipping message {} in chat {}", msg.id.0, msg.chat.id.0),
            }
            Ok(())
        }
    })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            match inbound_from_callback(&q) {
                Some(inbound) => dispatch(&deps, inbound).await,
                None => log::debug!("Skipping callback {}", q.id.0),
            }
            Ok(())
        }
    })
}
