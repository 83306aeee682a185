//! Handler dependencies and the update-to-event translation

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatKind, MaybeInaccessibleMessage, Message};

use crate::conversation::event::{Event, Inbound, MessageRef, Selection};
use crate::conversation::Engine;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub engine: Arc<Engine>,
    pub bot_username: Option<String>,
}

impl HandlerDeps {
    pub fn new(engine: Arc<Engine>, bot_username: Option<String>) -> Self {
        Self { engine, bot_username }
    }
}

fn telegram_user_id(user: &teloxide::types::User) -> Option<i64> {
    i64::try_from(user.id.0).ok()
}

/// Recognises `/start`, `/start payload` and `/start@this_bot payload`.
///
/// A mention of another bot is not a start command.
fn parse_start(text: &str, bot_username: Option<&str>) -> Option<Event> {
    let trimmed = text.trim_start();
    let (command, rest) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
    let mention = command.strip_prefix("/start")?;
    let addressed_here = match mention.strip_prefix('@') {
        None => mention.is_empty(),
        Some(name) => bot_username.is_none_or(|bot| bot.eq_ignore_ascii_case(name)),
    };
    if !addressed_here {
        return None;
    }
    let payload = rest.trim();
    Some(Event::Start {
        payload: (!payload.is_empty()).then(|| payload.to_string()),
    })
}

/// Decodes the content of a message into an [`Event`].
pub fn event_from_message(msg: &Message, bot_username: Option<&str>) -> Event {
    if let Some(text) = msg.text() {
        if let Some(start) = parse_start(text, bot_username) {
            return start;
        }
        return Event::Text(text.to_string());
    }
    if let Some(contact) = msg.contact() {
        return Event::Contact {
            phone: contact.phone_number.clone(),
        };
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Event::Photo {
            file_id: photo.file.id.0.clone(),
            caption: msg.caption().map(str::to_string),
        };
    }
    if let Some(document) = msg.document() {
        return Event::Document {
            file_id: document.file.id.0.clone(),
            caption: msg.caption().map(str::to_string),
        };
    }
    Event::Unsupported
}

/// Builds an inbound event from a private message or a message in the staff chat.
///
/// Messages without a sender and messages from other group chats yield `None`.
pub fn inbound_from_message(msg: &Message, bot_username: Option<&str>, admin_chat_id: i64) -> Option<Inbound> {
    let from = msg.from.as_ref()?;
    if from.is_bot {
        return None;
    }
    let chat_id = msg.chat.id.0;
    let private = matches!(msg.chat.kind, ChatKind::Private(_));
    if !private && (admin_chat_id == 0 || chat_id != admin_chat_id) {
        return None;
    }

    Some(Inbound {
        user_id: telegram_user_id(from)?,
        chat_id,
        username: from.username.clone(),
        full_name: from.full_name(),
        reply_to: msg
            .reply_to_message()
            .and_then(|reply| reply.text().or_else(|| reply.caption()))
            .map(str::to_string),
        event: event_from_message(msg, bot_username),
    })
}

/// Builds an inbound selection event from a button press.
pub fn inbound_from_callback(q: &CallbackQuery) -> Option<Inbound> {
    let user_id = telegram_user_id(&q.from)?;
    let message = q.message.as_ref().map(|m: &MaybeInaccessibleMessage| MessageRef {
        chat_id: m.chat().id.0,
        message_id: m.id().0,
    });

    Some(Inbound {
        user_id,
        chat_id: message.map_or(user_id, |m| m.chat_id),
        username: q.from.username.clone(),
        full_name: q.from.full_name(),
        reply_to: None,
        event: Event::Selection {
            id: q.id.0.clone(),
            selection: Selection::parse(q.data.as_deref().unwrap_or_default()),
            message,
        },
    })
}
