//! Messenger that records every outbound call instead of talking to Telegram
//!
//! Chats can be marked as failing to simulate users who blocked the bot, and
//! channel membership is answered from an in-memory set.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use coursebot::conversation::event::MessageRef;
use coursebot::conversation::menu::Keyboard;
use coursebot::conversation::outbound::Messenger;
use coursebot::core::error::{AppError, AppResult};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Html {
        chat_id: i64,
        html: String,
    },
    Photo {
        chat_id: i64,
        file_id: String,
        caption: Option<String>,
        keyboard: Option<Keyboard>,
    },
    Document {
        chat_id: i64,
        file_id: String,
        caption: Option<String>,
    },
    Edit {
        message: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    ClearActions(MessageRef),
    Answer {
        selection_id: String,
        text: Option<String>,
    },
}

impl Sent {
    /// Chat a message-like call went to; `None` for acknowledgements.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Sent::Text { chat_id, .. }
            | Sent::Html { chat_id, .. }
            | Sent::Photo { chat_id, .. }
            | Sent::Document { chat_id, .. } => Some(*chat_id),
            Sent::Edit { message, .. } | Sent::ClearActions(message) => Some(message.chat_id),
            Sent::Answer { .. } => None,
        }
    }

    /// Visible text of the call, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text),
            Sent::Html { html, .. } => Some(html),
            Sent::Photo { caption, .. } | Sent::Document { caption, .. } => caption.as_deref(),
            Sent::Answer { text, .. } => text.as_deref(),
            Sent::ClearActions(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    next_message_id: AtomicI32,
    failing_chats: Mutex<HashSet<i64>>,
    channel_members: Mutex<HashSet<i64>>,
    membership_errors: Mutex<HashSet<i64>>,
    absent_users: Mutex<HashSet<i64>>,
    broken_chats: Mutex<HashSet<i64>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI32::new(100),
            ..Self::default()
        }
    }

    /// Sends to this chat fail with a delivery error.
    pub fn fail_for(&self, chat_id: i64) {
        self.failing_chats.lock().expect("lock").insert(chat_id);
    }

    pub fn add_channel_member(&self, user_id: i64) {
        self.channel_members.lock().expect("lock").insert(user_id);
    }

    /// Membership lookups for this user fail.
    pub fn fail_membership_for(&self, user_id: i64) {
        self.membership_errors.lock().expect("lock").insert(user_id);
    }

    /// Membership lookups for this user fail the way Telegram reports an unknown member.
    pub fn absent_from_channel(&self, user_id: i64) {
        self.absent_users.lock().expect("lock").insert(user_id);
    }

    /// Sends to this chat fail with an error that is not a delivery failure.
    pub fn break_chat(&self, chat_id: i64) {
        self.broken_chats.lock().expect("lock").insert(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("lock").clone()
    }

    /// Returns and forgets everything recorded so far.
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().expect("lock"))
    }

    /// Plain texts sent to a chat, in order.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { chat_id: c, text, .. } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Last plain text to a chat with its keyboard.
    pub fn last_text_to(&self, chat_id: i64) -> Option<(String, Option<Keyboard>)> {
        self.sent().into_iter().rev().find_map(|sent| match sent {
            Sent::Text {
                chat_id: c,
                text,
                keyboard,
            } if c == chat_id => Some((text, keyboard)),
            _ => None,
        })
    }

    fn record(&self, chat_id: i64, sent: Sent) -> AppResult<MessageRef> {
        if self.failing_chats.lock().expect("lock").contains(&chat_id) {
            return Err(AppError::Delivery(format!("chat {} blocked the bot", chat_id)));
        }
        if self.broken_chats.lock().expect("lock").contains(&chat_id) {
            return Err(AppError::Anyhow(anyhow::anyhow!("chat {} is unreachable", chat_id)));
        }
        self.sent.lock().expect("lock").push(sent);
        Ok(MessageRef {
            chat_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> AppResult<MessageRef> {
        self.record(
            chat_id,
            Sent::Text {
                chat_id,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            },
        )
    }

    async fn send_html(&self, chat_id: i64, html: &str) -> AppResult<MessageRef> {
        self.record(
            chat_id,
            Sent::Html {
                chat_id,
                html: html.to_string(),
            },
        )
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> AppResult<MessageRef> {
        self.record(
            chat_id,
            Sent::Photo {
                chat_id,
                file_id: file_id.to_string(),
                caption: caption.map(str::to_string),
                keyboard: keyboard.cloned(),
            },
        )
    }

    async fn send_document(&self, chat_id: i64, file_id: &str, caption: Option<&str>) -> AppResult<MessageRef> {
        self.record(
            chat_id,
            Sent::Document {
                chat_id,
                file_id: file_id.to_string(),
                caption: caption.map(str::to_string),
            },
        )
    }

    async fn edit_text(&self, message: MessageRef, text: &str, keyboard: Option<&Keyboard>) -> AppResult<()> {
        self.record(
            message.chat_id,
            Sent::Edit {
                message,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            },
        )
        .map(|_| ())
    }

    async fn clear_actions(&self, message: MessageRef) -> AppResult<()> {
        self.record(message.chat_id, Sent::ClearActions(message)).map(|_| ())
    }

    async fn answer_selection(&self, selection_id: &str, text: Option<&str>) -> AppResult<()> {
        self.sent.lock().expect("lock").push(Sent::Answer {
            selection_id: selection_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn is_channel_member(&self, _channel: &str, user_id: i64) -> AppResult<bool> {
        if self.membership_errors.lock().expect("lock").contains(&user_id) {
            return Err(AppError::Delivery("member lookup failed".into()));
        }
        if self.absent_users.lock().expect("lock").contains(&user_id) {
            return Err(AppError::Telegram(teloxide::RequestError::Api(teloxide::ApiError::UserNotFound)));
        }
        Ok(self.channel_members.lock().expect("lock").contains(&user_id))
    }
}
