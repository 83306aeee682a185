//! [`Messenger`] over the Telegram Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, CallbackQueryId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton,
    KeyboardMarkup, KeyboardRemove, MessageId, ParseMode, Recipient, ReplyMarkup,
};

use crate::conversation::event::MessageRef;
use crate::conversation::menu::{ButtonKind, InlineButton, Keyboard};
use crate::conversation::outbound::Messenger;
use crate::core::error::{AppError, AppResult};

fn inline_markup(rows: &[Vec<InlineButton>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.payload.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Converts the transport-free keyboard into Telegram markup.
pub fn to_reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Reply { rows, one_time } => {
            let rows = rows.iter().map(|row| {
                row.iter()
                    .map(|button| match button.kind {
                        ButtonKind::RequestContact => {
                            KeyboardButton::new(button.label.clone()).request(ButtonRequest::Contact)
                        }
                        ButtonKind::Action(_) | ButtonKind::Plain => KeyboardButton::new(button.label.clone()),
                    })
                    .collect::<Vec<_>>()
            });
            let markup = KeyboardMarkup::new(rows).resize_keyboard();
            let markup = if *one_time { markup.one_time_keyboard() } else { markup };
            ReplyMarkup::Keyboard(markup)
        }
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(inline_markup(rows)),
        Keyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
    }
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> AppResult<MessageRef> {
        let request = self.bot.send_message(ChatId(chat_id), text);
        let msg = match keyboard {
            Some(keyboard) => request.reply_markup(to_reply_markup(keyboard)).await?,
            None => request.await?,
        };
        Ok(message_ref(&msg))
    }

    async fn send_html(&self, chat_id: i64, html: &str) -> AppResult<MessageRef> {
        let msg = self
            .bot
            .send_message(ChatId(chat_id), html)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(message_ref(&msg))
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> AppResult<MessageRef> {
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_string())));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(to_reply_markup(keyboard));
        }
        let msg = request.await?;
        Ok(message_ref(&msg))
    }

    async fn send_document(&self, chat_id: i64, file_id: &str, caption: Option<&str>) -> AppResult<MessageRef> {
        let mut request = self
            .bot
            .send_document(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_string())));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        let msg = request.await?;
        Ok(message_ref(&msg))
    }

    async fn edit_text(&self, message: MessageRef, text: &str, keyboard: Option<&Keyboard>) -> AppResult<()> {
        let request = self
            .bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text);
        match keyboard {
            Some(Keyboard::Inline(rows)) => {
                request.reply_markup(inline_markup(rows)).await?;
            }
            Some(other) => {
                log::debug!("Only inline keyboards survive an edit, dropping {:?}", other);
                request.await?;
            }
            None => {
                request.await?;
            }
        }
        Ok(())
    }

    async fn clear_actions(&self, message: MessageRef) -> AppResult<()> {
        self.bot
            .edit_message_reply_markup(ChatId(message.chat_id), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn answer_selection(&self, selection_id: &str, text: Option<&str>) -> AppResult<()> {
        let request = self
            .bot
            .answer_callback_query(CallbackQueryId(selection_id.to_string()));
        match text {
            Some(text) => request.text(text).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn is_channel_member(&self, channel: &str, user_id: i64) -> AppResult<bool> {
        let user_id = u64::try_from(user_id).map_err(|_| AppError::Validation(format!("invalid user id {}", user_id)))?;
        let member = self
            .bot
            .get_chat_member(Recipient::ChannelUsername(channel.to_string()), UserId(user_id))
            .await?;
        Ok(member.is_present())
    }
}
