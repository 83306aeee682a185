use async_trait::async_trait;

use super::event::MessageRef;
use super::menu::Keyboard;
use crate::core::error::AppResult;

/// Outbound side of the bot. Implemented over teloxide for production and by a
/// recording mock in tests.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> AppResult<MessageRef>;

    /// Sends HTML-formatted text.
    async fn send_html(&self, chat_id: i64, html: &str) -> AppResult<MessageRef>;

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> AppResult<MessageRef>;

    async fn send_document(&self, chat_id: i64, file_id: &str, caption: Option<&str>) -> AppResult<MessageRef>;

    /// Replaces the text of a sent message; only inline keyboards can be attached.
    async fn edit_text(&self, message: MessageRef, text: &str, keyboard: Option<&Keyboard>) -> AppResult<()>;

    /// Removes the inline buttons of a sent message.
    async fn clear_actions(&self, message: MessageRef) -> AppResult<()>;

    /// Acknowledges a button press, optionally with a toast.
    async fn answer_selection(&self, selection_id: &str, text: Option<&str>) -> AppResult<()>;

    async fn is_channel_member(&self, channel: &str, user_id: i64) -> AppResult<bool>;
}
