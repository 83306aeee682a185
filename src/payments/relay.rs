//! Question forwarding to staff and the reply relay back to the asker.

use teloxide::utils::html;

use super::PaymentDesk;
use crate::conversation::event::{Event, MessageRef};
use crate::conversation::menu;
use crate::core::error::AppResult;
use crate::i18n::{t, Language};
use crate::storage::db::{self, User};
use crate::storage::get_connection;

/// Staff-chat rendering of a question. The `id:<user>` marker is what replies are matched on.
pub fn question_forward_html(header: &str, user_id: i64, username: Option<&str>, full_name: &str, text: &str) -> String {
    let who = match username {
        Some(username) => format!(
            "<a href='https://t.me/{}'>{}</a>",
            html::escape(username),
            html::escape(full_name)
        ),
        None => html::escape(full_name),
    };
    format!(
        "{}\n<code>id:{}</code>\n👤: {}\n💬 {}",
        html::escape(header),
        user_id,
        who,
        html::escape(text)
    )
}

impl PaymentDesk {
    /// Stores the question, forwards it to staff and thanks the user.
    pub async fn submit_question(&self, user: &User, username: Option<&str>, text: &str) -> AppResult<()> {
        let question_id = {
            let conn = get_connection(&self.db_pool)?;
            db::add_question(&conn, user.telegram_id, text)?
        };
        log::info!("Question {} from user {}", question_id, user.telegram_id);

        if let Some(staff_chat) = self.staff_chat() {
            let username = username.or(user.username.as_deref());
            let body = question_forward_html(
                &t(self.settings.admin_language, "admin-new-question"),
                user.telegram_id,
                username,
                &user.full_name,
                text,
            );
            self.messenger.send_html(staff_chat, &body).await?;
        }

        self.messenger
            .send_text(
                user.telegram_id,
                &t(user.language, "question-sent"),
                Some(&menu::main_menu(user.language)),
            )
            .await?;
        Ok(())
    }

    /// Relays a staff reply to the user who asked, then closes their open questions.
    pub async fn relay_reply(&self, user_id: i64, event: &Event) -> AppResult<()> {
        let lang = {
            let conn = get_connection(&self.db_pool)?;
            db::get_user(&conn, user_id)?
                .map(|u| u.language)
                .unwrap_or_default()
        };

        let sent = match event {
            Event::Text(text) => self.messenger.send_text(user_id, text, None).await,
            Event::Photo { file_id, caption } => {
                self.messenger
                    .send_photo(user_id, file_id, caption.as_deref(), None)
                    .await
            }
            Event::Document { file_id, caption } => {
                self.messenger
                    .send_document(user_id, file_id, caption.as_deref())
                    .await
            }
            _ => self.relay_unsupported(user_id, lang).await,
        };

        if let Err(e) = sent {
            log::warn!("Failed to relay staff reply to user {}: {}", user_id, e);
            return if e.is_delivery() { Ok(()) } else { Err(e) };
        }

        let closed = {
            let conn = get_connection(&self.db_pool)?;
            db::mark_questions_answered(&conn, user_id)?
        };
        log::info!("Relayed staff reply to user {} ({} question(s) answered)", user_id, closed);
        Ok(())
    }

    async fn relay_unsupported(&self, user_id: i64, lang: Language) -> AppResult<MessageRef> {
        self.messenger
            .send_text(user_id, &t(lang, "unknown-file-type"), None)
            .await
    }
}
