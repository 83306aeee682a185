use super::PaymentDesk;
use crate::conversation::menu;
use crate::core::error::AppResult;
use crate::i18n::t;
use crate::storage::db::{self, User};
use crate::storage::get_connection;

/// Caption under the screenshot forwarded to staff.
pub fn payment_caption(header: &str, user: &User) -> String {
    format!(
        "{}\n🆔 {}\n👤 {}\n📞 {}\n📍 {}",
        header, user.telegram_id, user.full_name, user.phone, user.region
    )
}

impl PaymentDesk {
    /// Records a pending payment, posts it for review and acknowledges the user.
    ///
    /// Returns the payment id.
    pub async fn submit_payment(&self, user: &User, file_id: &str) -> AppResult<i64> {
        let payment_id = {
            let conn = get_connection(&self.db_pool)?;
            db::add_payment(&conn, user.telegram_id, file_id)?
        };
        log::info!("Payment {} submitted by user {}", payment_id, user.telegram_id);

        if let Err(e) = self.post_for_review(user, payment_id, file_id).await {
            log::error!("Failed to post payment {} for review: {}", payment_id, e);
        }

        self.messenger
            .send_text(
                user.telegram_id,
                &t(user.language, "payment-success"),
                Some(&menu::main_menu(user.language)),
            )
            .await?;
        Ok(payment_id)
    }

    /// Forwards the screenshot to the staff chat with approve/reject buttons.
    async fn post_for_review(&self, user: &User, payment_id: i64, file_id: &str) -> AppResult<()> {
        let Some(staff_chat) = self.staff_chat() else {
            return Ok(());
        };
        let admin_lang = self.settings.admin_language;
        let caption = payment_caption(&t(admin_lang, "admin-new-payment"), user);
        let keyboard = menu::payment_review(admin_lang, payment_id);
        let posted = self
            .messenger
            .send_photo(staff_chat, file_id, Some(&caption), Some(&keyboard))
            .await?;
        let conn = get_connection(&self.db_pool)?;
        db::set_payment_admin_message(&conn, payment_id, posted.message_id)?;
        Ok(())
    }
}
