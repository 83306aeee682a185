use fluent_templates::fluent_bundle::FluentArgs;

use super::PaymentDesk;
use crate::conversation::event::MessageRef;
use crate::core::error::AppResult;
use crate::i18n::{t, t_args};
use crate::storage::db::{self, Payment, Resolution, Verdict};
use crate::storage::get_connection;

/// What a staff review did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Status changed; `user_notified` is false when delivery to the user failed.
    Resolved { user_notified: bool },
    AlreadyResolved,
    NotFound,
}

impl PaymentDesk {
    /// Applies an approve or reject press from the staff chat.
    ///
    /// Only the first resolution notifies the user. Later presses just strip the
    /// buttons again and answer "already processed".
    pub async fn review_payment(
        &self,
        selection_id: &str,
        message: Option<MessageRef>,
        payment_id: i64,
        verdict: Verdict,
    ) -> AppResult<ReviewOutcome> {
        let resolution = {
            let conn = get_connection(&self.db_pool)?;
            db::resolve_payment(&conn, payment_id, verdict)?
        };
        let admin_lang = self.settings.admin_language;

        match resolution {
            Resolution::Resolved(payment) => {
                let user_notified = match self.notify_owner(&payment, verdict).await {
                    Ok(notified) => notified,
                    Err(e) => {
                        log::error!("Failed to notify owner of payment {}: {}", payment.id, e);
                        false
                    }
                };
                self.clear_review_buttons(message, &payment).await;

                let key = match verdict {
                    Verdict::Approve => "admin-payment-approved",
                    Verdict::Reject => "admin-payment-rejected",
                };
                let mut args = FluentArgs::new();
                args.set("id", payment.id.to_string());
                self.messenger
                    .answer_selection(selection_id, Some(&t_args(admin_lang, key, &args)))
                    .await?;
                Ok(ReviewOutcome::Resolved { user_notified })
            }
            Resolution::AlreadyResolved(payment) => {
                log::info!("Payment {} already {}, ignoring {:?}", payment.id, payment.status, verdict);
                self.clear_review_buttons(message, &payment).await;
                let mut args = FluentArgs::new();
                args.set("status", payment.status.to_string());
                self.messenger
                    .answer_selection(selection_id, Some(&t_args(admin_lang, "admin-payment-already", &args)))
                    .await?;
                Ok(ReviewOutcome::AlreadyResolved)
            }
            Resolution::NotFound => {
                log::warn!("Review for unknown payment {}", payment_id);
                self.messenger
                    .answer_selection(selection_id, Some(&t(admin_lang, "admin-payment-not-found")))
                    .await?;
                Ok(ReviewOutcome::NotFound)
            }
        }
    }

    /// Sends the benefit or rejection notice. Delivery failures are logged, not returned.
    async fn notify_owner(&self, payment: &Payment, verdict: Verdict) -> AppResult<bool> {
        let owner = {
            let conn = get_connection(&self.db_pool)?;
            db::get_user(&conn, payment.user_id)?
        };
        let Some(owner) = owner else {
            log::warn!("Payment {} belongs to unknown user {}", payment.id, payment.user_id);
            return Ok(false);
        };

        let text = match verdict {
            Verdict::Approve => {
                let mut args = FluentArgs::new();
                args.set("link", self.settings.secret_group_link.clone());
                t_args(owner.language, "payment-approved", &args)
            }
            Verdict::Reject => t(owner.language, "payment-rejected"),
        };

        match self.messenger.send_text(owner.telegram_id, &text, None).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_delivery() => {
                log::warn!("Failed to notify user {} about payment {}: {}", owner.telegram_id, payment.id, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Strips approve/reject from the staff message; falls back to the stored reference.
    async fn clear_review_buttons(&self, message: Option<MessageRef>, payment: &Payment) {
        let target = message.or_else(|| {
            payment.admin_message_id.map(|message_id| MessageRef {
                chat_id: self.settings.admin_chat_id,
                message_id,
            })
        });
        let Some(target) = target else {
            return;
        };
        if let Err(e) = self.messenger.clear_actions(target).await {
            log::warn!("Failed to clear review buttons for payment {}: {}", payment.id, e);
        }
    }
}
