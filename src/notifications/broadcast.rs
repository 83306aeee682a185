//! Best-effort broadcasts to groups of users.
//!
//! Recipients are messaged one at a time with a fixed pause in between. A failed
//! delivery is logged and counted; it never stops the batch.

use fluent_templates::fluent_bundle::FluentArgs;
use std::sync::Arc;

use crate::conversation::menu::{self, Keyboard};
use crate::conversation::outbound::Messenger;
use crate::core::config::BotSettings;
use crate::core::discount;
use crate::core::error::AppResult;
use crate::i18n::{t, t_args};
use crate::storage::db::{self, DbPool};
use crate::storage::get_connection;

/// Counters for one broadcast run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
    /// Recipients filtered out before sending.
    pub skipped: usize,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed + self.skipped
    }
}

pub struct Broadcaster {
    db_pool: Arc<DbPool>,
    messenger: Arc<dyn Messenger>,
    settings: Arc<BotSettings>,
}

impl Broadcaster {
    pub fn new(db_pool: Arc<DbPool>, messenger: Arc<dyn Messenger>, settings: Arc<BotSettings>) -> Self {
        Self {
            db_pool,
            messenger,
            settings,
        }
    }

    async fn deliver(&self, report: &mut BroadcastReport, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) {
        if report.sent + report.failed > 0 && !self.settings.broadcast_delay.is_zero() {
            tokio::time::sleep(self.settings.broadcast_delay).await;
        }
        match self.messenger.send_text(chat_id, text, keyboard).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                log::warn!("Broadcast to {} failed: {}", chat_id, e);
                report.failed += 1;
            }
        }
    }

    /// Lesson reminder to every paid, active user.
    pub async fn send_lesson_reminders(&self) -> AppResult<BroadcastReport> {
        let recipients = {
            let conn = get_connection(&self.db_pool)?;
            db::get_users_for_notification(&conn)?
        };
        log::info!("Sending lesson reminders to {} user(s)", recipients.len());

        let mut report = BroadcastReport::default();
        for user in &recipients {
            self.deliver(&mut report, user.telegram_id, &t(user.language, "lesson-reminder"), None)
                .await;
        }
        log::info!("Lesson reminders done: {:?}", report);
        Ok(report)
    }

    /// Discount summary to paid users with at least one paid referral.
    pub async fn send_monthly_discounts(&self) -> AppResult<BroadcastReport> {
        let candidates = {
            let conn = get_connection(&self.db_pool)?;
            db::get_discount_candidates(&conn)?
        };
        log::info!("Sending monthly discount summary to {} user(s)", candidates.len());

        let mut report = BroadcastReport::default();
        for candidate in &candidates {
            let percent = discount::discount_percent(candidate.paid_referrals);
            let price = discount::discounted_price_cents(self.settings.base_price_cents, candidate.paid_referrals);
            let mut args = FluentArgs::new();
            args.set("paid", candidate.paid_referrals.to_string());
            args.set("discount", percent.to_string());
            args.set("price", discount::format_price(price));
            let text = t_args(candidate.language, "monthly-discount", &args);
            self.deliver(&mut report, candidate.telegram_id, &text, None).await;
        }
        log::info!("Monthly discount summary done: {:?}", report);
        Ok(report)
    }

    /// Channel subscription prompt to registered users.
    ///
    /// With `only_unsubscribed`, channel members are skipped. A user Telegram does
    /// not know in the channel counts as unsubscribed; any other lookup failure
    /// skips that user.
    pub async fn send_subscription_reminders(&self, only_unsubscribed: bool) -> AppResult<BroadcastReport> {
        let users = {
            let conn = get_connection(&self.db_pool)?;
            db::get_all_users(&conn)?
        };
        let channel = self.settings.channel_username.as_str();
        log::info!(
            "Sending subscription reminders for {} to {} user(s), only_unsubscribed={}",
            channel,
            users.len(),
            only_unsubscribed
        );

        let mut report = BroadcastReport::default();
        for user in users.iter().filter(|u| u.is_active) {
            if only_unsubscribed {
                match self.messenger.is_channel_member(channel, user.telegram_id).await {
                    Ok(true) => {
                        report.skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) if e.is_user_absent() => {}
                    Err(e) => {
                        log::warn!("Membership check for {} failed: {}", user.telegram_id, e);
                        report.skipped += 1;
                        continue;
                    }
                }
            }

            let mut args = FluentArgs::new();
            args.set("channel", channel.to_string());
            let text = t_args(user.language, "subscription-required", &args);
            let keyboard = menu::subscription_continue(user.language);
            self.deliver(&mut report, user.telegram_id, &text, Some(&keyboard)).await;
        }
        log::info!("Subscription reminders done: {:?}", report);
        Ok(report)
    }
}
