//! Admin panel reports, rendered as plain text for the terminal.

use crate::core::discount;
use crate::storage::db::{PaymentStats, PendingPayment, ReferrerReport, UserReport};

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// One block per user with profile, payment flag and attempt count.
pub fn format_users(reports: &[UserReport]) -> String {
    if reports.is_empty() {
        return "No users yet.".to_string();
    }

    let mut out = format!("👥 Users: {}\n", reports.len());
    for report in reports {
        let user = &report.user;
        let age = user.age.map_or_else(|| "-".to_string(), |age| age.to_string());
        out.push_str(&format!(
            "\n🆔 {} {}\n   📞 {}  🎂 {}  📍 {}  🌐 {}\n   💳 paid: {}  attempts: {}  👥 referrals: {}  registered: {}\n",
            user.telegram_id,
            user.full_name,
            user.phone,
            age,
            user.region,
            user.language,
            yes_no(user.payment_status),
            report.payment_attempts,
            user.referral_count,
            user.created_at
        ));
    }
    out
}

pub fn format_payment_stats(stats: &PaymentStats) -> String {
    format!(
        "💰 Payments\n   total: {}\n   ✅ approved: {}\n   ❌ rejected: {}\n   ⏳ pending: {}",
        stats.total, stats.approved, stats.rejected, stats.pending
    )
}

/// Referrers with their stored counter, actual referred users and the discount they earned.
pub fn format_referral_report(referrers: &[ReferrerReport]) -> String {
    if referrers.is_empty() {
        return "No referrals yet.".to_string();
    }

    let mut out = String::from("🤝 Referrals\n");
    for referrer in referrers {
        out.push_str(&format!(
            "\n🆔 {} {}\n   counted: {}  registered: {}  paid: {}  discount: {}%\n",
            referrer.telegram_id,
            referrer.full_name,
            referrer.referral_count,
            referrer.actual_referrals,
            referrer.paid_referrals,
            discount::discount_percent(referrer.paid_referrals)
        ));
    }
    out
}

pub fn format_pending_payments(pending: &[PendingPayment]) -> String {
    if pending.is_empty() {
        return "No pending payments.".to_string();
    }

    let mut out = format!("⏳ Pending payments: {}\n", pending.len());
    for payment in pending {
        out.push_str(&format!(
            "\n#{} from {} ({}) at {}\n   📞 {}  📍 {}\n   file: {}\n",
            payment.payment_id,
            payment.full_name,
            payment.user_id,
            payment.created_at,
            payment.phone,
            payment.region,
            payment.screenshot_file_id
        ));
    }
    out
}
