use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

use crate::i18n::Language;

// Configuration constants for the bot

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: coursebot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "coursebot.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Bot username used in referral links when Telegram does not report one
/// Read from BOT_USERNAME environment variable (leading '@' is stripped)
pub static BOT_USERNAME: Lazy<Option<String>> = Lazy::new(|| {
    env::var("BOT_USERNAME")
        .ok()
        .map(|name| name.trim_start_matches('@').to_string())
        .filter(|name| !name.is_empty())
});

/// Staff chat receiving payment reviews and forwarded questions
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    use crate::i18n::Language;

    /// Admin group chat ID
    /// Read from ADMIN_GROUP_ID environment variable
    /// Defaults to 0 if not set (admin notifications are skipped)
    pub static ADMIN_GROUP_ID: Lazy<i64> = Lazy::new(|| {
        env::var("ADMIN_GROUP_ID")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    });

    /// Language of texts posted into the admin group
    /// Read from ADMIN_LANGUAGE environment variable
    /// Default: uz
    pub static ADMIN_LANGUAGE: Lazy<Language> = Lazy::new(|| {
        env::var("ADMIN_LANGUAGE")
            .ok()
            .and_then(|code| Language::from_code(&code))
            .unwrap_or_default()
    });
}

/// Course access and channel configuration
pub mod course {
    use once_cell::sync::Lazy;
    use std::env;

    /// Invite link to the private course group, sent after payment approval
    /// Read from SECRET_GROUP_LINK environment variable
    pub static SECRET_GROUP_LINK: Lazy<String> =
        Lazy::new(|| env::var("SECRET_GROUP_LINK").unwrap_or_else(|_| String::new()));

    /// Public channel users are asked to subscribe to
    /// Read from CHANNEL_USERNAME environment variable
    /// Default: @ESL_Proficiency
    pub static CHANNEL_USERNAME: Lazy<String> = Lazy::new(|| {
        let raw = env::var("CHANNEL_USERNAME").unwrap_or_else(|_| "@ESL_Proficiency".to_string());
        if raw.starts_with('@') {
            raw
        } else {
            format!("@{}", raw)
        }
    });
}

/// Pricing configuration
pub mod pricing {
    use once_cell::sync::Lazy;
    use std::env;

    /// Default course price in cents ($10.00)
    pub const DEFAULT_BASE_PRICE_CENTS: u64 = 1000;

    /// Course base price in cents
    /// Read from BASE_PRICE_CENTS environment variable
    pub static BASE_PRICE_CENTS: Lazy<u64> = Lazy::new(|| {
        env::var("BASE_PRICE_CENTS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_BASE_PRICE_CENTS)
    });
}

/// Notification scheduler configuration
pub mod schedule {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// How often the scheduler wakes up to compare the wall clock (in seconds)
    pub const TICK_INTERVAL_SECS: u64 = 60;

    /// Scheduler tick duration
    pub fn tick_interval() -> Duration {
        Duration::from_secs(TICK_INTERVAL_SECS)
    }

    pub(crate) fn parse_hours(raw: &str) -> Vec<u32> {
        let mut hours: Vec<u32> = raw
            .split([',', ' ', ';'])
            .filter_map(|part| part.trim().parse::<u32>().ok())
            .filter(|hour| *hour < 24)
            .collect();
        hours.sort_unstable();
        hours.dedup();
        hours
    }

    /// Hours of the day (local time) when lesson reminders go out
    /// Read from LESSON_REMINDER_HOURS environment variable (comma-separated)
    /// Default: 6,12
    pub static LESSON_REMINDER_HOURS: Lazy<Vec<u32>> = Lazy::new(|| {
        let hours = env::var("LESSON_REMINDER_HOURS")
            .map(|raw| parse_hours(&raw))
            .unwrap_or_default();
        if hours.is_empty() {
            vec![6, 12]
        } else {
            hours
        }
    });

    /// Hour of the day the monthly discount summary is sent on the last day of a month
    /// Read from MONTHLY_DISCOUNT_HOUR environment variable
    /// Default: 10
    pub static MONTHLY_DISCOUNT_HOUR: Lazy<u32> = Lazy::new(|| {
        env::var("MONTHLY_DISCOUNT_HOUR")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|hour| *hour < 24)
            .unwrap_or(10)
    });
}

/// Broadcast throttling configuration
pub mod broadcast {
    use super::Duration;

    /// Delay between two consecutive sends of one broadcast (in milliseconds)
    pub const INTER_SEND_DELAY_MS: u64 = 100;

    /// Inter-send delay duration
    pub fn inter_send_delay() -> Duration {
        Duration::from_millis(INTER_SEND_DELAY_MS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// Request timeout for HTTP requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    /// Port of the liveness endpoint
    /// Read from HEALTH_PORT environment variable
    /// Default: 5000
    pub static HEALTH_PORT: Lazy<u16> = Lazy::new(|| {
        env::var("HEALTH_PORT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(5000)
    });

    /// Returns the BOT_API_URL environment variable if set.
    pub fn bot_api_url() -> Option<String> {
        env::var("BOT_API_URL").ok().filter(|url| !url.trim().is_empty())
    }
}

/// Runtime settings handed to the conversation engine, payment workflow and scheduler.
///
/// Built once from the environment statics in `main`; tests construct it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSettings {
    pub admin_chat_id: i64,
    pub admin_language: Language,
    pub secret_group_link: String,
    pub channel_username: String,
    pub bot_username: String,
    pub base_price_cents: u64,
    pub lesson_reminder_hours: Vec<u32>,
    pub monthly_discount_hour: u32,
    pub broadcast_delay: Duration,
}

impl BotSettings {
    /// Reads the environment. `reported_username` is what Telegram returned for `get_me`.
    pub fn from_env(reported_username: Option<&str>) -> Self {
        let bot_username = reported_username
            .map(str::to_string)
            .or_else(|| BOT_USERNAME.clone())
            .unwrap_or_default();

        Self {
            admin_chat_id: *admin::ADMIN_GROUP_ID,
            admin_language: *admin::ADMIN_LANGUAGE,
            secret_group_link: course::SECRET_GROUP_LINK.clone(),
            channel_username: course::CHANNEL_USERNAME.clone(),
            bot_username,
            base_price_cents: *pricing::BASE_PRICE_CENTS,
            lesson_reminder_hours: schedule::LESSON_REMINDER_HOURS.clone(),
            monthly_discount_hour: *schedule::MONTHLY_DISCOUNT_HOUR,
            broadcast_delay: broadcast::inter_send_delay(),
        }
    }

    /// `https://t.me/<bot>?start=ref<id>`
    pub fn referral_link(&self, user_id: i64) -> String {
        format!("https://t.me/{}?start=ref{}", self.bot_username, user_id)
    }

    pub fn is_admin_chat(&self, chat_id: i64) -> bool {
        self.admin_chat_id != 0 && self.admin_chat_id == chat_id
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admin_chat_id: 0,
            admin_language: Language::default(),
            secret_group_link: String::new(),
            channel_username: "@ESL_Proficiency".to_string(),
            bot_username: String::new(),
            base_price_cents: pricing::DEFAULT_BASE_PRICE_CENTS,
            lesson_reminder_hours: vec![6, 12],
            monthly_discount_hour: 10,
            broadcast_delay: broadcast::inter_send_delay(),
        }
    }
}
