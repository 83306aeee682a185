//! Transport-independent inbound events.

use crate::i18n::Language;
use crate::storage::db::Verdict;

/// A message previously sent by the bot, addressable for edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Decoded payload of an inline button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Language(Language),
    ContinueAfterSubscription,
    Review { payment_id: i64, verdict: Verdict },
    Unknown(String),
}

const CONTINUE_PAYLOAD: &str = "continue_after_sub";

impl Selection {
    /// `lang_<code>`, `continue_after_sub`, `approve_<id>`, `reject_<id>`.
    pub fn parse(data: &str) -> Self {
        if let Some(code) = data.strip_prefix("lang_") {
            if let Some(language) = Language::from_code(code) {
                return Selection::Language(language);
            }
        } else if data == CONTINUE_PAYLOAD {
            return Selection::ContinueAfterSubscription;
        } else if let Some(id) = data.strip_prefix("approve_") {
            if let Ok(payment_id) = id.parse() {
                return Selection::Review {
                    payment_id,
                    verdict: Verdict::Approve,
                };
            }
        } else if let Some(id) = data.strip_prefix("reject_") {
            if let Ok(payment_id) = id.parse() {
                return Selection::Review {
                    payment_id,
                    verdict: Verdict::Reject,
                };
            }
        }
        Selection::Unknown(data.to_string())
    }

    /// Inverse of [`Selection::parse`].
    pub fn payload(&self) -> String {
        match self {
            Selection::Language(language) => format!("lang_{}", language.code()),
            Selection::ContinueAfterSubscription => CONTINUE_PAYLOAD.to_string(),
            Selection::Review {
                payment_id,
                verdict: Verdict::Approve,
            } => format!("approve_{}", payment_id),
            Selection::Review {
                payment_id,
                verdict: Verdict::Reject,
            } => format!("reject_{}", payment_id),
            Selection::Unknown(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/start` with an optional deep-link payload.
    Start { payload: Option<String> },
    Text(String),
    Contact { phone: String },
    Photo { file_id: String, caption: Option<String> },
    Document { file_id: String, caption: Option<String> },
    Selection {
        /// Transport id used to acknowledge the press.
        id: String,
        selection: Selection,
        /// Message that carried the button.
        message: Option<MessageRef>,
    },
    /// Stickers, voice notes and anything else without a dedicated variant.
    Unsupported,
}

/// One inbound event with the identity of its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    /// Text or caption of the message this one replies to.
    pub reply_to: Option<String>,
    pub event: Event,
}

impl Inbound {
    /// Private-chat event where chat and user coincide.
    pub fn private(user_id: i64, event: Event) -> Self {
        Self {
            user_id,
            chat_id: user_id,
            username: None,
            full_name: String::new(),
            reply_to: None,
            event,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.event {
            Event::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Extracts the referrer id from a `ref<digits>` start payload.
pub fn parse_referral_token(payload: &str) -> Option<i64> {
    let digits = payload.trim().strip_prefix("ref")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
