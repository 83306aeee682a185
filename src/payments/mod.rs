//! Payment screenshots, staff review and the question relay.
//!
//! Everything that talks to the staff chat goes through [`PaymentDesk`].

pub mod relay;
pub mod review;
pub mod submission;

use std::sync::Arc;

use crate::conversation::outbound::Messenger;
use crate::core::config::BotSettings;
use crate::storage::db::DbPool;

pub use relay::question_forward_html;
pub use review::ReviewOutcome;
pub use submission::payment_caption;

/// Staff-facing workflows shared by the dialogue engine.
pub struct PaymentDesk {
    db_pool: Arc<DbPool>,
    messenger: Arc<dyn Messenger>,
    settings: Arc<BotSettings>,
}

impl PaymentDesk {
    pub fn new(db_pool: Arc<DbPool>, messenger: Arc<dyn Messenger>, settings: Arc<BotSettings>) -> Self {
        Self {
            db_pool,
            messenger,
            settings,
        }
    }

    fn staff_chat(&self) -> Option<i64> {
        if self.settings.admin_chat_id == 0 {
            log::warn!("ADMIN_GROUP_ID is not set, staff chat notifications are disabled");
            None
        } else {
            Some(self.settings.admin_chat_id)
        }
    }
}
