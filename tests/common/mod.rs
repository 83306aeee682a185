//! Common test utilities
//!
//! `TestBot` wires a real engine to a temporary SQLite file and the recording
//! messenger, and offers one helper per kind of inbound event.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use coursebot::conversation::event::{Event, Inbound, MessageRef, Selection};
use coursebot::conversation::menu::MenuAction;
use coursebot::conversation::outbound::Messenger;
use coursebot::conversation::{DialogueState, Engine};
use coursebot::core::config::BotSettings;
use coursebot::i18n::Language;
use coursebot::storage::{create_pool, get_connection, DbConnection, DbPool};

use crate::mocks::RecordingMessenger;

pub const ADMIN_CHAT: i64 = -100_500;
pub const STAFF_MEMBER: i64 = 9_000;
pub const SECRET_LINK: &str = "https://t.me/+secret";

pub fn test_settings() -> BotSettings {
    BotSettings {
        admin_chat_id: ADMIN_CHAT,
        admin_language: Language::En,
        secret_group_link: SECRET_LINK.to_string(),
        channel_username: "@course_channel".to_string(),
        bot_username: "course_bot".to_string(),
        base_price_cents: 1000,
        lesson_reminder_hours: vec![6, 12],
        monthly_discount_hour: 10,
        broadcast_delay: Duration::ZERO,
    }
}

/// Creates a migrated pool in a fresh temporary directory.
pub fn temp_pool() -> (TempDir, Arc<DbPool>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let pool = create_pool(path.to_str().expect("utf-8 path")).expect("pool");
    (dir, Arc::new(pool))
}

pub struct TestBot {
    pub engine: Engine,
    pub messenger: Arc<RecordingMessenger>,
    pub db_pool: Arc<DbPool>,
    pub settings: Arc<BotSettings>,
    callback_seq: AtomicU32,
    _dir: TempDir,
}

impl TestBot {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: BotSettings) -> Self {
        let (dir, db_pool) = temp_pool();
        let messenger = Arc::new(RecordingMessenger::new());
        let settings = Arc::new(settings);
        let engine = Engine::new(
            Arc::clone(&db_pool),
            Arc::clone(&messenger) as Arc<dyn Messenger>,
            Arc::clone(&settings),
        );
        Self {
            engine,
            messenger,
            db_pool,
            settings,
            callback_seq: AtomicU32::new(1),
            _dir: dir,
        }
    }

    pub fn conn(&self) -> DbConnection {
        get_connection(&self.db_pool).expect("connection")
    }

    pub fn state(&self, user_id: i64) -> DialogueState {
        self.engine.sessions().state(user_id)
    }

    pub async fn handle(&self, inbound: Inbound) {
        self.engine.handle(inbound).await.expect("event handled");
    }

    pub async fn start(&self, user_id: i64, payload: Option<&str>) {
        self.handle(Inbound::private(
            user_id,
            Event::Start {
                payload: payload.map(str::to_string),
            },
        ))
        .await;
    }

    pub async fn text(&self, user_id: i64, text: &str) {
        self.handle(Inbound::private(user_id, Event::Text(text.to_string())))
            .await;
    }

    /// Presses a reply-keyboard button.
    pub async fn press(&self, user_id: i64, action: MenuAction, lang: Language) {
        self.text(user_id, &action.label(lang)).await;
    }

    pub async fn contact(&self, user_id: i64, phone: &str) {
        self.handle(Inbound::private(
            user_id,
            Event::Contact {
                phone: phone.to_string(),
            },
        ))
        .await;
    }

    pub async fn photo(&self, user_id: i64, file_id: &str) {
        self.handle(Inbound::private(
            user_id,
            Event::Photo {
                file_id: file_id.to_string(),
                caption: None,
            },
        ))
        .await;
    }

    fn next_callback_id(&self) -> String {
        format!("cb-{}", self.callback_seq.fetch_add(1, Ordering::SeqCst))
    }

    /// Presses an inline button on a message in the user's private chat.
    pub async fn select(&self, user_id: i64, payload: &str) {
        let id = self.next_callback_id();
        self.handle(Inbound::private(
            user_id,
            Event::Selection {
                id,
                selection: Selection::parse(payload),
                message: Some(MessageRef {
                    chat_id: user_id,
                    message_id: 1,
                }),
            },
        ))
        .await;
    }

    /// A staff member presses an inline button in the admin chat.
    pub async fn staff_select(&self, payload: &str, message_id: i32) {
        let id = self.next_callback_id();
        self.handle(Inbound {
            user_id: STAFF_MEMBER,
            chat_id: ADMIN_CHAT,
            username: Some("staff".to_string()),
            full_name: "Staff".to_string(),
            reply_to: None,
            event: Event::Selection {
                id,
                selection: Selection::parse(payload),
                message: Some(MessageRef {
                    chat_id: ADMIN_CHAT,
                    message_id,
                }),
            },
        })
        .await;
    }

    /// A staff member replies in the admin chat to a message with the given text.
    pub async fn staff_reply(&self, replied_text: &str, event: Event) {
        self.handle(Inbound {
            user_id: STAFF_MEMBER,
            chat_id: ADMIN_CHAT,
            username: Some("staff".to_string()),
            full_name: "Staff".to_string(),
            reply_to: Some(replied_text.to_string()),
            event,
        })
        .await;
    }

    /// Runs the whole registration dialogue; age is skipped.
    pub async fn register(&self, user_id: i64, lang: Language, name: &str, start_payload: Option<&str>) {
        self.start(user_id, start_payload).await;
        self.select(user_id, &format!("lang_{}", lang.code())).await;
        self.select(user_id, "continue_after_sub").await;
        self.text(user_id, name).await;
        self.contact(user_id, "+998901234567").await;
        self.press(user_id, MenuAction::Skip, lang).await;
        self.text(user_id, "Tashkent").await;
    }
}
