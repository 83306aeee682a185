//! End-to-end dialogue tests: engine + SQLite + recording messenger
//!
//! Run with: cargo test --test conversation_flow_test

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod mocks;

use pretty_assertions::assert_eq;

use common::{TestBot, ADMIN_CHAT, SECRET_LINK};
use coursebot::conversation::event::Event;
use coursebot::conversation::menu::{Keyboard, MenuAction};
use coursebot::conversation::{DialogueState, RegistrationStep, SettingsField};
use coursebot::i18n::{t, Language};
use coursebot::storage::db::{self, NewFaq, PaymentStatus};
use mocks::Sent;

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn registration_without_referral_creates_one_user() {
    let bot = TestBot::new();

    bot.start(1, None).await;
    assert_eq!(bot.state(1), DialogueState::Registration(RegistrationStep::Language));
    bot.select(1, "lang_en").await;
    bot.select(1, "continue_after_sub").await;
    bot.text(1, "Alice").await;
    bot.text(1, "+1234").await;
    bot.press(1, MenuAction::Skip, Language::En).await;
    bot.text(1, "Tashkent").await;

    assert_eq!(bot.state(1), DialogueState::Idle);
    let conn = bot.conn();
    let user = db::get_user(&conn, 1).unwrap().expect("user stored");
    assert_eq!(user.full_name, "Alice");
    assert_eq!(user.phone, "+1234");
    assert_eq!(user.age, None);
    assert_eq!(user.region, "Tashkent");
    assert_eq!(user.language, Language::En);
    assert_eq!(user.referrer_id, None);

    let users = db::get_all_users(&conn).unwrap();
    assert_eq!(users.len(), 1);
    assert!(users.iter().all(|u| u.referral_count == 0));

    let (text, keyboard) = bot.messenger.last_text_to(1).unwrap();
    assert_eq!(text, t(Language::En, "registration-complete"));
    assert!(keyboard.unwrap().actions().contains(&MenuAction::Payment));
}

#[tokio::test]
async fn language_choice_edits_picker_into_subscription_prompt() {
    let bot = TestBot::new();
    bot.start(1, None).await;
    bot.messenger.take();

    bot.select(1, "lang_ru").await;

    let sent = bot.messenger.sent();
    assert!(matches!(&sent[0], Sent::Answer { text: None, .. }));
    match &sent[1] {
        Sent::Edit { text, keyboard, .. } => {
            assert!(text.contains("@course_channel"), "{text}");
            assert_eq!(keyboard.as_ref().unwrap().payloads(), vec!["continue_after_sub"]);
        }
        other => panic!("expected edit, got {other:?}"),
    }
    assert_eq!(bot.state(1), DialogueState::Registration(RegistrationStep::Subscription));
}

#[tokio::test]
async fn referral_token_credits_existing_referrer_once() {
    let bot = TestBot::new();
    bot.register(42, Language::Uz, "Referrer", None).await;

    bot.register(100, Language::En, "Friend", Some("ref42")).await;

    let conn = bot.conn();
    assert_eq!(db::get_user(&conn, 42).unwrap().unwrap().referral_count, 1);
    assert_eq!(db::get_user(&conn, 100).unwrap().unwrap().referrer_id, Some(42));

    // a repeated start with the same token does not count again
    bot.start(100, Some("ref42")).await;
    assert_eq!(bot.state(100), DialogueState::Idle);
    assert_eq!(db::get_user(&conn, 42).unwrap().unwrap().referral_count, 1);
}

#[tokio::test]
async fn unknown_or_self_referrer_is_dropped() {
    let bot = TestBot::new();
    bot.register(5, Language::En, "Nobody's friend", Some("ref999")).await;
    bot.register(6, Language::En, "Self", Some("ref6")).await;

    let conn = bot.conn();
    assert_eq!(db::get_user(&conn, 5).unwrap().unwrap().referrer_id, None);
    assert_eq!(db::get_user(&conn, 6).unwrap().unwrap().referrer_id, None);
    assert_eq!(db::get_user(&conn, 6).unwrap().unwrap().referral_count, 0);
}

#[tokio::test]
async fn language_interrupt_resumes_at_phone_step() {
    let bot = TestBot::new();
    bot.start(1, None).await;
    bot.select(1, "lang_uz").await;
    bot.select(1, "continue_after_sub").await;
    bot.text(1, "Alice").await;
    assert_eq!(bot.state(1), DialogueState::Registration(RegistrationStep::Phone));

    bot.press(1, MenuAction::ChangeLanguage, Language::Uz).await;
    assert_eq!(
        bot.state(1),
        DialogueState::LanguageInterrupt {
            resume: RegistrationStep::Phone
        }
    );
    let (picker_text, _) = bot.messenger.last_text_to(1).unwrap();
    assert_eq!(picker_text, t(Language::Uz, "choose-language"));

    bot.messenger.take();
    bot.select(1, "lang_en").await;

    assert_eq!(bot.state(1), DialogueState::Registration(RegistrationStep::Phone));
    let edits: Vec<String> = bot
        .messenger
        .sent()
        .into_iter()
        .filter_map(|s| match s {
            Sent::Edit { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(edits, vec![t(Language::En, "language-changed")]);

    let (prompt, keyboard) = bot.messenger.last_text_to(1).unwrap();
    assert_eq!(prompt, t(Language::En, "enter-phone"));
    assert!(keyboard.unwrap().actions().contains(&MenuAction::ChangeLanguage));

    // the name captured before the interrupt survives
    bot.contact(1, "+1234").await;
    bot.text(1, "30").await;
    bot.text(1, "Samarkand").await;
    let user = db::get_user(&bot.conn(), 1).unwrap().unwrap();
    assert_eq!(user.full_name, "Alice");
    assert_eq!(user.age, Some(30));
    assert_eq!(user.language, Language::En);
}

#[tokio::test]
async fn invalid_age_is_rejected_in_place() {
    let bot = TestBot::new();
    bot.start(1, None).await;
    bot.select(1, "lang_en").await;
    bot.select(1, "continue_after_sub").await;
    bot.text(1, "Alice").await;
    bot.contact(1, "+1234").await;

    bot.text(1, "twenty").await;
    assert_eq!(bot.state(1), DialogueState::Registration(RegistrationStep::Age));
    let (text, _) = bot.messenger.last_text_to(1).unwrap();
    assert_eq!(text, t(Language::En, "age-invalid"));

    bot.text(1, "twenty one").await;
    assert_eq!(bot.state(1), DialogueState::Registration(RegistrationStep::Age));
    assert!(db::get_user(&bot.conn(), 1).unwrap().is_none());
}

#[tokio::test]
async fn registered_start_shows_main_menu() {
    let bot = TestBot::new();
    bot.register(1, Language::Ru, "Ivan", None).await;
    bot.messenger.take();

    bot.start(1, None).await;

    let (text, keyboard) = bot.messenger.last_text_to(1).unwrap();
    assert_eq!(text, t(Language::Ru, "main-menu"));
    assert!(matches!(keyboard, Some(Keyboard::Reply { .. })));
    assert_eq!(bot.state(1), DialogueState::Idle);
}

// ============================================================================
// Idle behaviour and lookup misses
// ============================================================================

#[tokio::test]
async fn photo_in_idle_gets_neutral_notice() {
    let bot = TestBot::new();
    bot.register(1, Language::En, "Alice", None).await;
    bot.messenger.take();

    bot.photo(1, "stray-photo").await;

    assert_eq!(bot.messenger.texts_to(1), vec![t(Language::En, "photo-not-expected")]);
    assert_eq!(bot.state(1), DialogueState::Idle);
    assert_eq!(db::get_payment_stats(&bot.conn()).unwrap().total, 0);
}

#[tokio::test]
async fn free_text_in_idle_is_silent() {
    let bot = TestBot::new();
    bot.register(1, Language::En, "Alice", None).await;
    bot.messenger.take();

    bot.text(1, "hello there").await;

    assert!(bot.messenger.sent().is_empty());
}

#[tokio::test]
async fn menu_press_without_account_redirects_to_registration() {
    let bot = TestBot::new();

    bot.press(3, MenuAction::Referral, Language::En).await;

    let texts = bot.messenger.texts_to(3);
    assert_eq!(
        texts,
        vec![
            t(Language::Uz, "not-registered"),
            t(Language::Uz, "choose-language")
        ]
    );
    assert_eq!(bot.state(3), DialogueState::Registration(RegistrationStep::Language));
}

// ============================================================================
// Payments
// ============================================================================

async fn submit_screenshot(bot: &TestBot, user_id: i64) -> i64 {
    bot.press(user_id, MenuAction::Payment, Language::En).await;
    assert_eq!(bot.state(user_id), DialogueState::AwaitingScreenshot);
    bot.photo(user_id, "receipt-file").await;
    assert_eq!(bot.state(user_id), DialogueState::Idle);

    let pending = db::get_pending_payments(&bot.conn()).unwrap();
    pending.last().expect("pending payment").payment_id
}

#[tokio::test]
async fn screenshot_is_posted_for_review() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;

    let payment_id = submit_screenshot(&bot, 7).await;

    let posted = bot
        .messenger
        .sent()
        .into_iter()
        .find_map(|s| match s {
            Sent::Photo {
                chat_id,
                file_id,
                caption,
                keyboard,
            } if chat_id == ADMIN_CHAT => Some((file_id, caption, keyboard)),
            _ => None,
        })
        .expect("photo in admin chat");
    assert_eq!(posted.0, "receipt-file");
    let caption = posted.1.unwrap();
    assert!(caption.contains("🆔 7"), "{caption}");
    assert!(caption.contains("Alice"));
    assert_eq!(
        posted.2.unwrap().payloads(),
        vec![format!("approve_{payment_id}"), format!("reject_{payment_id}")]
    );

    let payment = db::get_payment(&bot.conn(), payment_id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.admin_message_id.is_some());

    let texts = bot.messenger.texts_to(7);
    assert!(texts.iter().any(|t| t.contains("$10.00")), "{texts:?}");
    assert_eq!(texts.last().unwrap(), &t(Language::En, "payment-success"));
}

#[tokio::test]
async fn approving_twice_grants_access_once() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;
    let payment_id = submit_screenshot(&bot, 7).await;
    let admin_message = db::get_payment(&bot.conn(), payment_id)
        .unwrap()
        .unwrap()
        .admin_message_id
        .unwrap();
    bot.messenger.take();

    bot.staff_select(&format!("approve_{payment_id}"), admin_message).await;
    bot.staff_select(&format!("approve_{payment_id}"), admin_message).await;

    let approvals = bot
        .messenger
        .texts_to(7)
        .into_iter()
        .filter(|text| text.contains(SECRET_LINK))
        .count();
    assert_eq!(approvals, 1);

    let conn = bot.conn();
    assert_eq!(
        db::get_payment(&conn, payment_id).unwrap().unwrap().status,
        PaymentStatus::Approved
    );
    assert!(db::get_user(&conn, 7).unwrap().unwrap().payment_status);

    let toasts: Vec<Option<String>> = bot
        .messenger
        .sent()
        .into_iter()
        .filter_map(|s| match s {
            Sent::Answer { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(toasts.len(), 2);
    assert!(toasts[0].as_deref().unwrap().contains(&format!("#{payment_id}")));
    assert!(toasts[1].as_deref().unwrap().contains("approved"));
    assert!(bot
        .messenger
        .sent()
        .iter()
        .any(|s| matches!(s, Sent::ClearActions(m) if m.chat_id == ADMIN_CHAT && m.message_id == admin_message)));
}

#[tokio::test]
async fn rejection_notifies_user_without_access() {
    let bot = TestBot::new();
    bot.register(7, Language::Ru, "Ivan", None).await;
    bot.press(7, MenuAction::Payment, Language::Ru).await;
    bot.photo(7, "receipt").await;
    let payment_id = db::get_pending_payments(&bot.conn()).unwrap()[0].payment_id;

    bot.staff_select(&format!("reject_{payment_id}"), 1).await;
    // approval after rejection changes nothing
    bot.staff_select(&format!("approve_{payment_id}"), 1).await;

    let conn = bot.conn();
    assert_eq!(
        db::get_payment(&conn, payment_id).unwrap().unwrap().status,
        PaymentStatus::Rejected
    );
    assert!(!db::get_user(&conn, 7).unwrap().unwrap().payment_status);
    let texts = bot.messenger.texts_to(7);
    assert!(texts.contains(&t(Language::Ru, "payment-rejected")));
    assert!(!texts.iter().any(|t| t.contains(SECRET_LINK)));
}

#[tokio::test]
async fn review_buttons_outside_admin_chat_are_ignored() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;
    let payment_id = submit_screenshot(&bot, 7).await;

    bot.select(7, &format!("approve_{payment_id}")).await;

    assert_eq!(
        db::get_payment(&bot.conn(), payment_id).unwrap().unwrap().status,
        PaymentStatus::Pending
    );
}

#[tokio::test]
async fn blocked_user_does_not_break_approval() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;
    let payment_id = submit_screenshot(&bot, 7).await;
    bot.messenger.fail_for(7);

    bot.staff_select(&format!("approve_{payment_id}"), 1).await;

    assert_eq!(
        db::get_payment(&bot.conn(), payment_id).unwrap().unwrap().status,
        PaymentStatus::Approved
    );
}

#[tokio::test]
async fn unreachable_staff_chat_still_acknowledges_screenshot() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;
    bot.messenger.fail_for(ADMIN_CHAT);

    let payment_id = submit_screenshot(&bot, 7).await;

    assert_eq!(bot.messenger.texts_to(7).last().unwrap(), &t(Language::En, "payment-success"));
    let pending = db::get_pending_payments(&bot.conn()).unwrap();
    assert_eq!(pending.len(), 1);
    let payment = db::get_payment(&bot.conn(), payment_id).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.admin_message_id, None);
}

#[tokio::test]
async fn notify_error_still_clears_review_buttons() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;
    let payment_id = submit_screenshot(&bot, 7).await;
    bot.messenger.take();
    bot.messenger.break_chat(7);

    bot.staff_select(&format!("approve_{payment_id}"), 41).await;

    assert_eq!(
        db::get_payment(&bot.conn(), payment_id).unwrap().unwrap().status,
        PaymentStatus::Approved
    );
    let sent = bot.messenger.sent();
    assert!(sent
        .iter()
        .any(|s| matches!(s, Sent::ClearActions(m) if m.chat_id == ADMIN_CHAT && m.message_id == 41)));
    assert!(sent
        .iter()
        .any(|s| matches!(s, Sent::Answer { text: Some(text), .. } if text.contains(&format!("#{payment_id}")))));
}

// ============================================================================
// FAQ and questions
// ============================================================================

#[tokio::test]
async fn faq_without_entries_in_language_shows_notice() {
    let bot = TestBot::new();
    bot.register(1, Language::Ru, "Ivan", None).await;
    db::add_faq(
        &bot.conn(),
        &NewFaq {
            question_en: Some("When?".into()),
            answer_en: Some("Mondays".into()),
            ..NewFaq::default()
        },
    )
    .unwrap();
    bot.messenger.take();

    bot.press(1, MenuAction::Questions, Language::Ru).await;
    bot.press(1, MenuAction::Faq, Language::Ru).await;

    let (text, _) = bot.messenger.last_text_to(1).unwrap();
    assert_eq!(text, t(Language::Ru, "no-faq"));
}

#[tokio::test]
async fn faq_lists_entries_in_user_language() {
    let bot = TestBot::new();
    bot.register(1, Language::En, "Alice", None).await;
    db::seed_faq(&bot.conn()).unwrap();

    bot.press(1, MenuAction::Faq, Language::En).await;

    let (text, _) = bot.messenger.last_text_to(1).unwrap();
    assert!(text.starts_with("❓ "), "{text}");
    assert_eq!(text.matches("❓ ").count(), 3);
}

#[tokio::test]
async fn question_is_forwarded_and_reply_relayed() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;

    bot.press(7, MenuAction::AskQuestion, Language::En).await;
    assert_eq!(bot.state(7), DialogueState::AwaitingQuestion);
    bot.text(7, "When does the course start?").await;
    assert_eq!(bot.state(7), DialogueState::Idle);
    assert_eq!(db::count_open_questions(&bot.conn(), 7).unwrap(), 1);

    let forwarded = bot
        .messenger
        .sent()
        .into_iter()
        .find_map(|s| match s {
            Sent::Html { chat_id, html } if chat_id == ADMIN_CHAT => Some(html),
            _ => None,
        })
        .expect("question forwarded");
    assert!(forwarded.contains("id:7"));
    assert!(forwarded.contains("When does the course start?"));
    assert_eq!(bot.messenger.texts_to(7).last().unwrap(), &t(Language::En, "question-sent"));

    bot.messenger.take();
    bot.staff_reply(&forwarded, Event::Text("Next Monday".into())).await;

    assert_eq!(bot.messenger.texts_to(7), vec!["Next Monday".to_string()]);
    assert_eq!(db::count_open_questions(&bot.conn(), 7).unwrap(), 0);
}

#[tokio::test]
async fn relay_handles_documents_and_unknown_content() {
    let bot = TestBot::new();
    bot.register(7, Language::En, "Alice", None).await;
    bot.messenger.take();

    bot.staff_reply(
        "📝 New question:\nid:7\n👤: Alice\n💬 hi",
        Event::Document {
            file_id: "doc-1".into(),
            caption: Some("Syllabus".into()),
        },
    )
    .await;
    bot.staff_reply("id:7", Event::Unsupported).await;

    let sent = bot.messenger.take();
    assert_eq!(
        sent[0],
        Sent::Document {
            chat_id: 7,
            file_id: "doc-1".into(),
            caption: Some("Syllabus".into())
        }
    );
    assert_eq!(sent[1].text(), Some(t(Language::En, "unknown-file-type").as_str()));
}

#[tokio::test]
async fn staff_chatter_without_marker_is_ignored() {
    let bot = TestBot::new();
    bot.staff_reply("just a message", Event::Text("ok".into())).await;
    assert!(bot.messenger.sent().is_empty());
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn settings_language_change_rerenders_panel() {
    let bot = TestBot::new();
    bot.register(1, Language::En, "Alice", None).await;

    bot.press(1, MenuAction::Settings, Language::En).await;
    bot.press(1, MenuAction::ChangeLanguage, Language::En).await;
    assert_eq!(bot.state(1), DialogueState::Settings(SettingsField::Language));
    bot.messenger.take();

    bot.select(1, "lang_ru").await;

    assert_eq!(bot.state(1), DialogueState::Idle);
    assert_eq!(db::get_user(&bot.conn(), 1).unwrap().unwrap().language, Language::Ru);
    let sent = bot.messenger.sent();
    assert_eq!(sent[0].text(), Some(t(Language::Ru, "language-changed").as_str()));
    assert!(matches!(&sent[1], Sent::Edit { text, .. } if *text == t(Language::Ru, "settings-title")));
}

#[tokio::test]
async fn settings_age_validates_then_saves() {
    let bot = TestBot::new();
    bot.register(1, Language::En, "Alice", None).await;

    bot.press(1, MenuAction::ChangeAge, Language::En).await;
    bot.text(1, "old").await;
    assert_eq!(bot.state(1), DialogueState::Settings(SettingsField::Age));

    bot.text(1, "27").await;
    assert_eq!(bot.state(1), DialogueState::Idle);
    assert_eq!(db::get_user(&bot.conn(), 1).unwrap().unwrap().age, Some(27));
    assert_eq!(bot.messenger.texts_to(1).last().unwrap(), &t(Language::En, "changes-saved"));
}

#[tokio::test]
async fn menu_press_abandons_pending_prompt() {
    let bot = TestBot::new();
    bot.register(1, Language::En, "Alice", None).await;

    bot.press(1, MenuAction::ChangeName, Language::En).await;
    bot.press(1, MenuAction::MainMenu, Language::En).await;

    assert_eq!(bot.state(1), DialogueState::Idle);
    assert_eq!(db::get_user(&bot.conn(), 1).unwrap().unwrap().full_name, "Alice");
}

#[tokio::test]
async fn referral_panel_reports_discount() {
    let bot = TestBot::new();
    bot.register(42, Language::En, "Referrer", None).await;
    bot.register(43, Language::En, "Friend", Some("ref42")).await;
    bot.conn()
        .execute("UPDATE users SET payment_status = 1 WHERE telegram_id = 43", [])
        .unwrap();

    bot.press(42, MenuAction::Referral, Language::En).await;

    let (text, _) = bot.messenger.last_text_to(42).unwrap();
    assert!(text.contains("https://t.me/course_bot?start=ref42"), "{text}");
    assert!(text.contains("10%"), "{text}");
    assert!(text.contains("$9.00"), "{text}");
}
