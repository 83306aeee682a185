//! Executes routed actions against the store and the messenger.

use fluent_templates::fluent_bundle::FluentArgs;
use std::sync::Arc;

use super::event::{Event, Inbound, MessageRef};
use super::machine::{route, Action, RouteContext, SettingValue};
use super::menu::{self, Keyboard, MenuAction};
use super::outbound::Messenger;
use super::session::SessionStore;
use super::state::{DialogueState, RegistrationStep, Session, SettingsField};
use crate::core::config::BotSettings;
use crate::core::discount;
use crate::core::error::{AppError, AppResult};
use crate::i18n::{t, t_args, Language};
use crate::payments::PaymentDesk;
use crate::storage::db::{self, DbPool, RegistrationOutcome, User};
use crate::storage::get_connection;

/// Dialogue engine: one instance serves every user.
pub struct Engine {
    db_pool: Arc<DbPool>,
    sessions: Arc<SessionStore>,
    messenger: Arc<dyn Messenger>,
    settings: Arc<BotSettings>,
    desk: PaymentDesk,
}

/// Prompt text and keyboard for a registration step.
fn registration_prompt(step: RegistrationStep, lang: Language, settings: &BotSettings) -> (String, Keyboard) {
    match step {
        RegistrationStep::Language => (t(lang, "choose-language"), menu::language_picker()),
        RegistrationStep::Subscription => {
            let mut args = FluentArgs::new();
            args.set("channel", settings.channel_username.clone());
            (
                t_args(lang, "subscription-required", &args),
                menu::subscription_continue(lang),
            )
        }
        RegistrationStep::Name => (t(lang, "enter-name"), menu::name_prompt(lang)),
        RegistrationStep::Phone => (t(lang, "enter-phone"), menu::contact_request(lang, true)),
        RegistrationStep::Age => (t(lang, "enter-age"), menu::skip(lang)),
        RegistrationStep::Region => (t(lang, "enter-region"), menu::regions(lang, true)),
    }
}

fn settings_prompt(field: SettingsField, lang: Language) -> (String, Keyboard) {
    match field {
        SettingsField::Name => (t(lang, "settings-enter-name"), menu::back_to_menu(lang)),
        SettingsField::Phone => (t(lang, "settings-enter-phone"), menu::contact_request(lang, false)),
        SettingsField::Age => (t(lang, "settings-enter-age"), menu::back_to_menu(lang)),
        SettingsField::Region => (t(lang, "settings-enter-region"), menu::regions(lang, false)),
        SettingsField::Language => (t(lang, "choose-language"), menu::language_picker()),
    }
}

fn format_faq(entries: &[db::FaqEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("❓ {}\n💬 {}", entry.question, entry.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn selection_meta(inbound: &Inbound) -> Option<(&str, Option<MessageRef>)> {
    match &inbound.event {
        Event::Selection { id, message, .. } => Some((id.as_str(), *message)),
        _ => None,
    }
}

impl Engine {
    pub fn new(db_pool: Arc<DbPool>, messenger: Arc<dyn Messenger>, settings: Arc<BotSettings>) -> Self {
        let desk = PaymentDesk::new(Arc::clone(&db_pool), Arc::clone(&messenger), Arc::clone(&settings));
        Self {
            db_pool,
            sessions: Arc::new(SessionStore::new()),
            messenger,
            settings,
            desk,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    /// Handles one inbound event to completion.
    ///
    /// The session advances only when every outbound step succeeded. A missing
    /// user record where one is required sends the user back to registration.
    pub async fn handle(&self, inbound: Inbound) -> AppResult<()> {
        let _guard = self.sessions.lock_user(inbound.user_id).await;

        let user = {
            let conn = get_connection(&self.db_pool)?;
            db::get_user(&conn, inbound.user_id)?
        };
        let ctx = RouteContext {
            registered: user.is_some(),
            from_admin_chat: self.settings.is_admin_chat(inbound.chat_id),
        };

        let mut session = self.sessions.get(inbound.user_id);
        let current = session.state;
        let transition = route(current, &inbound, ctx);
        log::debug!(
            "user {} chat {}: {:?} in {:?} -> {:?}",
            inbound.user_id,
            inbound.chat_id,
            transition.action,
            current,
            transition.next
        );

        if ctx.from_admin_chat {
            return self.execute_staff(&transition.action, &inbound).await;
        }

        session.state = transition.next;
        match self
            .execute(&transition.action, current, &mut session, user.as_ref(), &inbound)
            .await
        {
            Ok(()) => {}
            Err(AppError::NotRegistered(user_id)) => {
                log::info!("User {} is not registered, redirecting to registration", user_id);
                session = self.redirect_to_registration(&inbound, &session).await?;
            }
            Err(e) => return Err(e),
        }

        if session.state != current {
            log::info!("user {} state {:?} -> {:?}", inbound.user_id, current, session.state);
        }
        self.sessions.set(inbound.user_id, session);
        Ok(())
    }

    fn language_for(user: Option<&User>, session: &Session) -> Language {
        session
            .draft
            .language
            .or(user.map(|u| u.language))
            .unwrap_or_default()
    }

    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> AppResult<()> {
        self.messenger.send_text(chat_id, text, keyboard).await.map(|_| ())
    }

    /// Edits the message that carried the pressed button, or sends a new one.
    async fn edit_or_send(&self, inbound: &Inbound, text: &str, keyboard: Option<&Keyboard>) -> AppResult<()> {
        match selection_meta(inbound).and_then(|(_, message)| message) {
            Some(message) => self.messenger.edit_text(message, text, keyboard).await,
            None => self.send(inbound.chat_id, text, keyboard).await,
        }
    }

    async fn acknowledge(&self, inbound: &Inbound, text: Option<&str>) -> AppResult<()> {
        match selection_meta(inbound) {
            Some((id, _)) => self.messenger.answer_selection(id, text).await,
            None => Ok(()),
        }
    }

    async fn redirect_to_registration(&self, inbound: &Inbound, session: &Session) -> AppResult<Session> {
        let lang = session.draft.language.unwrap_or_default();
        self.acknowledge(inbound, None).await?;
        self.send(inbound.chat_id, &t(lang, "not-registered"), Some(&Keyboard::Remove))
            .await?;
        let (text, keyboard) = registration_prompt(RegistrationStep::Language, lang, &self.settings);
        self.send(inbound.chat_id, &text, Some(&keyboard)).await?;
        Ok(Session::with_referrer(session.draft.referrer))
    }

    async fn repeat_prompt(&self, state: DialogueState, lang: Language, chat_id: i64) -> AppResult<()> {
        let (text, keyboard) = match state {
            DialogueState::Idle => return Ok(()),
            DialogueState::Registration(step) => registration_prompt(step, lang, &self.settings),
            DialogueState::LanguageInterrupt { .. } => (t(lang, "choose-language"), menu::language_picker()),
            DialogueState::AwaitingScreenshot => (t(lang, "payment-reminder"), menu::back_to_menu(lang)),
            DialogueState::AwaitingQuestion => (t(lang, "enter-question"), menu::back_to_menu(lang)),
            DialogueState::Settings(field) => settings_prompt(field, lang),
        };
        self.send(chat_id, &text, Some(&keyboard)).await
    }

    async fn execute(
        &self,
        action: &Action,
        current: DialogueState,
        session: &mut Session,
        user: Option<&User>,
        inbound: &Inbound,
    ) -> AppResult<()> {
        let chat_id = inbound.chat_id;
        let lang = Self::language_for(user, session);
        let require_user = || user.ok_or(AppError::NotRegistered(inbound.user_id));

        match action {
            Action::Ignore => Ok(()),

            Action::ShowMainMenu => {
                *session = Session::default();
                let user = require_user()?;
                self.send(chat_id, &t(user.language, "main-menu"), Some(&menu::main_menu(user.language)))
                    .await
            }

            Action::BeginRegistration { referrer } => {
                *session = Session::with_referrer(*referrer);
                let (text, keyboard) = registration_prompt(RegistrationStep::Language, Language::default(), &self.settings);
                self.send(chat_id, &text, Some(&keyboard)).await
            }

            Action::AcknowledgeSelection => {
                log::debug!("Stale or unknown selection from {} in {:?}", inbound.user_id, current);
                self.acknowledge(inbound, None).await
            }

            Action::ChooseRegistrationLanguage(language) => {
                session.draft.language = Some(*language);
                self.acknowledge(inbound, None).await?;
                let (text, keyboard) = registration_prompt(RegistrationStep::Subscription, *language, &self.settings);
                self.edit_or_send(inbound, &text, Some(&keyboard)).await
            }

            Action::ConfirmSubscription => {
                self.acknowledge(inbound, None).await?;
                self.edit_or_send(inbound, &t(lang, "welcome"), None).await?;
                let (text, keyboard) = registration_prompt(RegistrationStep::Name, lang, &self.settings);
                self.send(chat_id, &text, Some(&keyboard)).await
            }

            Action::StartLanguageInterrupt => {
                self.send(chat_id, &t(lang, "choose-language"), Some(&menu::language_picker()))
                    .await
            }

            Action::ResumeRegistration { language, step } => {
                session.draft.language = Some(*language);
                self.acknowledge(inbound, None).await?;
                self.edit_or_send(inbound, &t(*language, "language-changed"), None).await?;
                let (text, keyboard) = registration_prompt(*step, *language, &self.settings);
                self.send(chat_id, &text, Some(&keyboard)).await
            }

            Action::CaptureName(name) => {
                session.draft.full_name = Some(name.clone());
                let (text, keyboard) = registration_prompt(RegistrationStep::Phone, lang, &self.settings);
                self.send(chat_id, &text, Some(&keyboard)).await
            }

            Action::CapturePhone(phone) => {
                session.draft.phone = Some(phone.clone());
                let (text, keyboard) = registration_prompt(RegistrationStep::Age, lang, &self.settings);
                self.send(chat_id, &text, Some(&keyboard)).await
            }

            Action::CaptureAge(age) => {
                session.draft.age = *age;
                let (text, keyboard) = registration_prompt(RegistrationStep::Region, lang, &self.settings);
                self.send(chat_id, &text, Some(&keyboard)).await
            }

            Action::CaptureRegion(region) => {
                session.draft.region = Some(region.clone());
                self.commit_registration(session, inbound, lang).await
            }

            Action::RejectAge => {
                let keyboard = if current.is_registration() {
                    menu::skip(lang)
                } else {
                    menu::back_to_menu(lang)
                };
                self.send(chat_id, &t(lang, "age-invalid"), Some(&keyboard)).await
            }

            Action::RepeatPrompt => self.repeat_prompt(current, lang, chat_id).await,

            Action::PhotoNotExpected => self.send(chat_id, &t(lang, "photo-not-expected"), None).await,

            Action::SubmitPayment { file_id } => {
                let user = require_user()?;
                self.desk.submit_payment(user, file_id).await.map(|_| ())
            }

            Action::OpenMenu(menu_action) => {
                let user = require_user()?;
                self.open_menu(*menu_action, user, chat_id).await
            }

            Action::SubmitQuestion(text) => {
                let user = require_user()?;
                self.desk
                    .submit_question(user, inbound.username.as_deref(), text)
                    .await
            }

            Action::SaveSetting(value) => {
                let user = require_user()?;
                self.save_setting(user, value).await
            }

            Action::ChangeSettingsLanguage(language) => {
                let user = require_user()?;
                let updated = {
                    let conn = get_connection(&self.db_pool)?;
                    db::update_user_language(&conn, user.telegram_id, *language)?
                };
                if !updated {
                    return Err(AppError::NotRegistered(user.telegram_id));
                }
                log::info!("User {} switched language to {}", user.telegram_id, language);
                self.acknowledge(inbound, Some(&t(*language, "language-changed"))).await?;
                self.edit_or_send(inbound, &t(*language, "settings-title"), None).await?;
                self.send(
                    chat_id,
                    &t(*language, "changes-saved"),
                    Some(&menu::settings_menu(*language)),
                )
                .await
            }

            Action::ReviewPayment { .. } | Action::RelayReply { .. } => {
                log::warn!("Staff action {:?} outside the admin chat from {}", action, inbound.user_id);
                Ok(())
            }
        }
    }

    async fn commit_registration(&self, session: &mut Session, inbound: &Inbound, lang: Language) -> AppResult<()> {
        let Some(new_user) = session.draft.to_new_user(inbound.user_id, inbound.username.clone()) else {
            log::warn!(
                "Incomplete registration draft for {}, restarting: {:?}",
                inbound.user_id,
                session.draft
            );
            *session = Session::with_referrer(session.draft.referrer);
            let (text, keyboard) = registration_prompt(RegistrationStep::Language, lang, &self.settings);
            return self.send(inbound.chat_id, &text, Some(&keyboard)).await;
        };

        let outcome = {
            let conn = get_connection(&self.db_pool)?;
            db::register_user(&conn, &new_user)?
        };
        match outcome {
            RegistrationOutcome::Created { referrer: Some(referrer) } => {
                log::info!("Registered user {} referred by {}", new_user.telegram_id, referrer)
            }
            RegistrationOutcome::Created { referrer: None } => log::info!("Registered user {}", new_user.telegram_id),
            RegistrationOutcome::Updated => log::info!("Re-registered user {}", new_user.telegram_id),
        }

        *session = Session::default();
        self.send(
            inbound.chat_id,
            &t(lang, "registration-complete"),
            Some(&menu::main_menu(lang)),
        )
        .await
    }

    async fn open_menu(&self, action: MenuAction, user: &User, chat_id: i64) -> AppResult<()> {
        let lang = user.language;
        match action {
            MenuAction::Payment => {
                let stats = {
                    let conn = get_connection(&self.db_pool)?;
                    db::get_referral_stats(&conn, user.telegram_id)?
                };
                let price = discount::discounted_price_cents(self.settings.base_price_cents, stats.paid_referrals);
                let mut args = FluentArgs::new();
                args.set("price", discount::format_price(price));
                self.send(
                    chat_id,
                    &t_args(lang, "payment-instruction", &args),
                    Some(&menu::back_to_menu(lang)),
                )
                .await
            }
            MenuAction::Questions => {
                self.send(chat_id, &t(lang, "questions-title"), Some(&menu::questions_menu(lang)))
                    .await
            }
            MenuAction::Referral => {
                let stats = {
                    let conn = get_connection(&self.db_pool)?;
                    db::get_referral_stats(&conn, user.telegram_id)?
                };
                let price = discount::discounted_price_cents(self.settings.base_price_cents, stats.paid_referrals);
                let mut args = FluentArgs::new();
                args.set("link", self.settings.referral_link(user.telegram_id));
                args.set("count", stats.referral_count.to_string());
                args.set("paid", stats.paid_referrals.to_string());
                args.set("discount", discount::discount_percent(stats.paid_referrals).to_string());
                args.set("price", discount::format_price(price));
                self.send(chat_id, &t_args(lang, "referral-info", &args), None).await
            }
            MenuAction::Settings => {
                self.send(chat_id, &t(lang, "settings-title"), Some(&menu::settings_menu(lang)))
                    .await
            }
            MenuAction::Faq => {
                let entries = {
                    let conn = get_connection(&self.db_pool)?;
                    db::get_faq(&conn, lang)?
                };
                if entries.is_empty() {
                    self.send(chat_id, &t(lang, "no-faq"), None).await
                } else {
                    self.send(chat_id, &format_faq(&entries), None).await
                }
            }
            MenuAction::AskQuestion => {
                self.send(chat_id, &t(lang, "enter-question"), Some(&menu::back_to_menu(lang)))
                    .await
            }
            MenuAction::MainMenu => {
                self.send(chat_id, &t(lang, "main-menu"), Some(&menu::main_menu(lang)))
                    .await
            }
            MenuAction::ChangeName => self.send_settings_prompt(SettingsField::Name, lang, chat_id).await,
            MenuAction::ChangeAge => self.send_settings_prompt(SettingsField::Age, lang, chat_id).await,
            MenuAction::ChangePhone => self.send_settings_prompt(SettingsField::Phone, lang, chat_id).await,
            MenuAction::ChangeRegion => self.send_settings_prompt(SettingsField::Region, lang, chat_id).await,
            MenuAction::ChangeLanguage => {
                self.send_settings_prompt(SettingsField::Language, lang, chat_id)
                    .await
            }
            MenuAction::Skip => Ok(()),
        }
    }

    async fn send_settings_prompt(&self, field: SettingsField, lang: Language, chat_id: i64) -> AppResult<()> {
        let (text, keyboard) = settings_prompt(field, lang);
        self.send(chat_id, &text, Some(&keyboard)).await
    }

    async fn save_setting(&self, user: &User, value: &SettingValue) -> AppResult<()> {
        let updated = {
            let conn = get_connection(&self.db_pool)?;
            match value {
                SettingValue::Name(name) => db::update_user_name(&conn, user.telegram_id, name)?,
                SettingValue::Phone(phone) => db::update_user_phone(&conn, user.telegram_id, phone)?,
                SettingValue::Age(age) => db::update_user_age(&conn, user.telegram_id, Some(*age))?,
                SettingValue::Region(region) => db::update_user_region(&conn, user.telegram_id, region)?,
            }
        };
        if !updated {
            return Err(AppError::NotRegistered(user.telegram_id));
        }
        log::info!("User {} updated {:?}", user.telegram_id, value);
        self.send(
            user.telegram_id,
            &t(user.language, "changes-saved"),
            Some(&menu::main_menu(user.language)),
        )
        .await
    }

    async fn execute_staff(&self, action: &Action, inbound: &Inbound) -> AppResult<()> {
        match action {
            Action::ReviewPayment { payment_id, verdict } => {
                let Some((selection_id, message)) = selection_meta(inbound) else {
                    return Ok(());
                };
                let outcome = self
                    .desk
                    .review_payment(selection_id, message, *payment_id, *verdict)
                    .await?;
                log::info!(
                    "Payment {} {:?} by staff member {}: {:?}",
                    payment_id,
                    verdict,
                    inbound.user_id,
                    outcome
                );
                Ok(())
            }
            Action::AcknowledgeSelection => self.acknowledge(inbound, None).await,
            Action::RelayReply { user_id } => self.desk.relay_reply(*user_id, &inbound.event).await,
            _ => Ok(()),
        }
    }
}
