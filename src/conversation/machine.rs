//! Routing table of the dialogue.
//!
//! [`route`] maps (current state, inbound event) to an [`Action`] and the next
//! state. Rules are checked in a fixed priority order:
//!
//! 1. staff chat (reply relay, payment review)
//! 2. `/start`
//! 3. inline selections
//! 4. language-change interrupt during registration
//! 5. photos
//! 6. registration field capture
//! 7. menu buttons
//! 8. state-specific input
//! 9. everything else is ignored

use once_cell::sync::Lazy;
use regex::Regex;

use super::event::{parse_referral_token, Event, Inbound, Selection};
use super::menu::MenuAction;
use super::state::{DialogueState, RegistrationStep, SettingsField};
use crate::i18n::Language;
use crate::storage::db::Verdict;

static USER_MARKER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"id:(\d+)").ok());

/// Recovers the user id embedded in a forwarded question.
pub fn extract_user_marker(text: &str) -> Option<i64> {
    USER_MARKER
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Facts about the sender that routing depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteContext {
    pub registered: bool,
    pub from_admin_chat: bool,
}

/// Profile value entered from the settings panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Name(String),
    Phone(String),
    Age(u32),
    Region(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Ignore,
    ShowMainMenu,
    BeginRegistration { referrer: Option<i64> },
    /// Selection that does not apply in the current state.
    AcknowledgeSelection,
    ChooseRegistrationLanguage(Language),
    ConfirmSubscription,
    StartLanguageInterrupt,
    ResumeRegistration { language: Language, step: RegistrationStep },
    CaptureName(String),
    CapturePhone(String),
    CaptureAge(Option<u32>),
    /// Last field; commits the user.
    CaptureRegion(String),
    RejectAge,
    RepeatPrompt,
    PhotoNotExpected,
    SubmitPayment { file_id: String },
    OpenMenu(MenuAction),
    SubmitQuestion(String),
    SaveSetting(SettingValue),
    ChangeSettingsLanguage(Language),
    ReviewPayment { payment_id: i64, verdict: Verdict },
    RelayReply { user_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub next: DialogueState,
}

impl Transition {
    fn to(action: Action, next: DialogueState) -> Self {
        Self { action, next }
    }

    fn stay(action: Action, current: DialogueState) -> Self {
        Self { action, next: current }
    }
}

fn parse_age(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

/// State a menu action leads to.
fn menu_target(action: MenuAction) -> DialogueState {
    match action {
        MenuAction::Payment => DialogueState::AwaitingScreenshot,
        MenuAction::AskQuestion => DialogueState::AwaitingQuestion,
        MenuAction::ChangeName => DialogueState::Settings(SettingsField::Name),
        MenuAction::ChangeAge => DialogueState::Settings(SettingsField::Age),
        MenuAction::ChangePhone => DialogueState::Settings(SettingsField::Phone),
        MenuAction::ChangeRegion => DialogueState::Settings(SettingsField::Region),
        MenuAction::ChangeLanguage => DialogueState::Settings(SettingsField::Language),
        MenuAction::Questions
        | MenuAction::Referral
        | MenuAction::Settings
        | MenuAction::Faq
        | MenuAction::MainMenu
        | MenuAction::Skip => DialogueState::Idle,
    }
}

pub fn route(state: DialogueState, inbound: &Inbound, ctx: RouteContext) -> Transition {
    // 1. staff chat never touches the sender's dialogue
    if ctx.from_admin_chat {
        let action = match &inbound.event {
            Event::Selection {
                selection: Selection::Review { payment_id, verdict },
                ..
            } => Action::ReviewPayment {
                payment_id: *payment_id,
                verdict: *verdict,
            },
            Event::Selection { .. } => Action::AcknowledgeSelection,
            Event::Start { .. } => Action::Ignore,
            _ => match inbound.reply_to.as_deref().and_then(extract_user_marker) {
                Some(user_id) => Action::RelayReply { user_id },
                None => Action::Ignore,
            },
        };
        return Transition::stay(action, state);
    }

    // 2. start
    if let Event::Start { payload } = &inbound.event {
        return if ctx.registered {
            Transition::to(Action::ShowMainMenu, DialogueState::Idle)
        } else {
            let referrer = payload.as_deref().and_then(parse_referral_token);
            Transition::to(
                Action::BeginRegistration { referrer },
                DialogueState::Registration(RegistrationStep::Language),
            )
        };
    }

    // 3. selections
    if let Event::Selection { selection, .. } = &inbound.event {
        return route_selection(state, selection);
    }

    let menu_action = inbound.text().and_then(MenuAction::from_label);

    // 4. language-change interrupt
    if let DialogueState::Registration(step) = state {
        if step.is_field() && menu_action == Some(MenuAction::ChangeLanguage) {
            return Transition::to(
                Action::StartLanguageInterrupt,
                DialogueState::LanguageInterrupt { resume: step },
            );
        }
    }

    // 5. photos
    if let Event::Photo { file_id, .. } = &inbound.event {
        return if state == DialogueState::AwaitingScreenshot {
            Transition::to(
                Action::SubmitPayment {
                    file_id: file_id.clone(),
                },
                DialogueState::Idle,
            )
        } else {
            Transition::stay(Action::PhotoNotExpected, state)
        };
    }

    // 6. registration fields
    if let DialogueState::Registration(step) = state {
        return route_registration(step, inbound, menu_action);
    }
    if let DialogueState::LanguageInterrupt { .. } = state {
        return Transition::stay(Action::RepeatPrompt, state);
    }

    // 7. menu buttons
    if let Some(action) = menu_action.filter(|a| *a != MenuAction::Skip) {
        return Transition::to(Action::OpenMenu(action), menu_target(action));
    }

    // 8. state-specific input
    route_input(state, inbound)
}

fn route_selection(state: DialogueState, selection: &Selection) -> Transition {
    match (selection, state) {
        (Selection::Language(language), DialogueState::Registration(RegistrationStep::Language)) => Transition::to(
            Action::ChooseRegistrationLanguage(*language),
            DialogueState::Registration(RegistrationStep::Subscription),
        ),
        (Selection::Language(language), DialogueState::LanguageInterrupt { resume }) => Transition::to(
            Action::ResumeRegistration {
                language: *language,
                step: resume,
            },
            DialogueState::Registration(resume),
        ),
        (Selection::Language(language), DialogueState::Settings(SettingsField::Language)) => {
            Transition::to(Action::ChangeSettingsLanguage(*language), DialogueState::Idle)
        }
        (Selection::ContinueAfterSubscription, DialogueState::Registration(RegistrationStep::Subscription)) => {
            Transition::to(
                Action::ConfirmSubscription,
                DialogueState::Registration(RegistrationStep::Name),
            )
        }
        // review buttons outside the staff chat, stale pickers, unknown payloads
        _ => Transition::stay(Action::AcknowledgeSelection, state),
    }
}

fn route_registration(step: RegistrationStep, inbound: &Inbound, menu_action: Option<MenuAction>) -> Transition {
    let current = DialogueState::Registration(step);
    let advance = |action: Action| match step.next() {
        Some(next) => Transition::to(action, DialogueState::Registration(next)),
        None => Transition::to(action, DialogueState::Idle),
    };

    match (step, &inbound.event) {
        (RegistrationStep::Name, Event::Text(text)) => advance(Action::CaptureName(text.trim().to_string())),
        (RegistrationStep::Phone, Event::Contact { phone }) => advance(Action::CapturePhone(phone.clone())),
        (RegistrationStep::Phone, Event::Text(text)) => advance(Action::CapturePhone(text.trim().to_string())),
        (RegistrationStep::Age, Event::Text(text)) => {
            if menu_action == Some(MenuAction::Skip) {
                advance(Action::CaptureAge(None))
            } else {
                match parse_age(text) {
                    Some(age) => advance(Action::CaptureAge(Some(age))),
                    None => Transition::stay(Action::RejectAge, current),
                }
            }
        }
        (RegistrationStep::Region, Event::Text(text)) => advance(Action::CaptureRegion(text.trim().to_string())),
        _ => Transition::stay(Action::RepeatPrompt, current),
    }
}

fn route_input(state: DialogueState, inbound: &Inbound) -> Transition {
    match (state, &inbound.event) {
        (DialogueState::AwaitingQuestion, Event::Text(text)) => {
            Transition::to(Action::SubmitQuestion(text.clone()), DialogueState::Idle)
        }
        (DialogueState::Settings(SettingsField::Name), Event::Text(text)) => Transition::to(
            Action::SaveSetting(SettingValue::Name(text.trim().to_string())),
            DialogueState::Idle,
        ),
        (DialogueState::Settings(SettingsField::Phone), Event::Contact { phone }) => Transition::to(
            Action::SaveSetting(SettingValue::Phone(phone.clone())),
            DialogueState::Idle,
        ),
        (DialogueState::Settings(SettingsField::Phone), Event::Text(text)) => Transition::to(
            Action::SaveSetting(SettingValue::Phone(text.trim().to_string())),
            DialogueState::Idle,
        ),
        (DialogueState::Settings(SettingsField::Age), Event::Text(text)) => match parse_age(text) {
            Some(age) => Transition::to(Action::SaveSetting(SettingValue::Age(age)), DialogueState::Idle),
            None => Transition::stay(Action::RejectAge, state),
        },
        (DialogueState::Settings(SettingsField::Region), Event::Text(text)) => Transition::to(
            Action::SaveSetting(SettingValue::Region(text.trim().to_string())),
            DialogueState::Idle,
        ),
        (DialogueState::Idle, _) => Transition::stay(Action::Ignore, state),
        _ => Transition::stay(Action::RepeatPrompt, state),
    }
}
