//! Canonical menu actions and the keyboards that carry them.
//!
//! Reply-keyboard buttons come back from the transport as plain text, so every
//! rendered label is indexed once, across all languages, to its [`MenuAction`].

use once_cell::sync::Lazy;
use std::collections::HashMap;
use strum::{EnumIter, IntoEnumIterator};

use super::event::Selection;
use crate::i18n::{t, Language};
use crate::storage::db::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum MenuAction {
    Payment,
    Questions,
    Referral,
    Settings,
    Faq,
    AskQuestion,
    MainMenu,
    ChangeName,
    ChangeAge,
    ChangePhone,
    ChangeRegion,
    ChangeLanguage,
    Skip,
}

impl MenuAction {
    fn key(self) -> &'static str {
        match self {
            MenuAction::Payment => "menu-payment",
            MenuAction::Questions => "menu-questions",
            MenuAction::Referral => "menu-referral",
            MenuAction::Settings => "menu-settings",
            MenuAction::Faq => "menu-faq",
            MenuAction::AskQuestion => "menu-ask-question",
            MenuAction::MainMenu => "menu-main-menu",
            MenuAction::ChangeName => "menu-change-name",
            MenuAction::ChangeAge => "menu-change-age",
            MenuAction::ChangePhone => "menu-change-phone",
            MenuAction::ChangeRegion => "menu-change-region",
            MenuAction::ChangeLanguage => "menu-change-language",
            MenuAction::Skip => "menu-skip",
        }
    }

    pub fn label(self, lang: Language) -> String {
        t(lang, self.key())
    }

    /// Resolves a pressed label in any language.
    pub fn from_label(text: &str) -> Option<MenuAction> {
        LABEL_INDEX.get(text.trim()).copied()
    }
}

static LABEL_INDEX: Lazy<HashMap<String, MenuAction>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for lang in Language::all() {
        for action in MenuAction::iter() {
            index.insert(action.label(lang), action);
        }
    }
    index
});

/// Region keys, in keyboard order.
pub const REGIONS: [&str; 14] = [
    "tashkent-city",
    "tashkent",
    "andijan",
    "bukhara",
    "fergana",
    "jizzakh",
    "kashkadarya",
    "khorezm",
    "namangan",
    "navoi",
    "samarkand",
    "sirdarya",
    "surkhandarya",
    "karakalpakstan",
];

pub fn region_label(lang: Language, key: &str) -> String {
    t(lang, &format!("region-{}", key))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonKind {
    Action(MenuAction),
    /// Asks the client to share the phone number.
    RequestContact,
    /// Text sent back verbatim (regions).
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyButton {
    pub label: String,
    pub kind: ButtonKind,
}

impl ReplyButton {
    fn action(action: MenuAction, lang: Language) -> Self {
        Self {
            label: action.label(lang),
            kind: ButtonKind::Action(action),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub payload: String,
}

impl InlineButton {
    fn new(label: impl Into<String>, selection: &Selection) -> Self {
        Self {
            label: label.into(),
            payload: selection.payload(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply keyboard; `one_time` hides it after a press.
    Reply {
        rows: Vec<Vec<ReplyButton>>,
        one_time: bool,
    },
    Inline(Vec<Vec<InlineButton>>),
    Remove,
}

impl Keyboard {
    /// Every inline payload on the keyboard, row by row.
    pub fn payloads(&self) -> Vec<&str> {
        match self {
            Keyboard::Inline(rows) => rows.iter().flatten().map(|b| b.payload.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Every reply action on the keyboard.
    pub fn actions(&self) -> Vec<MenuAction> {
        match self {
            Keyboard::Reply { rows, .. } => rows
                .iter()
                .flatten()
                .filter_map(|b| match b.kind {
                    ButtonKind::Action(action) => Some(action),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn reply_rows(lang: Language, rows: &[&[MenuAction]]) -> Vec<Vec<ReplyButton>> {
    rows.iter()
        .map(|row| row.iter().map(|action| ReplyButton::action(*action, lang)).collect())
        .collect()
}

pub fn language_picker() -> Keyboard {
    Keyboard::Inline(
        Language::all()
            .map(|lang| vec![InlineButton::new(lang.native_name(), &Selection::Language(lang))])
            .collect(),
    )
}

pub fn subscription_continue(lang: Language) -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::new(
        t(lang, "continue-button"),
        &Selection::ContinueAfterSubscription,
    )]])
}

/// Name prompt: only the language switch.
pub fn name_prompt(lang: Language) -> Keyboard {
    Keyboard::Reply {
        rows: reply_rows(lang, &[&[MenuAction::ChangeLanguage]]),
        one_time: true,
    }
}

pub fn contact_request(lang: Language, with_language_switch: bool) -> Keyboard {
    let mut rows = vec![vec![ReplyButton {
        label: t(lang, "share-contact"),
        kind: ButtonKind::RequestContact,
    }]];
    if with_language_switch {
        rows.push(vec![ReplyButton::action(MenuAction::ChangeLanguage, lang)]);
    }
    Keyboard::Reply { rows, one_time: true }
}

pub fn skip(lang: Language) -> Keyboard {
    Keyboard::Reply {
        rows: reply_rows(lang, &[&[MenuAction::Skip], &[MenuAction::ChangeLanguage]]),
        one_time: true,
    }
}

pub fn regions(lang: Language, with_language_switch: bool) -> Keyboard {
    let mut rows: Vec<Vec<ReplyButton>> = REGIONS
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|key| ReplyButton {
                    label: region_label(lang, key),
                    kind: ButtonKind::Plain,
                })
                .collect()
        })
        .collect();
    if with_language_switch {
        rows.push(vec![ReplyButton::action(MenuAction::ChangeLanguage, lang)]);
    }
    Keyboard::Reply { rows, one_time: true }
}

pub fn main_menu(lang: Language) -> Keyboard {
    Keyboard::Reply {
        rows: reply_rows(
            lang,
            &[
                &[MenuAction::Payment, MenuAction::Questions],
                &[MenuAction::Referral, MenuAction::Settings],
            ],
        ),
        one_time: false,
    }
}

pub fn questions_menu(lang: Language) -> Keyboard {
    Keyboard::Reply {
        rows: reply_rows(
            lang,
            &[&[MenuAction::Faq, MenuAction::AskQuestion], &[MenuAction::MainMenu]],
        ),
        one_time: false,
    }
}

pub fn settings_menu(lang: Language) -> Keyboard {
    Keyboard::Reply {
        rows: reply_rows(
            lang,
            &[
                &[MenuAction::ChangeName, MenuAction::ChangeAge],
                &[MenuAction::ChangePhone, MenuAction::ChangeRegion],
                &[MenuAction::ChangeLanguage],
                &[MenuAction::MainMenu],
            ],
        ),
        one_time: false,
    }
}

/// Single "main menu" button shown while a flow waits for input.
pub fn back_to_menu(lang: Language) -> Keyboard {
    Keyboard::Reply {
        rows: reply_rows(lang, &[&[MenuAction::MainMenu]]),
        one_time: false,
    }
}

/// Approve/reject buttons under a payment screenshot in the admin chat.
pub fn payment_review(admin_lang: Language, payment_id: i64) -> Keyboard {
    Keyboard::Inline(vec![vec![
        InlineButton::new(
            t(admin_lang, "admin-approve-button"),
            &Selection::Review {
                payment_id,
                verdict: Verdict::Approve,
            },
        ),
        InlineButton::new(
            t(admin_lang, "admin-reject-button"),
            &Selection::Review {
                payment_id,
                verdict: Verdict::Reject,
            },
        ),
    ]])
}
