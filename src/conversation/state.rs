//! Dialogue states and the per-user session record.

use crate::i18n::Language;
use crate::storage::db::NewUser;

/// Steps of the registration dialogue, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationStep {
    Language,
    Subscription,
    Name,
    Phone,
    Age,
    Region,
}

impl RegistrationStep {
    /// Free-input steps; only these can be interrupted by a language change.
    pub fn is_field(self) -> bool {
        matches!(
            self,
            RegistrationStep::Name | RegistrationStep::Phone | RegistrationStep::Age | RegistrationStep::Region
        )
    }

    /// Step that follows once this one is captured. `None` after the region commits.
    pub fn next(self) -> Option<RegistrationStep> {
        match self {
            RegistrationStep::Language => Some(RegistrationStep::Subscription),
            RegistrationStep::Subscription => Some(RegistrationStep::Name),
            RegistrationStep::Name => Some(RegistrationStep::Phone),
            RegistrationStep::Phone => Some(RegistrationStep::Age),
            RegistrationStep::Age => Some(RegistrationStep::Region),
            RegistrationStep::Region => None,
        }
    }
}

/// Profile field edited from the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    Name,
    Phone,
    Age,
    Region,
    Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogueState {
    /// No active flow; main-menu context.
    #[default]
    Idle,
    Registration(RegistrationStep),
    /// Language picker shown mid-registration; `resume` is the interrupted step.
    LanguageInterrupt {
        resume: RegistrationStep,
    },
    AwaitingScreenshot,
    AwaitingQuestion,
    Settings(SettingsField),
}

impl DialogueState {
    pub fn is_registration(self) -> bool {
        matches!(
            self,
            DialogueState::Registration(_) | DialogueState::LanguageInterrupt { .. }
        )
    }
}

/// Fields accumulated while a user walks through registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub language: Option<Language>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub region: Option<String>,
    pub referrer: Option<i64>,
}

impl RegistrationDraft {
    /// Builds the row to store. `None` while name, phone or region is missing.
    pub fn to_new_user(&self, telegram_id: i64, username: Option<String>) -> Option<NewUser> {
        Some(NewUser {
            telegram_id,
            username,
            full_name: self.full_name.clone()?,
            phone: self.phone.clone()?,
            age: self.age,
            region: self.region.clone()?,
            language: self.language.unwrap_or_default(),
            referrer_candidate: self.referrer,
        })
    }
}

/// Transient dialogue context of one user. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub state: DialogueState,
    pub draft: RegistrationDraft,
}

impl Session {
    pub fn with_referrer(referrer: Option<i64>) -> Self {
        Self {
            state: DialogueState::Registration(RegistrationStep::Language),
            draft: RegistrationDraft {
                referrer,
                ..RegistrationDraft::default()
            },
        }
    }
}
