use std::collections::HashMap;

use fluent_templates::{
    fluent_bundle::{FluentArgs, FluentValue},
    static_loader, Loader,
};
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use unic_langid::LanguageIdentifier;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "uz",
        // Keep interpolated links and numbers free of bidi isolation marks.
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Languages the bot talks in. The stored code is the lowercase variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, EnumString, IntoStaticStr, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    #[default]
    Uz,
    Ru,
    En,
}

impl Language {
    /// Two-letter code as stored in the `users.language` column.
    pub fn code(self) -> &'static str {
        self.into()
    }

    /// Parses a stored or transport-provided code ("ru", "en-US", "UZ").
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.split(['-', '_']).next().unwrap_or(code);
        normalized.parse().ok()
    }

    /// Like [`Language::from_code`] but falls back to the default language.
    pub fn from_code_or_default(code: &str) -> Self {
        Self::from_code(code).unwrap_or_default()
    }

    /// Label shown on the language picker; identical in every UI language.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::Uz => "🇺🇿 O'zbek",
            Language::Ru => "🇷🇺 Русский",
            Language::En => "🇬🇧 English",
        }
    }

    pub fn langid(self) -> LanguageIdentifier {
        self.code().parse().unwrap_or_default()
    }

    pub fn all() -> impl Iterator<Item = Language> {
        Language::iter()
    }
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: Language, key: &str) -> String {
    let text = LOCALES
        .lookup(&lang.langid(), key)
        .unwrap_or_else(|| LOCALES.lookup(&Language::default().langid(), key).unwrap_or_else(|| key.to_string()));
    text.replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
pub fn t_args(lang: Language, key: &str, args: &FluentArgs) -> String {
    let args_map: HashMap<String, FluentValue> = args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();

    let text = LOCALES.lookup_with_args(&lang.langid(), key, &args_map).unwrap_or_else(|| {
        LOCALES
            .lookup_with_args(&Language::default().langid(), key, &args_map)
            .unwrap_or_else(|| key.to_string())
    });
    text.replace("\\n", "\n")
}
