//! Language tags and the text transforms that depend on them.

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::beta_code;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Greek,
    Latin,
    English,
    Other(String),
}

impl Language {
    /// Read a language name or code as found in TEI headers and `lang`
    /// attributes: "greek", "grc", "la", "English", ...
    pub fn parse(tag: &str) -> Language {
        let t = tag.trim().to_lowercase();
        match t.as_str() {
            "greek" | "grc" | "gk" => Language::Greek,
            "latin" | "la" | "lat" => Language::Latin,
            "english" | "en" | "eng" => Language::English,
            _ => Language::Other(tag.trim().to_string()),
        }
    }

    /// Greek texts in the corpus are stored as Beta Code.
    pub fn is_beta_code(&self) -> bool {
        matches!(self, Language::Greek)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Greek => write!(f, "Greek"),
            Language::Latin => write!(f, "Latin"),
            Language::English => write!(f, "English"),
            Language::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Text as it should be displayed for the given language.
pub fn transform_text(text: &str, language: Option<&Language>) -> String {
    match language {
        Some(lang) if lang.is_beta_code() => beta_code::to_unicode(text),
        _ => text.to_string(),
    }
}

pub fn normalize_unicode(text: &str) -> String {
    text.nfkc().collect()
}

/// Remove accents, breathings and other combining marks, e.g. "θεός" → "θεος".
pub fn strip_accents(text: &str) -> String {
    let stripped: String = text.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    normalize_unicode(&stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("greek"), Language::Greek);
        assert_eq!(Language::parse(" GRC "), Language::Greek);
        assert_eq!(Language::parse("la"), Language::Latin);
        assert_eq!(Language::parse("Hebrew"), Language::Other("Hebrew".to_string()));
    }

    #[test]
    fn test_transform_text() {
        let greek = Language::Greek;
        assert_eq!(transform_text("O( KO/SMOS", Some(&greek)), "ὁ κόσμος".nfc().collect::<String>());
        assert_eq!(transform_text("O( KO/SMOS", Some(&Language::English)), "O( KO/SMOS");
        assert_eq!(transform_text("O( KO/SMOS", None), "O( KO/SMOS");
    }

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("θεός"), "θεος");
        assert_eq!(strip_accents("ἤλιος"), "ηλιος");
        assert_eq!(strip_accents("τῷ"), "τω");
    }
}
