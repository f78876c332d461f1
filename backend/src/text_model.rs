//! The imported form of a work: a tree of divisions holding verses.

use std::fmt;

use serde::Serialize;

use crate::errors::ImportResult;
use crate::language_tools::Language;
use crate::line_reference::LineReference;
use crate::text_converter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VerseIndicator {
    Line(LineReference),
    Label(String),
}

impl fmt::Display for VerseIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerseIndicator::Line(r) => write!(f, "{}", r),
            VerseIndicator::Label(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verse {
    pub indicator: VerseIndicator,
    /// Source markup of the verse wrapped in a `<verse>` element.
    pub original_content: String,
    /// Text of the verse, transliterated for the work's language.
    pub content: String,
    /// 1-based position within the division.
    pub sequence_index: u32,
}

impl Verse {
    /// Plain text of the stored markup, with notes as `[n]` markers.
    pub fn plain_text(&self, include_notes_at_end: bool, language: Option<&Language>) -> ImportResult<String> {
        if self.original_content.is_empty() {
            return Ok(self.content.clone());
        }
        text_converter::xml_to_text(&self.original_content, include_notes_at_end, language)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Division {
    /// The division's type, e.g. "Book".
    pub kind: Option<String>,
    pub descriptor: String,
    /// 1 for top-level divisions; the root is 0.
    pub level: u32,
    /// 1-based document order over all divisions of the work.
    pub sequence_number: u32,
    pub title: Option<String>,
    pub original_title: Option<String>,
    /// Descriptors from the top-level ancestor down to this division.
    pub title_parts: Vec<String>,
    pub readable_unit: bool,
    pub children: Vec<Division>,
    pub verses: Vec<Verse>,
}

impl Division {
    pub fn root() -> Self {
        Division {
            kind: None,
            descriptor: String::new(),
            level: 0,
            sequence_number: 0,
            title: None,
            original_title: None,
            title_parts: Vec::new(),
            readable_unit: false,
            children: Vec::new(),
            verses: Vec::new(),
        }
    }

    /// "Book 1" from kind and descriptor, or just the descriptor.
    pub fn label(&self) -> String {
        match &self.kind {
            Some(kind) if !kind.is_empty() => format!("{} {}", capitalize(kind), self.descriptor).trim().to_string(),
            _ => self.descriptor.clone(),
        }
    }

    /// Every division below this one, depth first in document order.
    pub fn descendants(&self) -> Vec<&Division> {
        let mut out = Vec::new();
        let mut stack: Vec<&Division> = self.children.iter().rev().collect();
        while let Some(d) = stack.pop() {
            out.push(d);
            stack.extend(d.children.iter().rev());
        }
        out
    }

    /// Number of verses in this division and all below it.
    pub fn verse_count(&self) -> usize {
        self.verses.len() + self.descendants().iter().map(|d| d.verses.len()).sum::<usize>()
    }

    /// Follow descriptors down from this division, e.g. `["1", "2"]`.
    pub fn find(&self, descriptors: &[&str]) -> Option<&Division> {
        let mut current = self;
        for descriptor in descriptors {
            current = current.children.iter().find(|c| c.descriptor == *descriptor)?;
        }
        Some(current)
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) if !title.is_empty() => write!(f, "{}", title),
            _ => write!(f, "{}", self.label()),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedWork {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub editors: Vec<String>,
    pub language: Option<String>,
    pub root: Division,
}

impl ImportedWork {
    pub fn divisions(&self) -> Vec<&Division> {
        self.root.descendants()
    }

    /// The language named in the header, if any.
    pub fn language(&self) -> Option<Language> {
        self.language.as_deref().map(Language::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn division(descriptor: &str, children: Vec<Division>) -> Division {
        Division {
            kind: Some("book".to_string()),
            descriptor: descriptor.to_string(),
            level: 1,
            children,
            ..Division::root()
        }
    }

    #[test]
    fn test_label_and_display() {
        let mut d = division("1", Vec::new());
        assert_eq!(d.label(), "Book 1");
        assert_eq!(d.to_string(), "Book 1");

        d.title = Some("lines 1-32".to_string());
        assert_eq!(d.to_string(), "lines 1-32");

        d.kind = None;
        assert_eq!(d.label(), "1");
    }

    #[test]
    fn test_descendants_order() {
        let root = Division {
            children: vec![
                division("1", vec![division("1.1", Vec::new()), division("1.2", Vec::new())]),
                division("2", Vec::new()),
            ],
            ..Division::root()
        };

        let order: Vec<&str> = root.descendants().iter().map(|d| d.descriptor.as_str()).collect();
        assert_eq!(order, vec!["1", "1.1", "1.2", "2"]);
        assert_eq!(root.find(&["1", "1.2"]).map(|d| d.descriptor.as_str()), Some("1.2"));
        assert!(root.find(&["3"]).is_none());
    }

    #[test]
    fn test_verse_plain_text() {
        let verse = Verse {
            indicator: VerseIndicator::Label("1".to_string()),
            original_content: "<verse>Arma <note>a note</note>virumque</verse>".to_string(),
            content: "Arma a note virumque".to_string(),
            sequence_index: 1,
        };
        assert_eq!(verse.plain_text(false, None).unwrap(), "Arma [1]virumque");
        assert_eq!(
            verse.plain_text(true, Some(&Language::Latin)).unwrap(),
            "Arma [1]virumque\nFootnotes:\n[1] a note"
        );
    }
}
