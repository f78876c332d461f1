//! Critical notes found in the verses of an imported work.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::errors::ImportResult;
use crate::markup::{MarkupRole, Visit, VisitControl, parse_xml};
use crate::text_model::{Division, VerseIndicator};

lazy_static! {
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub text: String,
    /// Labels of the divisions holding the note, e.g. "Book 1 > Chapter 2".
    pub division_path: String,
    pub verse: VerseIndicator,
}

/// Every note in the verses of `division` and its subdivisions, in document
/// order. Notes nested inside another note are part of the outer note's text.
pub fn extract_notes(division: &Division) -> ImportResult<Vec<Note>> {
    let mut notes = Vec::new();
    let mut stack: Vec<(&Division, Vec<String>)> = vec![(division, Vec::new())];

    while let Some((current, path)) = stack.pop() {
        let division_path = path.join(" > ");

        for verse in &current.verses {
            if verse.original_content.is_empty() {
                continue;
            }
            let tree = parse_xml(&verse.original_content)?;
            let mut found = Vec::new();
            tree.visit(tree.root(), |v| {
                let Visit::Enter { id, .. } = v else {
                    return Ok(VisitControl::Continue);
                };
                if tree.role(id) == MarkupRole::Note {
                    found.push(id);
                    return Ok(VisitControl::SkipChildren);
                }
                Ok(VisitControl::Continue)
            })?;

            for id in found {
                let text = tree.text_content(id, true)?;
                let text = RE_WHITESPACE.replace_all(text.trim(), " ").to_string();
                if text.is_empty() {
                    continue;
                }
                notes.push(Note {
                    text,
                    division_path: division_path.clone(),
                    verse: verse.indicator.clone(),
                });
            }
        }

        for child in current.children.iter().rev() {
            let mut child_path = path.clone();
            child_path.push(child.label());
            stack.push((child, child_path));
        }
    }

    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_model::Verse;

    fn verse(n: &str, xml: &str) -> Verse {
        Verse {
            indicator: VerseIndicator::Label(n.to_string()),
            original_content: xml.to_string(),
            content: String::new(),
            sequence_index: 1,
        }
    }

    #[test]
    fn test_extract_notes_with_paths() {
        let chapter = Division {
            kind: Some("chapter".to_string()),
            descriptor: "2".to_string(),
            level: 2,
            verses: vec![verse("1", "<verse>text<note anchored=\"yes\">second\n   note</note></verse>")],
            ..Division::root()
        };
        let book = Division {
            kind: Some("book".to_string()),
            descriptor: "1".to_string(),
            level: 1,
            verses: vec![verse("1", "<verse>a<note>first <note>inner</note></note>b</verse>")],
            children: vec![chapter],
            ..Division::root()
        };
        let root = Division {
            children: vec![book],
            ..Division::root()
        };

        let notes = extract_notes(&root).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].text, "first inner");
        assert_eq!(notes[0].division_path, "Book 1");
        assert_eq!(notes[1].text, "second note");
        assert_eq!(notes[1].division_path, "Book 1 > Chapter 2");
    }

    #[test]
    fn test_no_notes() {
        let root = Division {
            verses: vec![verse("1", "<verse>plain</verse>"), verse("2", "")],
            ..Division::root()
        };
        assert!(extract_notes(&root).unwrap().is_empty());
    }
}
