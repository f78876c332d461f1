//! Plain text from markup, with notes turned into numbered footnotes.

use crate::errors::ImportResult;
use crate::language_tools::{Language, transform_text};
use crate::markup::{MarkupRole, MarkupTree, NodeId, NodeKind, Visit, VisitControl, parse_xml};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedText {
    pub text: String,
    /// Footnote number and note text, in order of appearance.
    pub notes: Vec<(u32, String)>,
}

impl ConvertedText {
    /// The text followed by a footnote section, when there are notes.
    pub fn with_footnotes(&self) -> String {
        if self.notes.is_empty() {
            return self.text.clone();
        }
        let mut out = self.text.trim_end().to_string();
        out.push_str("\nFootnotes:");
        for (n, note) in &self.notes {
            out.push_str(&format!("\n[{}] {}", n, note));
        }
        out
    }
}

/// Text of the subtree at `start`. Each note is replaced by `[n]`, numbered
/// from 1. Text outside notes is transliterated for its language; note text
/// is kept as written.
pub fn convert(tree: &MarkupTree, start: NodeId, language: Option<&Language>) -> ImportResult<ConvertedText> {
    let mut converted = ConvertedText::default();
    // One entry per open element: its language override, if any.
    let mut languages: Vec<Option<Language>> = Vec::new();

    tree.visit(start, |v| {
        let id = match v {
            Visit::Enter { id, .. } => id,
            Visit::Exit { id } => {
                if tree.tag_name(id).is_some() {
                    languages.pop();
                }
                return Ok(VisitControl::Continue);
            }
        };

        if tree.role(id) == MarkupRole::Note {
            let number = converted.notes.len() as u32 + 1;
            let note = tree.text_content(id, true)?;
            converted.text.push_str(&format!("[{}]", number));
            converted.notes.push((number, note.trim().to_string()));
            languages.push(None);
            return Ok(VisitControl::SkipChildren);
        }

        match tree.node(id).map(|n| &n.kind) {
            Some(NodeKind::Element { .. }) => {
                languages.push(
                    tree.attribute(id, "lang")
                        .or_else(|| tree.attribute(id, "xml:lang"))
                        .map(Language::parse),
                );
            }
            Some(NodeKind::Text(t)) => {
                let current = languages.iter().rev().find_map(|l| l.as_ref()).or(language);
                converted.text.push_str(&transform_text(t, current));
            }
            _ => {}
        }
        Ok(VisitControl::Continue)
    })?;

    Ok(converted)
}

pub fn xml_to_text(xml: &str, include_notes_at_end: bool, language: Option<&Language>) -> ImportResult<String> {
    let tree = parse_xml(xml)?;
    let converted = convert(&tree, tree.root(), language)?;
    if include_notes_at_end {
        Ok(converted.with_footnotes())
    } else {
        Ok(converted.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicode_normalization::UnicodeNormalization;

    #[test]
    fn test_notes_become_numbered_markers() {
        let xml = "<verse><p>One<note>first</note> two<note>second <hi>note</hi></note>.</p></verse>";
        let tree = parse_xml(xml).unwrap();
        let converted = convert(&tree, tree.root(), None).unwrap();

        assert_eq!(converted.text, "One[1] two[2].");
        assert_eq!(
            converted.notes,
            vec![(1, "first".to_string()), (2, "second note".to_string())]
        );
    }

    #[test]
    fn test_footnotes_at_end() {
        let xml = "<verse>Text<note>A note</note>\n</verse>";
        assert_eq!(xml_to_text(xml, true, None).unwrap(), "Text[1]\nFootnotes:\n[1] A note");
        assert_eq!(xml_to_text(xml, false, None).unwrap(), "Text[1]\n");
    }

    #[test]
    fn test_no_notes_no_footnote_section() {
        assert_eq!(xml_to_text("<verse>Just text</verse>", true, None).unwrap(), "Just text");
    }

    #[test]
    fn test_greek_text_outside_notes() {
        let xml = r#"<verse>KAI\ <foreign lang="la">et</foreign><note>KAI/ codd.</note></verse>"#;
        assert_eq!(
            xml_to_text(xml, true, Some(&Language::Greek)).unwrap(),
            format!("{} et[1]\nFootnotes:\n[1] KAI/ codd.", "καὶ".nfc().collect::<String>())
        );
    }
}
