//! Markup to presentation tree.
//!
//! Every element becomes a `span` whose class is the source tag name, with
//! the source attributes kept as `data-*` attributes:
//!
//! ```text
//! <l n="5">MH=NIN</l>  →  <span class="l" data-n="5">μῆνιν</span>
//! ```
//!
//! Text is transliterated for the language in effect at that node. Note text
//! is left as written. Comments are dropped.

use serde::Serialize;

use crate::errors::{ImportError, ImportResult};
use crate::language_tools::{Language, transform_text};
use crate::markup::{MarkupRole, MarkupTree, NodeId, NodeKind, Visit, VisitControl, parse_xml};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresentationNode {
    Element {
        tag: String,
        class: String,
        attributes: Vec<(String, String)>,
        children: Vec<PresentationNode>,
    },
    Text {
        text: String,
    },
}

impl PresentationNode {
    fn span(class: &str, source_attributes: &[(String, String)]) -> Self {
        PresentationNode::Element {
            tag: "span".to_string(),
            class: class.to_string(),
            attributes: source_attributes
                .iter()
                .map(|(name, value)| (data_attribute_name(name), value.clone()))
                .collect(),
            children: Vec::new(),
        }
    }

    fn push(&mut self, child: PresentationNode) {
        if let PresentationNode::Element { children, .. } = self {
            children.push(child);
        }
    }

    /// All text below this node, concatenated.
    pub fn text(&self) -> String {
        match self {
            PresentationNode::Text { text } => text.clone(),
            PresentationNode::Element { children, .. } => children.iter().map(|c| c.text()).collect(),
        }
    }
}

/// `xml:lang` → `data-xml-lang`
fn data_attribute_name(name: &str) -> String {
    format!("data-{}", name.replace(':', "-"))
}

fn language_override(tree: &MarkupTree, id: NodeId) -> Option<Language> {
    tree.attribute(id, "lang")
        .or_else(|| tree.attribute(id, "xml:lang"))
        .map(Language::parse)
}

struct Frame {
    node: PresentationNode,
    language: Option<Language>,
    in_note: bool,
}

/// Presentation tree for the subtree at `node`.
///
/// When `node` is the document node, the result is a `span` with class
/// `document` holding its converted children.
pub fn convert(tree: &MarkupTree, node: NodeId, default_language: Option<&Language>) -> ImportResult<PresentationNode> {
    let mut frames: Vec<Frame> = Vec::new();
    let mut result: Option<PresentationNode> = None;
    let default_language = default_language.cloned();

    tree.visit(node, |v| {
        match v {
            Visit::Enter { id, .. } => {
                let (inherited, in_note) = frames
                    .last()
                    .map(|f| (f.language.clone(), f.in_note))
                    .unwrap_or((default_language.clone(), false));

                match tree.node(id).map(|n| &n.kind) {
                    Some(NodeKind::Element { name, attributes }) => {
                        frames.push(Frame {
                            node: PresentationNode::span(name, attributes),
                            language: language_override(tree, id).or(inherited),
                            in_note: in_note || tree.role(id) == MarkupRole::Note,
                        });
                    }
                    Some(NodeKind::Document) => {
                        frames.push(Frame {
                            node: PresentationNode::span("document", &[]),
                            language: inherited,
                            in_note,
                        });
                    }
                    Some(NodeKind::Text(text)) => {
                        let text = if in_note {
                            text.clone()
                        } else {
                            transform_text(text, inherited.as_ref())
                        };
                        let converted = PresentationNode::Text { text };
                        match frames.last_mut() {
                            Some(parent) => parent.node.push(converted),
                            None => result = Some(converted),
                        }
                    }
                    Some(NodeKind::Comment(_)) | None => {}
                }
                Ok(VisitControl::Continue)
            }
            Visit::Exit { id } => {
                let is_container = matches!(
                    tree.node(id).map(|n| &n.kind),
                    Some(NodeKind::Element { .. }) | Some(NodeKind::Document)
                );
                if !is_container {
                    return Ok(VisitControl::Continue);
                }
                if let Some(frame) = frames.pop() {
                    match frames.last_mut() {
                        Some(parent) => parent.node.push(frame.node),
                        None => result = Some(frame.node),
                    }
                }
                Ok(VisitControl::Continue)
            }
        }
    })?;

    result.ok_or_else(|| ImportError::format("nothing to convert: the start node is a comment"))
}

/// Parse `xml` and convert its document element.
pub fn convert_xml(xml: &str, default_language: Option<&Language>) -> ImportResult<PresentationNode> {
    let tree = parse_xml(xml)?;
    let start = tree.document_element().unwrap_or(tree.root());
    convert(&tree, start, default_language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elements_become_spans() {
        let node = convert_xml(r#"<verse><l n="5" xml:lang="la">arma</l></verse>"#, None).unwrap();

        let PresentationNode::Element { tag, class, children, .. } = &node else {
            panic!("expected an element");
        };
        assert_eq!(tag, "span");
        assert_eq!(class, "verse");

        let PresentationNode::Element { class, attributes, .. } = &children[0] else {
            panic!("expected an element");
        };
        assert_eq!(class, "l");
        assert_eq!(
            attributes,
            &vec![
                ("data-n".to_string(), "5".to_string()),
                ("data-xml-lang".to_string(), "la".to_string())
            ]
        );
    }

    #[test]
    fn test_language_inherited_and_overridden() {
        let greek = Language::Greek;
        let node = convert_xml(
            r#"<p>LO/GOS <foreign lang="la">LOGOS <hi>ET</hi></foreign> KAI/</p>"#,
            Some(&greek),
        )
        .unwrap();
        assert_eq!(node.text(), "λόγος LOGOS ET καί");
    }

    #[test]
    fn test_note_text_unchanged() {
        let greek = Language::Greek;
        let node = convert_xml("<p>LO/GOS<note>LO/GOS <hi>cf.</hi></note></p>", Some(&greek)).unwrap();
        assert_eq!(node.text(), "λόγοςLO/GOS cf.");
    }

    #[test]
    fn test_comments_dropped() {
        let node = convert_xml("<p>a<!-- hidden -->b</p>", None).unwrap();
        let PresentationNode::Element { children, .. } = &node else {
            panic!("expected an element");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(node.text(), "ab");
    }

    #[test]
    fn test_convert_document_node() {
        let tree = parse_xml("<a>x</a>").unwrap();
        let node = convert(&tree, tree.root(), None).unwrap();
        let PresentationNode::Element { class, children, .. } = &node else {
            panic!("expected an element");
        };
        assert_eq!(class, "document");
        assert_eq!(children.len(), 1);
    }
}
