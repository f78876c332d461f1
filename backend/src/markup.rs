//! Arena tree for TEI markup, its XML parser and serializer.
//!
//! Nodes live in one `Vec` and refer to their children by `NodeId`. Trees
//! produced by `parse_xml` are always well formed. Trees assembled by hand
//! through `append_child` may contain shared or cyclic children; every
//! traversal goes through `MarkupTree::visit`, which reports those as a
//! `FormatError` instead of looping.


use lazy_static::lazy_static;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::{Captures, Regex};

use crate::errors::{ImportError, ImportResult};

/// Deepest nesting accepted by `MarkupTree::visit`.
pub const MAX_DEPTH: usize = 512;

lazy_static! {
    static ref RE_DIV_TAG: Regex = Regex::new(r"^div([0-9]*)$").unwrap();
    static ref RE_NAMED_ENTITY: Regex = Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

/// What an element means to the importer. Anything not listed is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupRole {
    Division,
    Milestone,
    Line,
    Head,
    Note,
    Other,
}

impl MarkupRole {
    pub fn of(tag: &str) -> MarkupRole {
        match tag {
            "milestone" => MarkupRole::Milestone,
            "l" => MarkupRole::Line,
            "head" => MarkupRole::Head,
            "note" => MarkupRole::Note,
            t if RE_DIV_TAG.is_match(t) => MarkupRole::Division,
            _ => MarkupRole::Other,
        }
    }
}

/// The level written in a numbered division tag: `div2` → `Some(2)`, `div` → `None`.
pub fn div_level(tag: &str) -> Option<u32> {
    RE_DIV_TAG
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Enter { id: NodeId, depth: usize },
    Exit { id: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    Continue,
    SkipChildren,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupTree {
    nodes: Vec<MarkupNode>,
    root: NodeId,
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupTree {
    /// An empty tree holding only the document node.
    pub fn new() -> Self {
        MarkupTree {
            nodes: vec![MarkupNode {
                kind: NodeKind::Document,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> Option<&MarkupNode> {
        self.nodes.get(id.0)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MarkupNode {
            kind,
            children: Vec::new(),
        });
        id
    }

    /// Link `child` under `parent` without any checks.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
    }

    pub fn add_element(&mut self, parent: NodeId, name: &str, attributes: Vec<(String, String)>) -> NodeId {
        let id = self.push(NodeKind::Element {
            name: name.to_string(),
            attributes,
        });
        self.append_child(parent, id);
        id
    }

    pub fn add_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        // Adjacent text runs are merged, as an XML parser would report them.
        if let Some(last) = self.nodes.get(parent.0).and_then(|n| n.children.last().copied()) {
            if let Some(NodeKind::Text(existing)) = self.nodes.get_mut(last.0).map(|n| &mut n.kind) {
                existing.push_str(text);
                return last;
            }
        }
        let id = self.push(NodeKind::Text(text.to_string()));
        self.append_child(parent, id);
        id
    }

    pub fn add_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(NodeKind::Comment(text.to_string()));
        self.append_child(parent, id);
        id
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match self.nodes.get(id.0).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes.as_slice(),
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn role(&self, id: NodeId) -> MarkupRole {
        self.tag_name(id).map(MarkupRole::of).unwrap_or(MarkupRole::Other)
    }

    /// Depth-first walk in document order from `start`.
    ///
    /// Every entered node is exited again, also when the callback skipped its
    /// children. A node reached twice, a missing node, or nesting beyond
    /// `MAX_DEPTH` ends the walk with a `FormatError`.
    pub fn visit<F>(&self, start: NodeId, mut f: F) -> ImportResult<()>
    where
        F: FnMut(Visit) -> ImportResult<VisitControl>,
    {
        enum Step {
            Enter(NodeId, usize),
            Exit(NodeId),
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![Step::Enter(start, 0)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id, depth) => {
                    let node = self
                        .nodes
                        .get(id.0)
                        .ok_or_else(|| ImportError::format(format!("markup node {} does not exist", id.0)))?;
                    if seen[id.0] {
                        return Err(ImportError::format(format!(
                            "markup node {} is reached more than once (cycle or shared child)",
                            id.0
                        )));
                    }
                    seen[id.0] = true;
                    if depth > MAX_DEPTH {
                        return Err(ImportError::format(format!(
                            "markup is nested deeper than {} levels",
                            MAX_DEPTH
                        )));
                    }

                    let control = f(Visit::Enter { id, depth })?;
                    stack.push(Step::Exit(id));
                    if control == VisitControl::Continue {
                        for child in node.children.iter().rev() {
                            stack.push(Step::Enter(*child, depth + 1));
                        }
                    }
                }
                Step::Exit(id) => {
                    f(Visit::Exit { id })?;
                }
            }
        }

        Ok(())
    }

    /// Every element named `tag` under `from` (inclusive), in document order.
    pub fn find_all(&self, from: NodeId, tag: &str) -> ImportResult<Vec<NodeId>> {
        let mut found = Vec::new();
        self.visit(from, |v| {
            if let Visit::Enter { id, .. } = v {
                if self.tag_name(id) == Some(tag) {
                    found.push(id);
                }
            }
            Ok(VisitControl::Continue)
        })?;
        Ok(found)
    }

    pub fn find_first(&self, from: NodeId, tag: &str) -> ImportResult<Option<NodeId>> {
        Ok(self.find_all(from, tag)?.into_iter().next())
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|c| self.tag_name(*c).is_some())
    }

    /// Text of `id`. With `recurse`, text of all descendants is included;
    /// otherwise only direct text children.
    pub fn text_content(&self, id: NodeId, recurse: bool) -> ImportResult<String> {
        if !recurse {
            let mut text = String::new();
            for child in self.children(id) {
                if let Some(NodeKind::Text(t)) = self.nodes.get(child.0).map(|n| &n.kind) {
                    text.push_str(t);
                }
            }
            return Ok(text);
        }

        let mut text = String::new();
        self.visit(id, |v| {
            if let Visit::Enter { id, .. } = v {
                if let Some(NodeKind::Text(t)) = self.nodes.get(id.0).map(|n| &n.kind) {
                    text.push_str(t);
                }
            }
            Ok(VisitControl::Continue)
        })?;
        Ok(text)
    }

    /// Serialize the subtree at `id` as XML.
    pub fn to_xml(&self, id: NodeId) -> ImportResult<String> {
        let mut out = String::new();
        self.visit(id, |v| {
            match v {
                Visit::Enter { id, .. } => match self.nodes.get(id.0).map(|n| &n.kind) {
                    Some(NodeKind::Element { name, attributes }) => {
                        write_start_tag(&mut out, name, attributes, self.children(id).is_empty());
                    }
                    Some(NodeKind::Text(t)) => {
                        out.push_str(&html_escape::encode_text(t));
                    }
                    Some(NodeKind::Comment(c)) => {
                        out.push_str("<!--");
                        out.push_str(c);
                        out.push_str("-->");
                    }
                    Some(NodeKind::Document) | None => {}
                },
                Visit::Exit { id } => {
                    if let Some(name) = self.tag_name(id) {
                        if !self.children(id).is_empty() {
                            write_end_tag(&mut out, name);
                        }
                    }
                }
            }
            Ok(VisitControl::Continue)
        })?;
        Ok(out)
    }
}

pub fn write_start_tag(out: &mut String, name: &str, attributes: &[(String, String)], self_closing: bool) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
    if self_closing {
        out.push_str("/>");
    } else {
        out.push('>');
    }
}

pub fn write_end_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Named entities found in TEI texts besides the five XML ones.
fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        "nbsp" => Some("\u{a0}"),
        "lpar" => Some("("),
        "rpar" => Some(")"),
        "lsqb" => Some("["),
        "rsqb" => Some("]"),
        "ldquo" => Some("“"),
        "rdquo" => Some("”"),
        "lsquo" => Some("‘"),
        "rsquo" => Some("’"),
        "mdash" => Some("—"),
        "ndash" => Some("–"),
        "dagger" => Some("†"),
        "para" => Some("¶"),
        "sect" => Some("§"),
        _ => None,
    }
}

/// Unescape character data. Unknown named entities are kept as written.
/// Text that still does not unescape, e.g. a bare `&`, is kept raw.
fn unescape_text(raw: &str) -> String {
    let known_only = RE_NAMED_ENTITY.replace_all(raw, |caps: &Captures| {
        if resolve_entity(&caps[1]).is_some() {
            caps[0].to_string()
        } else {
            format!("&amp;{};", &caps[1])
        }
    });
    match quick_xml::escape::unescape_with(&known_only, resolve_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn element_parts(e: &BytesStart) -> ImportResult<(String, Vec<(String, String)>)> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| ImportError::Encoding(err.to_string()))?
        .to_string();

    let mut attributes = Vec::new();
    for attr in e.attributes().with_checks(false).filter_map(|a| a.ok()) {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        attributes.push((key, unescape_text(&raw)));
    }

    Ok((name, attributes))
}

/// Parse XML into a `MarkupTree`.
///
/// Whitespace is kept. Mismatched end tags close the nearest open element of
/// the same name and are otherwise ignored; elements still open at the end of
/// input are closed implicitly.
pub fn parse_xml(content: &str) -> ImportResult<MarkupTree> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(false);
    reader.check_end_names(false);

    let mut tree = MarkupTree::new();
    let mut stack = vec![tree.root()];

    loop {
        let current = stack.last().copied().unwrap_or(tree.root());

        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let (name, attributes) = element_parts(&e)?;
                let id = tree.add_element(current, &name, attributes);
                stack.push(id);
            }
            Ok(Event::Empty(e)) => {
                let (name, attributes) = element_parts(&e)?;
                tree.add_element(current, &name, attributes);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(pos) = stack
                    .iter()
                    .rposition(|id| tree.tag_name(*id) == Some(name.as_str()))
                {
                    stack.truncate(pos);
                }
            }
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(&e).map_err(|err| ImportError::Encoding(err.to_string()))?;
                let text = unescape_text(raw);
                if !text.is_empty() {
                    tree.add_text(current, &text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = std::str::from_utf8(&e).map_err(|err| ImportError::Encoding(err.to_string()))?;
                if !text.is_empty() {
                    tree.add_text(current, text);
                }
            }
            Ok(Event::Comment(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                tree.add_comment(current, &text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ImportError::Xml {
                    message: e.to_string(),
                    position: reader.buffer_position(),
                });
            }
        }
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        assert_eq!(MarkupRole::of("div"), MarkupRole::Division);
        assert_eq!(MarkupRole::of("div3"), MarkupRole::Division);
        assert_eq!(MarkupRole::of("divx"), MarkupRole::Other);
        assert_eq!(MarkupRole::of("milestone"), MarkupRole::Milestone);
        assert_eq!(MarkupRole::of("note"), MarkupRole::Note);
        assert_eq!(MarkupRole::of("l"), MarkupRole::Line);
        assert_eq!(MarkupRole::of("p"), MarkupRole::Other);
    }

    #[test]
    fn test_div_level() {
        assert_eq!(div_level("div2"), Some(2));
        assert_eq!(div_level("div"), None);
        assert_eq!(div_level("p"), None);
    }

    #[test]
    fn test_parse_xml() {
        let tree = parse_xml(r#"<TEI><text><p n="1">Hello <hi rend="bold">world</hi></p><pb n="2"/></text></TEI>"#).unwrap();

        let tei = tree.document_element().unwrap();
        assert_eq!(tree.tag_name(tei), Some("TEI"));

        let p = tree.find_first(tei, "p").unwrap().unwrap();
        assert_eq!(tree.attribute(p, "n"), Some("1"));
        assert_eq!(tree.text_content(p, false).unwrap(), "Hello ");
        assert_eq!(tree.text_content(p, true).unwrap(), "Hello world");

        let pb = tree.find_first(tei, "pb").unwrap().unwrap();
        assert!(tree.children(pb).is_empty());
    }

    #[test]
    fn test_entities() {
        let tree = parse_xml("<p>a &amp; b &lpar;c&rpar; &unknown; &#x3b1;</p>").unwrap();
        let p = tree.document_element().unwrap();
        assert_eq!(tree.text_content(p, true).unwrap(), "a & b (c) &unknown; α");

        let tree = parse_xml("<p>a &amp; b &lpar;c&rpar; &#x3b1;</p>").unwrap();
        let p = tree.document_element().unwrap();
        assert_eq!(tree.text_content(p, true).unwrap(), "a & b (c) α");

        let tree = parse_xml("<p>Tom &amp; Jerry &ast; x &mdash;</p>").unwrap();
        let p = tree.document_element().unwrap();
        assert_eq!(tree.text_content(p, true).unwrap(), "Tom & Jerry &ast; x —");
        assert_eq!(tree.to_xml(p).unwrap(), "<p>Tom &amp; Jerry &amp;ast; x —</p>");
    }

    #[test]
    fn test_unclosed_and_mismatched_tags() {
        let tree = parse_xml("<body><div1><p>one</div1><div1>two").unwrap();
        let body = tree.document_element().unwrap();
        let divs = tree.find_all(body, "div1").unwrap();
        assert_eq!(divs.len(), 2);
        assert_eq!(tree.text_content(divs[1], true).unwrap(), "two");
    }

    #[test]
    fn test_to_xml() {
        let xml = r#"<verse><p n="1">a &lt; b<pb n="2"/></p></verse>"#;
        let tree = parse_xml(xml).unwrap();
        let verse = tree.document_element().unwrap();
        assert_eq!(tree.to_xml(verse).unwrap(), xml);
    }

    #[test]
    fn test_invalid_xml() {
        let result = parse_xml("<p><!-- never closed");
        assert!(matches!(result, Err(ImportError::Xml { .. })));
    }

    #[test]
    fn test_visit_detects_cycle() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        let a = tree.add_element(root, "div1", Vec::new());
        let b = tree.add_element(a, "p", Vec::new());
        tree.append_child(b, a);

        let result = tree.visit(root, |_| Ok(VisitControl::Continue));
        assert!(matches!(result, Err(ImportError::Format { .. })));
    }

    #[test]
    fn test_visit_detects_shared_child() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        let a = tree.add_element(root, "p", Vec::new());
        let t = tree.add_text(a, "shared");
        let b = tree.add_element(root, "p", Vec::new());
        tree.append_child(b, t);

        assert!(tree.text_content(root, true).is_err());
    }

    #[test]
    fn test_visit_depth_limit() {
        let mut tree = MarkupTree::new();
        let mut parent = tree.root();
        for _ in 0..(MAX_DEPTH + 5) {
            parent = tree.add_element(parent, "hi", Vec::new());
        }
        assert!(tree.to_xml(tree.root()).is_err());
    }

    #[test]
    fn test_skip_children() {
        let tree = parse_xml("<p>a<note>b</note>c</p>").unwrap();
        let mut text = String::new();
        tree.visit(tree.root(), |v| {
            if let Visit::Enter { id, .. } = v {
                if tree.role(id) == MarkupRole::Note {
                    return Ok(VisitControl::SkipChildren);
                }
                if let Some(NodeKind::Text(t)) = tree.node(id).map(|n| &n.kind) {
                    text.push_str(t);
                }
            }
            Ok(VisitControl::Continue)
        })
        .unwrap();
        assert_eq!(text, "ac");
    }
}
