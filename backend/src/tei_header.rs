//! Metadata and citation scheme declared in a TEI header.
//!
//! The citation scheme comes from `<refsDecl>` blocks, each listing the
//! units a text is cited by, outermost first:
//!
//! ```xml
//! <refsDecl doctype="TEI.2">
//!   <state unit="book"/>
//!   <state unit="card" n="chunk"/>
//!   <state unit="line"/>
//! </refsDecl>
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::errors::{ImportError, ImportResult};
use crate::markup::{MarkupTree, NodeId};

/// Units that always open a division when found on a milestone.
pub const CHUNK_UNITS: &[&str] = &["card"];

lazy_static! {
    static ref RE_MACHINE_READABLE: Regex =
        Regex::new(r"\s*\((Greek|Latin|English)\)\.?\s*Machine readable text\.?").unwrap();
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref RE_EDITOR_SEPARATOR: Regex = Regex::new(r",\s+|\s+and\s+").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    pub unit: String,
    /// The `n` attribute. When present, the unit names a section of the text.
    pub section_type: Option<String>,
    /// 1-based position within its state set.
    pub level: u32,
}

impl State {
    pub fn is_chunk(&self) -> bool {
        self.section_type.is_some() || CHUNK_UNITS.contains(&self.unit.to_lowercase().as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSet {
    pub states: Vec<State>,
}

impl StateSet {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The first state with the given unit, compared case-insensitively.
    pub fn find(&self, unit: &str) -> Option<&State> {
        self.states.iter().find(|s| s.unit.eq_ignore_ascii_case(unit))
    }

    pub fn declares(&self, unit: &str) -> bool {
        self.find(unit).is_some()
    }

    pub fn has_line_unit(&self) -> bool {
        self.declares("line")
    }
}

fn states_from(tree: &MarkupTree, from: NodeId) -> ImportResult<Vec<State>> {
    let mut states = Vec::new();
    for node in tree.find_all(from, "state")? {
        let Some(unit) = tree.attribute(node, "unit") else {
            continue;
        };
        states.push(State {
            unit: unit.to_string(),
            section_type: tree.attribute(node, "n").map(|s| s.to_string()),
            level: states.len() as u32 + 1,
        });
    }
    Ok(states)
}

fn encoding_desc(tree: &MarkupTree) -> ImportResult<Option<NodeId>> {
    tree.find_first(tree.root(), "encodingDesc")
}

/// One state set per `refsDecl`, in document order.
pub fn get_state_sets(tree: &MarkupTree) -> ImportResult<Vec<StateSet>> {
    let Some(desc) = encoding_desc(tree)? else {
        return Ok(Vec::new());
    };

    let mut sets = Vec::new();
    for refs_decl in tree.find_all(desc, "refsDecl")? {
        let states = states_from(tree, refs_decl)?;
        if !states.is_empty() {
            sets.push(StateSet { states });
        }
    }
    Ok(sets)
}

/// Every declared state, numbered consecutively across all state sets.
pub fn merged_state_set(tree: &MarkupTree) -> ImportResult<StateSet> {
    match encoding_desc(tree)? {
        Some(desc) => Ok(StateSet {
            states: states_from(tree, desc)?,
        }),
        None => Ok(StateSet::default()),
    }
}

/// The state set chosen by the import options: one by index, or all merged.
pub fn select_state_set(tree: &MarkupTree, selection: Option<usize>) -> ImportResult<StateSet> {
    match selection {
        None => merged_state_set(tree),
        Some(idx) => {
            let mut sets = get_state_sets(tree)?;
            if idx >= sets.len() {
                return Err(ImportError::format(format!(
                    "state set {} was requested but the document declares {}",
                    idx,
                    sets.len()
                )));
            }
            Ok(sets.swap_remove(idx))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeiHeader {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub editors: Vec<String>,
    pub language: Option<String>,
    /// The header cites by line (`<step refunit="line">`).
    pub cites_by_line: bool,
}

fn clean_text(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").to_string()
}

/// Drop the boilerplate Perseus appends to titles.
pub fn clean_title(title: &str) -> String {
    let t = RE_MACHINE_READABLE.replace_all(title, "");
    clean_text(&t).trim_end_matches(['.', ',']).trim().to_string()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

fn read_title(tree: &MarkupTree, header: NodeId) -> ImportResult<Option<String>> {
    for node in tree.find_all(header, "title")? {
        if tree.attribute(node, "type") == Some("sub") {
            continue;
        }
        let title = clean_title(&tree.text_content(node, true)?);
        if !title.is_empty() {
            return Ok(Some(title));
        }
    }
    Ok(None)
}

fn read_authors(tree: &MarkupTree, header: NodeId) -> ImportResult<Vec<String>> {
    // Prefer the authors of the source edition.
    let from = match tree.find_first(header, "biblStruct")? {
        Some(bibl) if tree.find_first(bibl, "author")?.is_some() => bibl,
        _ => header,
    };

    let mut authors = Vec::new();
    for node in tree.find_all(from, "author")? {
        push_unique(&mut authors, clean_text(&tree.text_content(node, true)?));
    }
    Ok(authors)
}

fn read_editors(tree: &MarkupTree, header: NodeId) -> ImportResult<Vec<String>> {
    let mut editors = Vec::new();
    for node in tree.find_all(header, "editor")? {
        if let Some(role) = tree.attribute(node, "role") {
            if !role.eq_ignore_ascii_case("editor") {
                continue;
            }
        }
        let text = clean_text(&tree.text_content(node, true)?);
        for name in RE_EDITOR_SEPARATOR.split(&text) {
            push_unique(&mut editors, name.trim().to_string());
        }
    }
    Ok(editors)
}

fn read_language(tree: &MarkupTree, header: NodeId) -> ImportResult<Option<String>> {
    let Some(node) = tree.find_first(header, "language")? else {
        return Ok(None);
    };
    let text = clean_text(&tree.text_content(node, true)?);
    if !text.is_empty() {
        return Ok(Some(text));
    }
    Ok(tree
        .attribute(node, "ident")
        .or_else(|| tree.attribute(node, "id"))
        .map(|s| s.to_string()))
}

fn read_cites_by_line(tree: &MarkupTree, header: NodeId) -> ImportResult<bool> {
    Ok(tree
        .find_first(header, "step")?
        .and_then(|step| tree.attribute(step, "refunit"))
        .is_some_and(|unit| unit.eq_ignore_ascii_case("line")))
}

pub fn read_header(tree: &MarkupTree) -> ImportResult<TeiHeader> {
    let Some(header) = tree.find_first(tree.root(), "teiHeader")? else {
        return Ok(TeiHeader::default());
    };

    Ok(TeiHeader {
        title: read_title(tree, header)?,
        authors: read_authors(tree, header)?,
        editors: read_editors(tree, header)?,
        language: read_language(tree, header)?,
        cites_by_line: read_cites_by_line(tree, header)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_xml;

    const HEADER: &str = r#"<TEI.2><teiHeader>
<fileDesc>
  <titleStmt>
    <title>Agamemnon (Greek). Machine readable text</title>
    <title type="sub">A sub title</title>
    <author>Aeschylus</author>
    <editor role="editor">Herbert Weir Smyth</editor>
  </titleStmt>
  <sourceDesc>
    <biblStruct><monogr>
      <author>Aeschylus</author>
      <editor>C. Hude, H. Stuart Jones and C. Hude</editor>
    </monogr></biblStruct>
  </sourceDesc>
</fileDesc>
<encodingDesc>
  <refsDecl doctype="TEI.2">
    <state unit="line"/>
  </refsDecl>
  <refsDecl doctype="TEI.2">
    <state unit="card" n="chunk"/>
    <state unit="line"/>
  </refsDecl>
  <refsDecl><step refunit="line" from="1" to="1673"/></refsDecl>
</encodingDesc>
<profileDesc><langUsage><language id="greek">Greek</language></langUsage></profileDesc>
</teiHeader><text><body/></text></TEI.2>"#;

    #[test]
    fn test_read_header() {
        let tree = parse_xml(HEADER).unwrap();
        let h = read_header(&tree).unwrap();

        assert_eq!(h.title.as_deref(), Some("Agamemnon"));
        assert_eq!(h.authors, vec!["Aeschylus".to_string()]);
        assert_eq!(
            h.editors,
            vec!["Herbert Weir Smyth".to_string(), "C. Hude".to_string(), "H. Stuart Jones".to_string()]
        );
        assert_eq!(h.language.as_deref(), Some("Greek"));
        assert!(h.cites_by_line);
    }

    #[test]
    fn test_state_sets() {
        let tree = parse_xml(HEADER).unwrap();
        let sets = get_state_sets(&tree).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].states[0].unit, "card");
        assert!(sets[1].states[0].is_chunk());
        assert!(!sets[1].states[1].is_chunk());
        assert_eq!(sets[1].states[1].level, 2);

        let merged = merged_state_set(&tree).unwrap();
        assert_eq!(merged.states.len(), 3);
        assert_eq!(merged.find("LINE").map(|s| s.level), Some(1));
        assert!(merged.has_line_unit());
    }

    #[test]
    fn test_select_state_set_out_of_range() {
        let tree = parse_xml(HEADER).unwrap();
        assert!(select_state_set(&tree, Some(1)).is_ok());
        assert!(matches!(
            select_state_set(&tree, Some(5)),
            Err(ImportError::Format { .. })
        ));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Agamemnon (Greek). Machine readable text"), "Agamemnon");
        assert_eq!(clean_title("  Works\n  on   Socrates "), "Works on Socrates");
    }

    #[test]
    fn test_missing_header() {
        let tree = parse_xml("<TEI><text><body/></text></TEI>").unwrap();
        assert_eq!(read_header(&tree).unwrap(), TeiHeader::default());
        assert!(get_state_sets(&tree).unwrap().is_empty());
    }
}
