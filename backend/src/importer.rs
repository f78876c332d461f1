//! Builds the division and verse hierarchy of a TEI document.
//!
//! The document body is walked depth first. Division markers (`div`, `div1`
//! ... and milestones of chunk units) open divisions; milestones of other
//! declared units and `<l>` lines (when lines are a declared unit) start
//! verses. Everything else is copied into the open verse, both as markup
//! (`Verse::original_content`) and as text (`Verse::content`).
//!
//! A verse boundary inside an element closes that element in the finished
//! verse; what follows the boundary starts at the top of the next verse.

use crate::app_settings::ImportOptions;
use crate::errors::{ErrorLocation, ImportError, ImportResult};
use crate::import_context::{DivisionPolicy, ImportContext};
use crate::language_tools::{Language, transform_text};
use crate::line_reference::LineReference;
use crate::logger::{debug, info};
use crate::markup::{
    MarkupRole, MarkupTree, NodeId, NodeKind, Visit, VisitControl, div_level, parse_xml, write_end_tag,
    write_start_tag,
};
use crate::tei_header::{StateSet, TeiHeader, read_header, select_state_set};
use crate::text_model::{Division, ImportedWork, Verse, VerseIndicator};

/// How far below a division its `<head>` is looked for.
const HEAD_SEARCH_DEPTH: usize = 5;

/// Imports documents with one set of options. Each call gets its own context.
#[derive(Debug, Clone, Default)]
pub struct DocumentImporter {
    options: ImportOptions,
}

impl DocumentImporter {
    pub fn new(options: ImportOptions) -> Self {
        DocumentImporter { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn import_tree(&self, tree: &MarkupTree) -> ImportResult<ImportedWork> {
        import_work(tree, &self.options)
    }

    pub fn import_str(&self, xml: &str) -> ImportResult<ImportedWork> {
        import_xml(xml, &self.options)
    }
}

/// Import the body of `tree` and return the root division.
pub fn import(tree: &MarkupTree, context: &mut ImportContext) -> ImportResult<Division> {
    let header = read_header(tree)?;
    import_with_header(tree, context, &header)
}

/// Import a parsed document together with its header metadata.
pub fn import_work(tree: &MarkupTree, options: &ImportOptions) -> ImportResult<ImportedWork> {
    let header = read_header(tree)?;
    let mut context = ImportContext::new(options.clone());
    let root = import_with_header(tree, &mut context, &header)?;

    let work = ImportedWork {
        title: header.title,
        authors: header.authors,
        editors: header.editors,
        language: header.language,
        root,
    };

    info(&format!(
        "Imported {}: {} divisions, {} verses",
        work.title.as_deref().unwrap_or("(untitled)"),
        work.root.descendants().len(),
        work.root.verse_count()
    ));

    Ok(work)
}

pub fn import_xml(xml: &str, options: &ImportOptions) -> ImportResult<ImportedWork> {
    let tree = parse_xml(xml)?;
    import_work(&tree, options)
}

fn import_with_header(tree: &MarkupTree, context: &mut ImportContext, header: &TeiHeader) -> ImportResult<Division> {
    let state_set = select_state_set(tree, context.policy().state_set)?;
    let language = header.language.as_deref().map(Language::parse);
    let line_titles = context
        .policy()
        .use_line_count_for_divisions
        .unwrap_or(header.cites_by_line);
    let start = tree.find_first(tree.root(), "body")?.unwrap_or(tree.root());

    let mut walker = Walker::new(tree, context, state_set, language, line_titles, start);

    if let Err(e) = tree.visit(start, |v| walker.on_visit(v)) {
        let unlocated = e.location().is_some_and(|l| *l == ErrorLocation::default());
        return Err(if unlocated { e.at(walker.location(None)) } else { e });
    }

    Ok(walker.finish())
}

/// Markup and text of the verse being filled.
struct VerseBuffer {
    /// `None` until a verse marker or the first text arrives.
    indicator: Option<VerseIndicator>,
    generation: u64,
    xml: String,
    open_tags: Vec<String>,
    content: String,
}

impl VerseBuffer {
    fn new(indicator: Option<VerseIndicator>, generation: u64) -> Self {
        VerseBuffer {
            indicator,
            generation,
            xml: "<verse>".to_string(),
            open_tags: Vec::new(),
            content: String::new(),
        }
    }

    /// Write a start tag. Returns the depth to close back to, unless the
    /// element was written self-closing.
    fn open(&mut self, name: &str, attributes: &[(String, String)], empty: bool) -> Option<usize> {
        write_start_tag(&mut self.xml, name, attributes, empty);
        if empty {
            return None;
        }
        let depth = self.open_tags.len();
        self.open_tags.push(name.to_string());
        Some(depth)
    }

    fn close_to(&mut self, depth: usize) {
        while self.open_tags.len() > depth {
            if let Some(name) = self.open_tags.pop() {
                write_end_tag(&mut self.xml, &name);
            }
        }
    }

    fn push_text(&mut self, raw: &str, transformed: &str) {
        self.xml.push_str(&html_escape::encode_text(raw));
        self.content.push_str(transformed);
    }

    /// The finished verse, or `None` when no verse was started or it holds no text.
    fn finish(mut self, sequence_index: u32) -> Option<Verse> {
        let indicator = self.indicator.take()?;
        let content = self.content.trim().to_string();
        if content.is_empty() {
            return None;
        }
        self.close_to(0);
        self.xml.push_str("</verse>");

        Some(Verse {
            indicator,
            original_content: self.xml,
            content,
            sequence_index,
        })
    }
}

struct Slot {
    division: Division,
    parent: usize,
    /// Level declared by the markup, used for placement and counting.
    rank: u32,
    /// Opened while content before the first milestone was being skipped.
    skipped: bool,
}

#[derive(Default)]
struct OpenElement {
    /// Verse generation and depth to close back to on exit.
    copied: Option<(u64, usize)>,
    note: bool,
    div: bool,
    division: Option<usize>,
    language: Option<Language>,
}

struct Walker<'a> {
    tree: &'a MarkupTree,
    context: &'a mut ImportContext,
    state_set: StateSet,
    language: Option<Language>,
    line_titles: bool,
    start: NodeId,
    slots: Vec<Slot>,
    current: usize,
    sequence: u32,
    verses_started: u32,
    open: Vec<OpenElement>,
    div_depth: u32,
    generation: u64,
    buffer: VerseBuffer,
}

impl<'a> Walker<'a> {
    fn new(
        tree: &'a MarkupTree,
        context: &'a mut ImportContext,
        state_set: StateSet,
        language: Option<Language>,
        line_titles: bool,
        start: NodeId,
    ) -> Self {
        Walker {
            tree,
            context,
            state_set,
            language,
            line_titles,
            start,
            slots: vec![Slot {
                division: Division::root(),
                parent: 0,
                rank: 0,
                skipped: false,
            }],
            current: 0,
            sequence: 0,
            verses_started: 0,
            open: Vec::new(),
            div_depth: 0,
            generation: 0,
            buffer: VerseBuffer::new(None, 0),
        }
    }

    fn on_visit(&mut self, v: Visit) -> ImportResult<VisitControl> {
        let tree = self.tree;
        match v {
            Visit::Enter { id, .. } => match tree.node(id).map(|n| &n.kind) {
                Some(NodeKind::Element { .. }) => self.enter_element(id),
                Some(NodeKind::Text(text)) => {
                    self.text(text);
                    Ok(VisitControl::Continue)
                }
                _ => Ok(VisitControl::Continue),
            },
            Visit::Exit { id } => {
                if tree.tag_name(id).is_some() {
                    self.exit_element();
                }
                Ok(VisitControl::Continue)
            }
        }
    }

    fn enter_element(&mut self, id: NodeId) -> ImportResult<VisitControl> {
        let tree = self.tree;
        let Some(name) = tree.tag_name(id) else {
            return Ok(VisitControl::Continue);
        };

        let mut open = OpenElement {
            language: tree
                .attribute(id, "lang")
                .or_else(|| tree.attribute(id, "xml:lang"))
                .map(Language::parse),
            ..Default::default()
        };
        let role = MarkupRole::of(name);

        if id == self.start {
            self.open.push(open);
            return Ok(VisitControl::Continue);
        }

        // Nothing inside a left-out note counts, nested notes aside.
        if self.context.suppressing_notes() {
            if role == MarkupRole::Note {
                self.context.enter_note();
                open.note = true;
            }
            self.open.push(open);
            return Ok(VisitControl::Continue);
        }

        let result = match role {
            MarkupRole::Division => self.enter_division(id, name, &mut open),
            MarkupRole::Milestone => self.enter_milestone(id, &mut open),
            MarkupRole::Line => self.enter_line(id, &mut open),
            MarkupRole::Head => Ok(VisitControl::SkipChildren),
            MarkupRole::Note => {
                if tree.attribute(id, "type") == Some("title") {
                    Ok(VisitControl::SkipChildren)
                } else {
                    self.context.enter_note();
                    open.note = true;
                    self.copy_element(id, &mut open);
                    Ok(VisitControl::Continue)
                }
            }
            MarkupRole::Other => {
                if name == "list" && tree.attribute(id, "type") == Some("toc") {
                    Ok(VisitControl::SkipChildren)
                } else {
                    self.copy_element(id, &mut open);
                    Ok(VisitControl::Continue)
                }
            }
        };

        // Exit is reported for every entered element, so the stack stays balanced
        // even when the marker is rejected.
        self.open.push(open);
        result
    }

    fn exit_element(&mut self) {
        let Some(open) = self.open.pop() else {
            return;
        };

        if let Some((generation, depth)) = open.copied {
            if self.buffer.generation == generation {
                self.buffer.close_to(depth);
            }
        }
        if open.note {
            self.context.exit_note();
        }
        if open.div {
            self.div_depth = self.div_depth.saturating_sub(1);
        }
        if let Some(slot) = open.division {
            if self.is_open(slot) {
                self.close_current();
                self.current = self.slots[slot].parent;
            }
        }
    }

    fn enter_division(&mut self, id: NodeId, name: &str, open: &mut OpenElement) -> ImportResult<VisitControl> {
        self.div_depth += 1;
        open.div = true;

        let tree = self.tree;
        let kind = tree.attribute(id, "type");
        let descriptor = tree.attribute(id, "n");
        let state = kind.and_then(|k| self.state_set.find(k)).cloned();

        let rank = match &state {
            Some(s) => s.level,
            None => div_level(name).unwrap_or(self.div_depth),
        };
        let declared = self.state_set.is_empty() || state.is_some();
        let parent = self.placement(rank);
        let level = self.slots[parent].division.level + 1;

        match self.context.division_policy(level, declared) {
            DivisionPolicy::Reject => Err(ImportError::UnsupportedMarker {
                marker: format!("{} type=\"{}\"", name, kind.unwrap_or("")),
                location: self.location(None),
            }),
            DivisionPolicy::Fold => {
                debug(&format!("Folding <{}> type={:?} n={:?} into its parent", name, kind, descriptor));
                Ok(VisitControl::Continue)
            }
            DivisionPolicy::Create => {
                let head = self.find_head(id)?;
                let readable = state.as_ref().is_some_and(|s| s.is_chunk());
                let slot = self.make_division(
                    parent,
                    rank,
                    kind.map(|s| s.to_string()),
                    descriptor.map(|s| s.to_string()),
                    head,
                    readable,
                );
                open.division = Some(slot);
                Ok(VisitControl::Continue)
            }
        }
    }

    fn enter_milestone(&mut self, id: NodeId, open: &mut OpenElement) -> ImportResult<VisitControl> {
        let tree = self.tree;
        let unit = tree.attribute(id, "unit").unwrap_or("");
        let n = tree.attribute(id, "n");

        self.context.observe_milestone();

        // Without a citation scheme every milestone is a verse boundary.
        let state = self.state_set.find(unit).cloned();
        if state.is_none() && !self.state_set.is_empty() {
            self.copy_element(id, open);
            return Ok(VisitControl::SkipChildren);
        }

        if let Some(state) = state.filter(|s| s.is_chunk()) {
            let parent = self.placement(state.level);
            let level = self.slots[parent].division.level + 1;
            if self.context.division_policy(level, true) == DivisionPolicy::Create {
                self.make_division(
                    parent,
                    state.level,
                    Some(state.unit.clone()),
                    n.map(|s| s.to_string()),
                    None,
                    true,
                );
            }
        } else {
            self.ensure_division();
            let indicator = if unit.eq_ignore_ascii_case("line") {
                VerseIndicator::Line(self.line_reference(n)?)
            } else {
                match n.map(str::trim).filter(|s| !s.is_empty()) {
                    Some(label) => VerseIndicator::Label(label.to_string()),
                    None => VerseIndicator::Label((self.verses_started + 1).to_string()),
                }
            };
            self.start_verse(indicator);
        }

        Ok(VisitControl::SkipChildren)
    }

    fn enter_line(&mut self, id: NodeId, open: &mut OpenElement) -> ImportResult<VisitControl> {
        if self.context.accepts_content() {
            let reference = self.line_reference(self.tree.attribute(id, "n"))?;

            if self.state_set.has_line_unit() {
                self.ensure_division();
                self.start_verse(VerseIndicator::Line(reference));
            }
        }

        self.copy_element(id, open);
        Ok(VisitControl::Continue)
    }

    /// Read the `n` of a line, or count on from the previous line.
    fn line_reference(&mut self, n: Option<&str>) -> ImportResult<LineReference> {
        let reference = match n.map(str::trim).filter(|s| !s.is_empty()) {
            Some(n) => LineReference::parse(n).map_err(|e| ImportError::from(e).at(self.location(Some(n))))?,
            None => self.context.next_line(),
        };
        self.context.record_line(&reference);
        Ok(reference)
    }

    fn text(&mut self, text: &str) {
        if self.context.suppressing_notes() || !self.context.accepts_content() {
            return;
        }

        if text.trim().is_empty() {
            if self.buffer.indicator.is_some() {
                self.buffer.push_text(text, text);
            }
            return;
        }

        self.ensure_division();
        if self.buffer.indicator.is_none() {
            self.verses_started += 1;
            self.buffer.indicator = Some(VerseIndicator::Label(self.verses_started.to_string()));
        }

        let transformed = transform_text(text, self.current_language());
        self.buffer.push_text(text, &transformed);
    }

    fn copy_element(&mut self, id: NodeId, open: &mut OpenElement) {
        if !self.context.accepts_content() || self.context.suppressing_notes() {
            return;
        }
        let tree = self.tree;
        let Some(name) = tree.tag_name(id) else {
            return;
        };
        let empty = tree.children(id).is_empty();
        if let Some(depth) = self.buffer.open(name, tree.attributes(id), empty) {
            open.copied = Some((self.buffer.generation, depth));
        }
    }

    fn current_language(&self) -> Option<&Language> {
        self.open
            .iter()
            .rev()
            .find_map(|o| o.language.as_ref())
            .or(self.language.as_ref())
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Markup opened since the last verse, e.g. the `<p>` around a
    /// milestone, stays at the start of the new verse.
    fn start_verse(&mut self, indicator: VerseIndicator) {
        if self.buffer.indicator.is_some() {
            self.finish_verse();
        }
        self.verses_started += 1;
        self.buffer.indicator = Some(indicator);
    }

    fn finish_verse(&mut self) {
        let generation = self.next_generation();
        let buffer = std::mem::replace(&mut self.buffer, VerseBuffer::new(None, generation));

        if self.current == 0 {
            return;
        }
        let division = &mut self.slots[self.current].division;
        if let Some(verse) = buffer.finish(division.verses.len() as u32 + 1) {
            division.verses.push(verse);
            division.readable_unit = true;
        }
    }

    /// Finish the current division's verse and give it its line range title.
    fn close_current(&mut self) {
        self.finish_verse();

        if self.line_titles && self.current != 0 {
            if let Some(title) = self.context.line_range_title() {
                let division = &mut self.slots[self.current].division;
                if division.title.is_none() {
                    division.title = Some(title);
                }
            }
        }
        self.context.reset_line_range();
    }

    /// Where a division of the given rank goes: below the current division
    /// when deeper, next to the division of equal rank otherwise.
    fn placement(&self, rank: u32) -> usize {
        if self.current == 0 {
            return 0;
        }
        if rank > self.slots[self.current].rank {
            return self.current;
        }

        let mut d = self.current;
        while d != 0 && rank < self.slots[d].rank {
            d = self.slots[d].parent;
        }

        if d == 0 {
            0
        } else if self.slots[d].rank == rank {
            self.slots[d].parent
        } else {
            d
        }
    }

    fn is_open(&self, slot: usize) -> bool {
        let mut d = self.current;
        while d != 0 {
            if d == slot {
                return true;
            }
            d = self.slots[d].parent;
        }
        false
    }

    fn make_division(
        &mut self,
        parent: usize,
        rank: u32,
        kind: Option<String>,
        descriptor: Option<String>,
        original_title: Option<String>,
        readable_unit: bool,
    ) -> usize {
        self.close_current();

        let count = self.context.increment_division_level(rank);
        let descriptor = descriptor
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| count.to_string());

        let parent_division = &self.slots[parent].division;
        let level = parent_division.level + 1;
        let mut title_parts = parent_division.title_parts.clone();
        title_parts.push(descriptor.clone());

        self.sequence += 1;
        let title = original_title
            .as_deref()
            .map(|t| transform_text(t, self.language.as_ref()));

        let division = Division {
            kind,
            descriptor,
            level,
            sequence_number: self.sequence,
            title,
            original_title,
            title_parts,
            readable_unit,
            children: Vec::new(),
            verses: Vec::new(),
        };
        debug(&format!(
            "Division {} at level {}: {}",
            division.sequence_number,
            level,
            division.label()
        ));

        let skipped = !self.context.accepts_content();
        self.slots.push(Slot {
            division,
            parent,
            rank,
            skipped,
        });
        self.current = self.slots.len() - 1;
        self.verses_started = 0;
        self.current
    }

    /// Open a division for content found before any division marker.
    fn ensure_division(&mut self) {
        if self.current != 0 {
            return;
        }
        // Markup opened before the content belongs to the new division's first verse.
        let pending = std::mem::replace(&mut self.buffer, VerseBuffer::new(None, 0));
        self.make_division(0, 1, None, None, None, false);
        self.buffer = pending;
    }

    /// Text of the first `<head>` of a division, not looking into nested
    /// divisions or past milestones.
    fn find_head(&self, div: NodeId) -> ImportResult<Option<String>> {
        let tree = self.tree;
        let mut stack: Vec<(NodeId, usize)> = tree.children(div).iter().rev().map(|c| (*c, 1)).collect();

        while let Some((id, depth)) = stack.pop() {
            match tree.role(id) {
                MarkupRole::Head => {
                    let text = text_without_notes(tree, id)?;
                    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    return Ok(if text.is_empty() { None } else { Some(text) });
                }
                MarkupRole::Division | MarkupRole::Milestone => continue,
                _ => {}
            }
            if depth < HEAD_SEARCH_DEPTH {
                stack.extend(tree.children(id).iter().rev().map(|c| (*c, depth + 1)));
            }
        }

        Ok(None)
    }

    fn location(&self, line: Option<&str>) -> ErrorLocation {
        let mut labels = Vec::new();
        let mut d = self.current;
        while d != 0 {
            labels.push(self.slots[d].division.label());
            d = self.slots[d].parent;
        }
        labels.reverse();
        ErrorLocation::new(labels.join(" > "), line.map(|s| s.to_string()))
    }

    fn finish(mut self) -> Division {
        self.close_current();
        assemble(drop_skipped(self.slots))
    }
}

fn text_without_notes(tree: &MarkupTree, id: NodeId) -> ImportResult<String> {
    let mut text = String::new();
    tree.visit(id, |v| {
        if let Visit::Enter { id, .. } = v {
            if tree.role(id) == MarkupRole::Note {
                return Ok(VisitControl::SkipChildren);
            }
            if let Some(NodeKind::Text(t)) = tree.node(id).map(|n| &n.kind) {
                text.push_str(t);
            }
        }
        Ok(VisitControl::Continue)
    })?;
    Ok(text)
}

/// Remove divisions opened before the first milestone that never got any
/// content, and renumber the rest in document order.
fn drop_skipped(slots: Vec<Slot>) -> Vec<Slot> {
    let mut keep = vec![true; slots.len()];
    let mut has_children = vec![false; slots.len()];
    for idx in (1..slots.len()).rev() {
        let slot = &slots[idx];
        keep[idx] = !(slot.skipped && slot.division.verses.is_empty() && !has_children[idx]);
        if keep[idx] {
            has_children[slot.parent] = true;
        }
    }

    let mut new_index = vec![0; slots.len()];
    let mut kept = Vec::with_capacity(slots.len());
    let mut sequence = 0;
    for (idx, mut slot) in slots.into_iter().enumerate() {
        if !keep[idx] {
            continue;
        }
        slot.parent = new_index[slot.parent];
        if idx != 0 {
            sequence += 1;
            slot.division.sequence_number = sequence;
        }
        new_index[idx] = kept.len();
        kept.push(slot);
    }
    kept
}

/// Turn the flat slot list into an owned tree. Slot 0 is the root and every
/// slot's parent comes before it.
fn assemble(slots: Vec<Slot>) -> Division {
    let mut parents = Vec::with_capacity(slots.len());
    let mut divisions = Vec::with_capacity(slots.len());
    for slot in slots {
        parents.push(slot.parent);
        divisions.push(slot.division);
    }

    let mut children: Vec<Vec<Division>> = (0..divisions.len()).map(|_| Vec::new()).collect();

    while let Some(mut division) = divisions.pop() {
        let idx = divisions.len();
        let mut kids = std::mem::take(&mut children[idx]);
        kids.reverse();
        division.children = kids;

        if idx == 0 {
            return division;
        }
        children[parents[idx]].push(division);
    }

    Division::root()
}
