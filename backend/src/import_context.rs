//! Mutable state of one import run.
//!
//! A context is created per document and borrowed mutably by the importer;
//! it is never shared between imports.

use std::collections::BTreeMap;

use crate::app_settings::ImportOptions;
use crate::line_reference::{LineReference, line_range_title};

/// What to do with a division marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivisionPolicy {
    Create,
    /// Don't create it; its content belongs to the enclosing division.
    Fold,
    Reject,
}

#[derive(Debug, Clone)]
pub struct ImportContext {
    division_level_counts: BTreeMap<u32, u32>,
    milestone_seen: bool,
    note_depth: u32,
    policy: ImportOptions,
    line_start: Option<LineReference>,
    line_end: Option<LineReference>,
}

impl ImportContext {
    pub fn new(policy: ImportOptions) -> Self {
        ImportContext {
            division_level_counts: BTreeMap::new(),
            milestone_seen: false,
            note_depth: 0,
            policy,
            line_start: None,
            line_end: None,
        }
    }

    pub fn policy(&self) -> &ImportOptions {
        &self.policy
    }

    /// Count one more division at `level` and restart the counts of every
    /// deeper level. Returns the new count.
    pub fn increment_division_level(&mut self, level: u32) -> u32 {
        let count = self.division_level_counts.entry(level).or_insert(0);
        *count += 1;
        let new_count = *count;

        for (_, deeper) in self.division_level_counts.range_mut(level.saturating_add(1)..) {
            *deeper = 0;
        }

        new_count
    }

    pub fn get_division_level_count(&self, level: u32) -> u32 {
        self.division_level_counts.get(&level).copied().unwrap_or(0)
    }

    pub fn observe_milestone(&mut self) {
        self.milestone_seen = true;
    }

    pub fn milestone_seen(&self) -> bool {
        self.milestone_seen
    }

    /// False while content is being skipped until the first milestone.
    pub fn accepts_content(&self) -> bool {
        !self.policy.ignore_content_before_milestones || self.milestone_seen
    }

    pub fn enter_note(&mut self) {
        self.note_depth += 1;
    }

    pub fn exit_note(&mut self) {
        self.note_depth = self.note_depth.saturating_sub(1);
    }

    pub fn note_depth(&self) -> u32 {
        self.note_depth
    }

    /// Inside a note whose text is being left out.
    pub fn suppressing_notes(&self) -> bool {
        self.policy.ignore_notes && self.note_depth > 0
    }

    pub fn division_policy(&self, level: u32, declared: bool) -> DivisionPolicy {
        if self.policy.ignore_divisions {
            return DivisionPolicy::Fold;
        }
        if !declared {
            if self.policy.reject_undeclared_divs {
                return DivisionPolicy::Reject;
            }
            if self.policy.ignore_undeclared_divs {
                return DivisionPolicy::Fold;
            }
        }
        match self.policy.division_min {
            Some(min) if level > min => DivisionPolicy::Fold,
            _ => DivisionPolicy::Create,
        }
    }

    /// The reference an `<l>` without `n` gets.
    pub fn next_line(&self) -> LineReference {
        self.line_end
            .as_ref()
            .map(|l| l.next())
            .unwrap_or_else(|| LineReference::new(1))
    }

    pub fn record_line(&mut self, line: &LineReference) {
        if self.line_start.is_none() {
            self.line_start = Some(line.clone());
        }
        self.line_end = Some(line.clone());
    }

    pub fn last_line(&self) -> Option<&LineReference> {
        self.line_end.as_ref()
    }

    /// "lines X-Y" for the lines recorded since the last reset.
    pub fn line_range_title(&self) -> Option<String> {
        match (&self.line_start, &self.line_end) {
            (Some(start), Some(end)) => Some(line_range_title(start, end)),
            _ => None,
        }
    }

    /// Start a new range. Numbering continues from the last line.
    pub fn reset_line_range(&mut self) {
        self.line_start = None;
    }
}
