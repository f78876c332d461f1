use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by `ImportOptions::apply_env`.
pub const ENV_PREFIX: &str = "TEXTCRITICAL_";

/// Switches controlling one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Replace a previously imported copy of the work. Not used by the
    /// importer itself; carried for whatever stores the result.
    pub overwrite: bool,
    /// Treat division markers as plain markup.
    pub ignore_divisions: bool,
    /// Skip verses and text until the first milestone of the state set.
    pub ignore_content_before_milestones: bool,
    /// Fold divisions whose type the state set does not declare into their parent.
    pub ignore_undeclared_divs: bool,
    /// Fail on divisions whose type the state set does not declare.
    pub reject_undeclared_divs: bool,
    /// Deepest division level to create. Deeper divisions fold into their parent.
    pub division_min: Option<u32>,
    /// Leave notes out of verse text and stored markup.
    pub ignore_notes: bool,
    /// Index of the `refsDecl` to use; `None` merges all of them.
    pub state_set: Option<usize>,
    /// Title divisions by the lines they hold ("lines 1-39"). `None` follows
    /// the header's reference unit.
    pub use_line_count_for_divisions: Option<bool>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            overwrite: false,
            ignore_divisions: false,
            ignore_content_before_milestones: false,
            ignore_undeclared_divs: false,
            reject_undeclared_divs: false,
            division_min: None,
            ignore_notes: false,
            state_set: None,
            use_line_count_for_divisions: None,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// A number, or empty / `*` / `none` for no value.
fn parse_optional<T: std::str::FromStr>(v: &str) -> Option<Option<T>> {
    let v = v.trim();
    if v.is_empty() || v == "*" || v.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    v.parse::<T>().ok().map(Some)
}

impl ImportOptions {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file: {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Failed to parse options file: {}", path.display()))
    }

    /// Defaults overridden from `TEXTCRITICAL_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from a variable lookup, e.g. `TEXTCRITICAL_IGNORE_NOTES=true`.
    /// Values that don't parse are left alone.
    pub fn apply_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = get("OVERWRITE").as_deref().and_then(parse_bool) {
            self.overwrite = v;
        }
        if let Some(v) = get("IGNORE_DIVISIONS").as_deref().and_then(parse_bool) {
            self.ignore_divisions = v;
        }
        if let Some(v) = get("IGNORE_CONTENT_BEFORE_MILESTONES").as_deref().and_then(parse_bool) {
            self.ignore_content_before_milestones = v;
        }
        if let Some(v) = get("IGNORE_UNDECLARED_DIVS").as_deref().and_then(parse_bool) {
            self.ignore_undeclared_divs = v;
        }
        if let Some(v) = get("REJECT_UNDECLARED_DIVS").as_deref().and_then(parse_bool) {
            self.reject_undeclared_divs = v;
        }
        if let Some(v) = get("IGNORE_NOTES").as_deref().and_then(parse_bool) {
            self.ignore_notes = v;
        }
        if let Some(v) = get("DIVISION_MIN").as_deref().and_then(parse_optional::<u32>) {
            self.division_min = v;
        }
        if let Some(v) = get("STATE_SET").as_deref().and_then(parse_optional::<usize>) {
            self.state_set = v;
        }
        if let Some(v) = get("USE_LINE_COUNT_FOR_DIVISIONS").as_deref().and_then(|s| {
            if s.trim().eq_ignore_ascii_case("auto") {
                Some(None)
            } else {
                parse_bool(s).map(Some)
            }
        }) {
            self.use_line_count_for_divisions = v;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default() {
        let o = ImportOptions::default();
        assert!(!o.ignore_notes);
        assert_eq!(o.state_set, None);
        assert_eq!(o.division_min, None);
    }

    #[test]
    fn test_from_json_partial() {
        let o = ImportOptions::from_json_str(r#"{"ignore_notes": true, "state_set": 1}"#).unwrap();
        assert!(o.ignore_notes);
        assert_eq!(o.state_set, Some(1));
        assert!(!o.ignore_divisions);
    }

    #[test]
    fn test_apply_vars() {
        let vars: HashMap<String, String> = [
            ("TEXTCRITICAL_IGNORE_NOTES", "TRUE"),
            ("TEXTCRITICAL_DIVISION_MIN", "2"),
            ("TEXTCRITICAL_STATE_SET", "*"),
            ("TEXTCRITICAL_IGNORE_DIVISIONS", "maybe"),
            ("TEXTCRITICAL_USE_LINE_COUNT_FOR_DIVISIONS", "false"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let start = ImportOptions {
            state_set: Some(3),
            ..Default::default()
        };
        let o = start.apply_vars(|k| vars.get(k).cloned());

        assert!(o.ignore_notes);
        assert_eq!(o.division_min, Some(2));
        assert_eq!(o.state_set, None);
        assert!(!o.ignore_divisions);
        assert_eq!(o.use_line_count_for_divisions, Some(false));
    }
}
