//! Line identifiers such as `354`, `354a` or `-12`.
//!
//! A reference is split into a leading non-digit marker (prefix), the line
//! number, and whatever trails it (suffix, typically a sub-line letter).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LineReferenceError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineReference {
    pub number: u32,
    pub prefix: String,
    pub suffix: String,
}

impl LineReference {
    pub fn new(number: u32) -> Self {
        LineReference {
            number,
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    /// Parse a line identifier. Leading zeros in the number are not kept;
    /// anything else, whitespace included, is kept in the prefix or suffix.
    pub fn parse(text: &str) -> Result<Self, LineReferenceError> {
        let digits_start = match text.find(|c: char| c.is_ascii_digit()) {
            Some(idx) => idx,
            None => return Err(LineReferenceError::MissingNumber(text.to_string())),
        };

        let rest = &text[digits_start..];
        let digits_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());

        let number = rest[..digits_len]
            .parse::<u32>()
            .map_err(|_| LineReferenceError::Overflow(text.to_string()))?;

        Ok(LineReference {
            number,
            prefix: text[..digits_start].to_string(),
            suffix: rest[digits_len..].to_string(),
        })
    }

    /// Advance to the next line. Sub-line suffixes are kept as they are.
    pub fn increment(&mut self) {
        self.number = self.number.saturating_add(1);
    }

    /// The reference that follows this one, leaving `self` untouched.
    pub fn next(&self) -> Self {
        let mut r = self.clone();
        r.increment();
        r
    }
}

impl fmt::Display for LineReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.number, self.suffix)
    }
}

impl FromStr for LineReference {
    type Err = LineReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LineReference::parse(s)
    }
}

/// Title for a division named after the lines it spans, e.g. "lines 1-39".
pub fn line_range_title(start: &LineReference, end: &LineReference) -> String {
    format!("lines {}-{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let r = LineReference::parse("354a").unwrap();
        assert_eq!(r.number, 354);
        assert_eq!(r.prefix, "");
        assert_eq!(r.suffix, "a");
        assert_eq!(r.to_string(), "354a");
    }

    #[test]
    fn test_parse_prefix() {
        let r: LineReference = "-12b".parse().unwrap();
        assert_eq!(r.prefix, "-");
        assert_eq!(r.number, 12);
        assert_eq!(r.suffix, "b");
        assert_eq!(r.to_string(), "-12b");
    }

    #[test]
    fn test_parse_keeps_surrounding_text() {
        let r = LineReference::parse(" 354a ").unwrap();
        assert_eq!(r.number, 354);
        assert_eq!(r.prefix, " ");
        assert_eq!(r.suffix, "a ");
        assert_eq!(r.to_string(), " 354a ");
    }

    #[test]
    fn test_parse_without_digits_fails() {
        assert_eq!(
            LineReference::parse("pr"),
            Err(LineReferenceError::MissingNumber("pr".to_string()))
        );
        assert!(LineReference::parse("").is_err());
    }

    #[test]
    fn test_parse_overflow() {
        assert!(matches!(
            LineReference::parse("99999999999"),
            Err(LineReferenceError::Overflow(_))
        ));
    }

    #[test]
    fn test_increment() {
        let mut r = LineReference::parse("354a").unwrap();
        r.increment();
        assert_eq!(r.number, 355);
        assert_eq!(r.to_string(), "355a");
    }

    #[test]
    fn test_copy_is_independent() {
        let mut r = LineReference::parse("354a").unwrap();
        let r2 = r.clone();

        r.prefix = "_".to_string();
        r.increment();

        assert_eq!(r2.to_string(), "354a");
        assert_eq!(r.to_string(), "_355a");
    }

    #[test]
    fn test_default_increments_to_first_line() {
        let r = LineReference::default();
        assert_eq!(r.next().to_string(), "1");
        assert_eq!(r.number, 0);
    }

    #[test]
    fn test_line_range_title() {
        let start = LineReference::new(1);
        let end = LineReference::parse("39").unwrap();
        assert_eq!(line_range_title(&start, &end), "lines 1-39");
    }
}
