//! Error types for the import pipeline and the transliterator.

use std::fmt;

use thiserror::Error;

/// Where in a document an import failure happened.
///
/// `division_path` is the chain of division labels from the top level down to
/// the division being filled, e.g. `"Book 1 > Chapter 2"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    pub division_path: String,
    pub line: Option<String>,
}

impl ErrorLocation {
    pub fn new(division_path: impl Into<String>, line: Option<String>) -> Self {
        ErrorLocation {
            division_path: division_path.into(),
            line,
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.division_path.is_empty() {
            "(before first division)"
        } else {
            self.division_path.as_str()
        };

        match &self.line {
            Some(line) => write!(f, "{}, line {}", path, line),
            None => write!(f, "{}", path),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineReferenceError {
    #[error("no line number found in '{0}'")]
    MissingNumber(String),

    #[error("line number in '{0}' is out of range")]
    Overflow(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransliterationError {
    #[error("input is not valid UTF-8 (invalid sequence at byte {position})")]
    Encoding { position: usize },
}

/// A failed import. The whole document is rejected; nothing is partially returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("format error at {location}: {message}")]
    Format {
        message: String,
        location: ErrorLocation,
    },

    #[error("unsupported marker <{marker}> at {location}")]
    UnsupportedMarker {
        marker: String,
        location: ErrorLocation,
    },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("XML parse error at byte {position}: {message}")]
    Xml { message: String, position: usize },
}

impl ImportError {
    pub fn format(message: impl Into<String>) -> Self {
        ImportError::Format {
            message: message.into(),
            location: ErrorLocation::default(),
        }
    }

    pub fn location(&self) -> Option<&ErrorLocation> {
        match self {
            ImportError::Format { location, .. } => Some(location),
            ImportError::UnsupportedMarker { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Attach a location to a structural error that was raised without one.
    pub fn at(self, new_location: ErrorLocation) -> Self {
        match self {
            ImportError::Format { message, .. } => ImportError::Format {
                message,
                location: new_location,
            },
            ImportError::UnsupportedMarker { marker, .. } => ImportError::UnsupportedMarker {
                marker,
                location: new_location,
            },
            other => other,
        }
    }
}

impl From<LineReferenceError> for ImportError {
    fn from(e: LineReferenceError) -> Self {
        ImportError::format(e.to_string())
    }
}

impl From<TransliterationError> for ImportError {
    fn from(e: TransliterationError) -> Self {
        ImportError::Encoding(e.to_string())
    }
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let loc = ErrorLocation::new("Book 1 > 2", Some("354a".to_string()));
        assert_eq!(loc.to_string(), "Book 1 > 2, line 354a");

        let loc = ErrorLocation::default();
        assert_eq!(loc.to_string(), "(before first division)");
    }

    #[test]
    fn test_line_reference_error_becomes_format_error() {
        let e: ImportError = LineReferenceError::MissingNumber("abc".to_string()).into();
        assert!(matches!(e, ImportError::Format { .. }));

        let e = e.at(ErrorLocation::new("Book 2", None));
        assert_eq!(e.location().map(|l| l.division_path.as_str()), Some("Book 2"));
    }
}
