//! Reading source documents from disk.
//!
//! TEI files in the wild come as UTF-8 with or without a BOM, and now and
//! then as UTF-16. The encoding is detected from the BOM; line endings are
//! normalized to `\n`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::errors::{ImportError, ImportResult};
use crate::logger;

/// Decode `bytes` to a UTF-8 string with Unix line endings.
///
/// Malformed sequences are an error, reported with the byte offset of the
/// first one when the input is UTF-8.
pub fn decode_document(bytes: &[u8]) -> ImportResult<String> {
    let (encoding, bom_length) = detect_encoding(bytes);
    let body = &bytes[bom_length..];

    let decoded = if encoding == UTF_8 {
        match std::str::from_utf8(body) {
            Ok(s) => s.to_string(),
            Err(e) => {
                return Err(ImportError::Encoding(format!(
                    "invalid UTF-8 at byte {}",
                    e.valid_up_to() + bom_length
                )));
            }
        }
    } else {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(body);
        if had_errors {
            return Err(ImportError::Encoding(format!("invalid {} data", encoding.name())));
        }
        decoded.into_owned()
    };

    Ok(decoded.replace("\r\n", "\n"))
}

/// Read and decode the XML file at `path`.
pub fn read_xml_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).context(format!("Failed to read file: {:?}", path))?;

    let (encoding, bom_length) = detect_encoding(&bytes);
    logger::debug(&format!(
        "File: {:?}, Encoding: {}, BOM: {}",
        path.file_name().unwrap_or_default(),
        encoding.name(),
        bom_length > 0
    ));

    decode_document(&bytes).context(format!("Failed to decode file: {:?}", path))
}

/// The encoding named by the BOM, and the BOM's length in bytes.
fn detect_encoding(bytes: &[u8]) -> (&'static Encoding, usize) {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return (UTF_8, 3);
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return (UTF_16LE, 2);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return (UTF_16BE, 2);
    }
    (UTF_8, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_encoding() {
        assert_eq!(detect_encoding(&[0xFF, 0xFE, 0x3C, 0x00]), (UTF_16LE, 2));
        assert_eq!(detect_encoding(&[0xFE, 0xFF, 0x00, 0x3C]), (UTF_16BE, 2));
        assert_eq!(detect_encoding(&[0xEF, 0xBB, 0xBF, 0x3C]), (UTF_8, 3));
        assert_eq!(detect_encoding(b"<TEI>"), (UTF_8, 0));
    }

    #[test]
    fn test_decode_utf16le_crlf() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<p>\r\nλόγος</p>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_document(&bytes).unwrap(), "<p>\nλόγος</p>");
    }

    #[test]
    fn test_decode_utf8_bom() {
        let bytes = [&[0xEF, 0xBB, 0xBF][..], "<p>a</p>".as_bytes()].concat();
        assert_eq!(decode_document(&bytes).unwrap(), "<p>a</p>");
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode_document(&[b'<', b'p', 0xFF, b'>']).unwrap_err();
        assert_eq!(err.to_string(), ImportError::Encoding("invalid UTF-8 at byte 2".to_string()).to_string());
    }
}
