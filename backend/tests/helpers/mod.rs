use std::path::PathBuf;

use unicode_normalization::UnicodeNormalization;

use textcritical_backend::app_settings::ImportOptions;
use textcritical_backend::importer::import_xml;
use textcritical_backend::text_model::ImportedWork;

#[allow(dead_code)]
pub const AGAMEMNON: &str = include_str!("../data/agamemnon.xml");

#[allow(dead_code)]
pub const BELLUM_GALLICUM: &str = include_str!("../data/bellum_gallicum.xml");

#[allow(dead_code)]
pub const BROKEN_LINE: &str = include_str!("../data/broken_line.xml");

#[allow(dead_code)]
pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data")
}

#[allow(dead_code)]
pub fn import_with(xml: &str, options: ImportOptions) -> ImportedWork {
    match import_xml(xml, &options) {
        Ok(work) => work,
        Err(e) => panic!("import failed: {}", e),
    }
}

/// Compare Greek text independent of how the test source was composed.
#[allow(dead_code)]
pub fn nfc(s: &str) -> String {
    s.nfc().collect()
}
