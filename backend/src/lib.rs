pub mod errors;
pub mod line_reference;
pub mod beta_code;
pub mod language_tools;
pub mod markup;
pub mod tei_header;
pub mod import_context;
pub mod text_model;
pub mod importer;
pub mod html_transformer;
pub mod text_converter;
pub mod notes;
pub mod encoding;
pub mod batch_import;
pub mod app_settings;
pub mod logger;

pub use app_settings::ImportOptions;
pub use errors::{ErrorLocation, ImportError, ImportResult, LineReferenceError, TransliterationError};
pub use import_context::ImportContext;
pub use importer::{DocumentImporter, import, import_work, import_xml};
pub use line_reference::LineReference;
pub use markup::{MarkupTree, NodeId, parse_xml};
pub use text_model::{Division, ImportedWork, Verse, VerseIndicator};
