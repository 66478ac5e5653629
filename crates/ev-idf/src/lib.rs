//! ev-idf: building-energy text document model.
//!
//! Loads and writes IDF-style documents, exposes typed access through a
//! static class schema, and provides the per-document [`NameRegistry`].

pub mod document;
pub mod object;
pub mod parse;
pub mod registry;
pub mod schema;
pub mod views;
pub mod write;

use std::path::PathBuf;

pub use document::Document;
pub use object::{IdfObject, Span};
pub use parse::ParseError;
pub use registry::{MANAGED_PREFIX, NameRegistry};
pub use schema::ClassKind;
pub use views::{Material, SimpleGlazingMaterial, SurfaceView};

pub type IdfResult<T> = Result<T, IdfError>;

#[derive(thiserror::Error, Debug)]
pub enum IdfError {
    #[error("Parse error in {}: {source}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        source: ParseError,
    },

    #[error("{class} '{object}' holds a value that cannot be written: {value:?}")]
    UnwritableValue {
        class: String,
        object: String,
        value: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ParseError> for IdfError {
    fn from(source: ParseError) -> Self {
        IdfError::Parse { path: None, source }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or_else(|| "<text>".to_string(), |p| p.display().to_string())
}

/// Parse document text.
pub fn load(text: &str) -> Result<Document, ParseError> {
    Document::load(text)
}

/// Write a document back to text.
pub fn serialize(doc: &Document) -> String {
    doc.to_idf_string()
}
