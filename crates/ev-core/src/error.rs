use thiserror::Error;

use crate::element::ElementType;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Rejections raised before anything is mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unknown element type: {name}")]
    UnknownElementType { name: String },

    #[error("Construction for {element} has no layers")]
    EmptyLayers { element: ElementType },

    #[error("Construction for {element} has a blank layer name at position {index}")]
    BlankLayerName { element: ElementType, index: usize },

    #[error("Construction for {element} has a {field} containing a document delimiter: {value:?}")]
    ReservedCharacter {
        element: ElementType,
        field: String,
        value: String,
    },

    #[error("Simple glazing is only valid for windows, not {element}")]
    GlazingOnOpaque { element: ElementType },

    #[error("Window construction needs either layers or a simple glazing spec")]
    WindowWithoutLayers,

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Nothing to do: {what}")]
    Empty { what: String },

    #[error("Malformed construction set: {0}")]
    Malformed(String),
}
