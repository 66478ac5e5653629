//! Error and warning types for construction handling.

use std::fmt;
use std::path::PathBuf;

use ev_core::{ElementType, ValidationError};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum InjectError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Window construction '{construction}' references missing window layers: {}", .missing.join(", "))]
    MissingWindowLayers {
        construction: String,
        missing: Vec<String>,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ExpandError {
    #[error("Expansion would produce {count} variants, above the limit of {limit}")]
    TooManyVariants { count: usize, limit: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogueError {
    #[error("Failed to read catalogue {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Non-fatal finding reported alongside a successful injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A layer was missing and got placeholder physical properties.
    DefaultedMaterial { material: String },
    /// Both layers and simple glazing were given; the glazing won.
    GlazingOverridesLayers { construction: String },
    /// No surface qualified for the requested element.
    NoQualifyingSurfaces { element: ElementType, construction: String },
    /// A dangling reference was pointed at a similarly named construction.
    RemappedReference {
        object: String,
        from: String,
        to: String,
        exact: bool,
    },
    /// A dangling reference had no plausible replacement.
    UnresolvedReference { object: String, construction: String },
    /// A second construction with an existing name was renamed.
    RenamedDuplicate { from: String, to: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DefaultedMaterial { material } => {
                write!(f, "material '{}' created with default properties", material)
            }
            Warning::GlazingOverridesLayers { construction } => write!(
                f,
                "window '{}' has both layers and simple glazing; using simple glazing",
                construction
            ),
            Warning::NoQualifyingSurfaces {
                element,
                construction,
            } => write!(
                f,
                "no surface qualified for {} construction '{}'",
                element, construction
            ),
            Warning::RemappedReference {
                object,
                from,
                to,
                exact,
            } => write!(
                f,
                "'{}' referenced missing construction '{}', remapped to '{}' ({} match)",
                object,
                from,
                to,
                if *exact { "normalized" } else { "token" }
            ),
            Warning::UnresolvedReference {
                object,
                construction,
            } => write!(
                f,
                "'{}' references missing construction '{}' with no replacement",
                object, construction
            ),
            Warning::RenamedDuplicate { from, to } => {
                write!(f, "duplicate construction '{}' renamed to '{}'", from, to)
            }
        }
    }
}
