//! ev-core: shared foundation for envariant.
//!
//! Contains:
//! - element (envelope element types)
//! - construction_set (the request unit consumed by the injector)
//! - ids (batch identifiers)
//! - batch (batch run lifecycle)
//! - error (validation errors shared by every layer)

pub mod batch;
pub mod construction_set;
pub mod element;
pub mod error;
pub mod ids;

pub use batch::{BatchRun, BatchStatus, TransitionError};
pub use construction_set::{ConstructionSet, ConstructionSpec, RESERVED_CHARS, SimpleGlazing};
pub use element::ElementType;
pub use error::{ValidationError, ValidationResult};
pub use ids::BatchId;
