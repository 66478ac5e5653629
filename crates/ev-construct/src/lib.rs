//! ev-construct: construction injection and variant expansion.
//!
//! - injector: apply a [`ConstructionSet`](ev_core::ConstructionSet) to a document
//! - repair: duplicate renaming, dangling-reference repair, pruning
//! - expand: candidate groups to variant sets
//! - catalogue: named construction lookup

pub mod catalogue;
pub mod error;
pub mod expand;
pub mod injector;
pub mod repair;

pub use catalogue::{ConstructionCatalogue, YamlCatalogue, resolve_candidates};
pub use error::{CatalogueError, ExpandError, InjectError, Warning};
pub use expand::{
    CandidateGroups, CatalogueRow, ExpandMode, expand, expand_limited, expected_variant_count,
};
pub use injector::{ChangeReport, Injector, inject_construction_set, qualifying_element};
