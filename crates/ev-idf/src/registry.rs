//! Collision-free name reservation within one document namespace.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::document::Document;

/// Prefix marking names owned by the injector.
pub const MANAGED_PREFIX: &str = "EV_";

/// Tracks every name in use and hands out fresh ones.
///
/// Names compare case-insensitively. Given the same seed, seed document
/// and call order, the returned names are always the same.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
    seed: String,
    anonymous: u64,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with every object name in `doc`.
    pub fn from_document(doc: &Document) -> Self {
        let mut registry = Self::new();
        for name in doc.names() {
            registry.mark_used(name);
        }
        registry
    }

    /// Seed for tokens synthesized when an empty name is requested.
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }

    /// The managed form of `name` (prefix added once).
    pub fn namespaced(name: &str) -> String {
        let name = name.trim();
        if Self::is_managed(name) {
            name.to_string()
        } else {
            format!("{MANAGED_PREFIX}{name}")
        }
    }

    pub fn is_managed(name: &str) -> bool {
        name.len() >= MANAGED_PREFIX.len()
            && name.is_char_boundary(MANAGED_PREFIX.len())
            && name[..MANAGED_PREFIX.len()].eq_ignore_ascii_case(MANAGED_PREFIX)
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(&key(name))
    }

    pub fn mark_used(&mut self, name: &str) {
        self.used.insert(key(name));
    }

    /// Reserve a managed name derived from `requested`.
    ///
    /// An empty request gets a synthesized token. A taken name gets
    /// `_dup1`, `_dup2`, ... appended until one is free.
    pub fn reserve(&mut self, requested: &str) -> String {
        let base = if requested.trim().is_empty() {
            self.synthesize()
        } else {
            requested.trim().to_string()
        };
        let candidate = Self::namespaced(&base);

        let mut name = candidate.clone();
        let mut n = 0u64;
        while self.is_used(&name) {
            n += 1;
            name = format!("{candidate}_dup{n}");
        }
        self.mark_used(&name);
        name
    }

    fn synthesize(&mut self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        hasher.update(self.anonymous.to_le_bytes());
        self.anonymous += 1;
        let digest = hasher.finalize();
        let hex: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
        format!("anon_{hex}")
    }
}

fn key(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_name_gets_prefix_only() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.reserve("W2"), "EV_W2");
    }

    #[test]
    fn prefix_is_not_doubled() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.reserve("ev_W2"), "ev_W2");
    }

    #[test]
    fn duplicates_get_increasing_suffix() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.reserve("W"), "EV_W");
        assert_eq!(registry.reserve("W"), "EV_W_dup1");
        assert_eq!(registry.reserve("w"), "EV_w_dup2");
    }

    #[test]
    fn document_names_are_never_returned() {
        let doc = Document::load("Construction,EV_Wall,Brick;\nConstruction,EV_Wall_dup1,Brick;")
            .unwrap();
        let mut registry = NameRegistry::from_document(&doc);
        assert_eq!(registry.reserve("Wall"), "EV_Wall_dup2");
    }

    #[test]
    fn empty_request_is_synthesized_deterministically() {
        let mut a = NameRegistry::new().with_seed("batch-1");
        let mut b = NameRegistry::new().with_seed("batch-1");
        let first = a.reserve("");
        assert!(first.starts_with("EV_anon_"));
        assert_eq!(first, b.reserve("  "));
        assert_ne!(first, a.reserve(""));
    }

    #[test]
    fn is_managed_handles_short_and_multibyte_names() {
        assert!(!NameRegistry::is_managed("E"));
        assert!(!NameRegistry::is_managed("É_x"));
        assert!(NameRegistry::is_managed("EV_x"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn reserved_names_are_pairwise_distinct(
            requests in prop::collection::vec(prop::sample::select(vec!["", "A", "a", "B", "EV_A", "A_dup1", "EV_A_dup1"]), 1..40)
        ) {
            let doc = Document::load("Construction,EV_A,X;\nMaterial,B,Rough,0.1,1,1,1;").unwrap();
            let existing: Vec<String> = doc.names().map(|n| n.to_ascii_uppercase()).collect();
            let mut registry = NameRegistry::from_document(&doc);
            let mut seen = HashSet::new();
            for requested in &requests {
                let name = registry.reserve(requested);
                prop_assert!(seen.insert(name.to_ascii_uppercase()), "duplicate name {}", name);
                prop_assert!(!existing.contains(&name.to_ascii_uppercase()));
            }
        }
    }
}
