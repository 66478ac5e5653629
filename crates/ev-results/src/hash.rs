//! Content-based hashing for variant keys and batch fingerprints.

use ev_core::ConstructionSet;
use sha2::{Digest, Sha256};

/// Stable key of one (document, construction set) pair.
pub fn compute_variant_key(idf_idx: usize, set: &ConstructionSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update((idf_idx as u64).to_le_bytes());

    let set_json = serde_json::to_string(set).unwrap_or_default();
    hasher.update(set_json.as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a whole batch: every document text, every set, and the
/// engine invocation, so identical inputs always hash the same.
pub fn compute_batch_fingerprint<S: AsRef<str>>(
    documents: &[S],
    sets: &[ConstructionSet],
    engine: &str,
) -> String {
    let mut hasher = Sha256::new();

    for doc in documents {
        hasher.update((doc.as_ref().len() as u64).to_le_bytes());
        hasher.update(doc.as_ref().as_bytes());
    }

    let sets_json = serde_json::to_string(sets).unwrap_or_default();
    hasher.update(sets_json.as_bytes());

    hasher.update(engine.as_bytes());

    format!("{:x}", hasher.finalize())
}
