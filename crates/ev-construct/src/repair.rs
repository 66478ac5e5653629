//! Duplicate removal, dangling-reference repair and pruning.
//!
//! Reference repair is a heuristic safety net: a reference that no longer
//! resolves is matched to the closest existing construction name.

use std::collections::{BTreeSet, HashSet};

use ev_idf::schema::{CONSTRUCTION, CONSTRUCTION_NAME_FIELD};
use ev_idf::{ClassKind, Document, MANAGED_PREFIX, NameRegistry, SurfaceView};

use crate::error::Warning;

/// How a replacement was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Normalized names are identical.
    Normalized,
    /// Highest shared-token count.
    Tokens(usize),
}

/// Whether `class` holds constructions (plain or specialised).
pub fn is_construction_class(class: &str) -> bool {
    let lower = class.to_ascii_lowercase();
    lower == "construction" || lower.starts_with("construction:")
}

/// Names of everything a construction reference may resolve to.
pub fn construction_names(doc: &Document) -> Vec<String> {
    doc.objects()
        .iter()
        .filter(|o| is_construction_class(o.class()))
        .filter_map(|o| o.name().map(str::to_string))
        .collect()
}

/// Strip managed prefixes and dedup/variant suffixes, then lowercase.
pub fn normalize(name: &str) -> String {
    let mut current = name.trim();
    loop {
        let before = current;
        if NameRegistry::is_managed(current) {
            current = &current[MANAGED_PREFIX.len()..];
        }
        current = strip_numbered_suffix(current, "_dup");
        current = strip_numbered_suffix(current, "_v");
        if current == before {
            break;
        }
    }
    current.to_ascii_lowercase()
}

fn strip_numbered_suffix<'a>(name: &'a str, marker: &str) -> &'a str {
    let lower = name.to_ascii_lowercase();
    match lower.rfind(marker) {
        Some(at) => {
            let digits = &name[at + marker.len()..];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) && at > 0 {
                &name[..at]
            } else {
                name
            }
        }
        None => name,
    }
}

/// Alphanumeric tokens of a normalized name.
pub fn tokens(name: &str) -> BTreeSet<String> {
    normalize(name)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Best replacement for `target` among `candidates`.
///
/// Exact normalized match first, else the highest shared-token count.
/// Ties go to the lexically smallest normalized candidate, then the
/// smallest raw name, so the result never depends on document order.
pub fn best_match<'a>(target: &str, candidates: &[&'a str]) -> Option<(&'a str, MatchKind)> {
    let wanted = normalize(target);
    let exact = candidates
        .iter()
        .copied()
        .filter(|c| normalize(c) == wanted)
        .min();
    if let Some(found) = exact {
        return Some((found, MatchKind::Normalized));
    }

    let wanted_tokens = tokens(target);
    candidates
        .iter()
        .map(|c| {
            let score = tokens(c).intersection(&wanted_tokens).count();
            (score, normalize(c), *c)
        })
        .filter(|(score, _, _)| *score > 0)
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| b.2.cmp(&a.2))
        })
        .map(|(score, _, name)| (name, MatchKind::Tokens(score)))
}

/// Rename every `Construction` sharing a name with an earlier one.
pub fn dedupe_constructions(doc: &mut Document, registry: &mut NameRegistry) -> Vec<Warning> {
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();
    for obj in doc.of_kind_mut(ClassKind::Construction) {
        let Some(name) = obj.name().map(str::to_string) else {
            continue;
        };
        if seen.insert(name.to_ascii_uppercase()) {
            continue;
        }
        let renamed = registry.reserve(&name);
        seen.insert(renamed.to_ascii_uppercase());
        obj.set_name(renamed.clone());
        tracing::warn!(from = %name, to = %renamed, "renamed duplicate construction");
        warnings.push(Warning::RenamedDuplicate {
            from: name,
            to: renamed,
        });
    }
    warnings
}

/// Point dangling construction references at the closest existing name.
pub fn repair_references(doc: &mut Document) -> Vec<Warning> {
    let names = construction_names(doc);
    let known: HashSet<String> = names.iter().map(|n| n.to_ascii_uppercase()).collect();
    let candidates: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut plan = Vec::new();
    for (index, obj) in doc.objects().iter().enumerate() {
        let Some(view) = SurfaceView::new(obj) else {
            continue;
        };
        let current = view.construction_name();
        if current.is_empty() || known.contains(&current.to_ascii_uppercase()) {
            continue;
        }
        let object = view.name().to_string();
        match best_match(current, &candidates) {
            Some((to, kind)) => plan.push((
                index,
                Warning::RemappedReference {
                    object,
                    from: current.to_string(),
                    to: to.to_string(),
                    exact: kind == MatchKind::Normalized,
                },
            )),
            None => plan.push((
                index,
                Warning::UnresolvedReference {
                    object,
                    construction: current.to_string(),
                },
            )),
        }
    }

    let mut warnings = Vec::with_capacity(plan.len());
    for (index, warning) in plan {
        if let Warning::RemappedReference { to, .. } = &warning {
            if let Some(obj) = doc.object_mut(index) {
                obj.set(CONSTRUCTION_NAME_FIELD, to.clone());
            }
        }
        tracing::warn!(%warning, "construction reference repair");
        warnings.push(warning);
    }
    warnings
}

/// Names of constructions something in the document still points at.
///
/// Known classes are read through their `Construction Name` field; classes
/// outside the schema are scanned field by field, skipping their own name.
pub fn referenced_constructions(doc: &Document) -> HashSet<String> {
    let mut referenced = HashSet::new();
    for obj in doc.objects() {
        if let Some(view) = SurfaceView::new(obj) {
            let name = view.construction_name();
            if !name.is_empty() {
                referenced.insert(name.to_ascii_uppercase());
            }
        } else if obj.schema().is_none() {
            for value in obj.fields().iter().skip(1).chain(obj.extra()) {
                if !value.is_empty() {
                    referenced.insert(value.to_ascii_uppercase());
                }
            }
        }
    }
    referenced
}

/// Remove every `Construction` nothing references; returns their names.
pub fn prune_unreferenced(doc: &mut Document) -> Vec<String> {
    let referenced = referenced_constructions(doc);
    let mut pruned = Vec::new();
    doc.remove_where(|o| {
        if !o.is_class(CONSTRUCTION) {
            return false;
        }
        let Some(name) = o.name() else {
            return false;
        };
        if referenced.contains(&name.to_ascii_uppercase()) {
            false
        } else {
            pruned.push(name.to_string());
            true
        }
    });
    if !pruned.is_empty() {
        tracing::debug!(count = pruned.len(), "pruned unreferenced constructions");
    }
    pruned
}
