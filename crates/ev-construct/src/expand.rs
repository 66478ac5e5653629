//! Scenario expansion: candidate constructions to concrete variants.

use std::collections::BTreeMap;

use ev_core::{ConstructionSet, ConstructionSpec, ElementType, SimpleGlazing, ValidationResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::ExpandError;

/// How candidates combine into variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandMode {
    /// Every combination of "unchanged or one candidate" per element.
    #[default]
    Combinatorial,
    /// One single-element variant per candidate.
    PerConstruction,
}

/// One catalogue row: a candidate construction for one element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogueRow {
    pub element_type: ElementType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_glazing: Option<SimpleGlazing>,
}

impl CatalogueRow {
    pub fn spec(&self) -> ConstructionSpec {
        ConstructionSpec {
            name: self.name.clone(),
            layers: self.layers.clone(),
            simple_glazing: self.simple_glazing,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        self.spec().validate(self.element_type)
    }
}

/// Candidates grouped by element type, row order preserved per group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateGroups(BTreeMap<ElementType, Vec<ConstructionSpec>>);

impl CandidateGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a CatalogueRow>) -> Self {
        let mut groups = Self::new();
        for row in rows {
            groups.push(row.element_type, row.spec());
        }
        groups
    }

    pub fn push(&mut self, element: ElementType, spec: ConstructionSpec) {
        self.0.entry(element).or_default().push(spec);
    }

    pub fn get(&self, element: ElementType) -> &[ConstructionSpec] {
        self.0.get(&element).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementType, &[ConstructionSpec])> {
        self.0.iter().map(|(e, specs)| (*e, specs.as_slice()))
    }

    /// Total number of candidate rows across all groups.
    pub fn total_rows(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }
}

/// Expand candidate groups into construction sets.
///
/// Combinatorial yields `prod(1 + n_i) - 1` sets: each element is either
/// left alone or given one candidate, and the all-unchanged combination
/// is dropped. Element order is canonical, so output order is stable.
pub fn expand(groups: &CandidateGroups, mode: ExpandMode) -> Vec<ConstructionSet> {
    match mode {
        ExpandMode::PerConstruction => groups
            .iter()
            .flat_map(|(element, specs)| {
                specs
                    .iter()
                    .map(move |spec| ConstructionSet::new().with(element, spec.clone()))
            })
            .collect(),
        ExpandMode::Combinatorial => {
            let axes: Vec<Vec<Option<(ElementType, &ConstructionSpec)>>> = groups
                .iter()
                .filter(|(_, specs)| !specs.is_empty())
                .map(|(element, specs)| {
                    std::iter::once(None)
                        .chain(specs.iter().map(|spec| Some((element, spec))))
                        .collect()
                })
                .collect();
            if axes.is_empty() {
                return Vec::new();
            }
            axes.into_iter()
                .multi_cartesian_product()
                .filter_map(|choice| {
                    let set: ConstructionSet = choice
                        .into_iter()
                        .flatten()
                        .map(|(element, spec)| (element, spec.clone()))
                        .collect();
                    (!set.is_empty()).then_some(set)
                })
                .collect()
        }
    }
}

/// Number of sets [`expand`] would produce, saturating on overflow.
pub fn expected_variant_count(groups: &CandidateGroups, mode: ExpandMode) -> usize {
    match mode {
        ExpandMode::PerConstruction => groups.total_rows(),
        ExpandMode::Combinatorial => {
            let (product, any) = groups
                .iter()
                .filter(|(_, specs)| !specs.is_empty())
                .fold((1usize, false), |(acc, _), (_, specs)| {
                    (acc.saturating_mul(specs.len() + 1), true)
                });
            if any { product.saturating_sub(1) } else { 0 }
        }
    }
}

/// [`expand`], refusing to materialize more than `limit` sets.
pub fn expand_limited(
    groups: &CandidateGroups,
    mode: ExpandMode,
    limit: usize,
) -> Result<Vec<ConstructionSet>, ExpandError> {
    let count = expected_variant_count(groups, mode);
    if count > limit {
        tracing::warn!(count, limit, "variant expansion over limit");
        return Err(ExpandError::TooManyVariants { count, limit });
    }
    let sets = expand(groups, mode);
    tracing::debug!(variants = sets.len(), ?mode, "expanded candidates");
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(walls: usize, roofs: usize, windows: usize) -> CandidateGroups {
        let mut groups = CandidateGroups::new();
        for i in 0..walls {
            groups.push(ElementType::Wall, ConstructionSpec::layered(format!("W{i}"), &["Brick"]));
        }
        for i in 0..roofs {
            groups.push(ElementType::Roof, ConstructionSpec::layered(format!("R{i}"), &["Deck"]));
        }
        for i in 0..windows {
            groups.push(
                ElementType::Window,
                ConstructionSpec::glazing(format!("G{i}"), SimpleGlazing { u: 1.5, shgc: 0.4, tvis: 0.6 }),
            );
        }
        groups
    }

    #[test]
    fn combinatorial_count_drops_all_unchanged() {
        let g = groups(2, 1, 1);
        let sets = expand(&g, ExpandMode::Combinatorial);
        assert_eq!(sets.len(), 11);
        assert_eq!(expected_variant_count(&g, ExpandMode::Combinatorial), 11);
        assert!(sets.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn combinatorial_sets_are_distinct() {
        let sets = expand(&groups(2, 1, 1), ExpandMode::Combinatorial);
        let labels: std::collections::HashSet<_> = sets.iter().map(ConstructionSet::label).collect();
        assert_eq!(labels.len(), sets.len());
    }

    #[test]
    fn per_construction_is_one_set_per_row() {
        let g = groups(2, 1, 2);
        let sets = expand(&g, ExpandMode::PerConstruction);
        assert_eq!(sets.len(), 5);
        let labels: Vec<_> = sets.iter().map(ConstructionSet::label).collect();
        assert_eq!(labels, ["wall=W0", "wall=W1", "roof=R0", "window=G0", "window=G1"]);
    }

    #[test]
    fn empty_groups_expand_to_nothing() {
        let g = CandidateGroups::new();
        assert!(expand(&g, ExpandMode::Combinatorial).is_empty());
        assert_eq!(expected_variant_count(&g, ExpandMode::Combinatorial), 0);
    }

    #[test]
    fn limit_is_enforced_before_expanding() {
        let err = expand_limited(&groups(3, 3, 3), ExpandMode::Combinatorial, 50).unwrap_err();
        assert!(matches!(err, ExpandError::TooManyVariants { count: 63, limit: 50 }));
    }

    #[test]
    fn rows_group_by_element_in_order() {
        let rows: Vec<CatalogueRow> = serde_yaml::from_str(
            "- {element_type: window, name: G1, simple_glazing: {u: 1.2, shgc: 0.3, tvis: 0.5}}\n\
             - {element_type: wall, name: W2, layers: [Brick, Insulation]}\n\
             - {element_type: wall, name: W1, layers: [Brick]}\n",
        )
        .unwrap();
        let g = CandidateGroups::from_rows(&rows);
        let names: Vec<_> = g.get(ElementType::Wall).iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["W2", "W1"]);
        assert_eq!(g.total_rows(), 3);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn combinatorial_count_matches_formula(counts in prop::collection::vec(0usize..4, 4)) {
            let mut g = CandidateGroups::new();
            for (element, n) in ElementType::ALL.iter().zip(&counts) {
                for i in 0..*n {
                    g.push(*element, ConstructionSpec::layered(format!("{element}{i}"), &["L"]));
                }
            }
            let expected = counts.iter().map(|n| n + 1).product::<usize>() - 1;
            prop_assert_eq!(expand(&g, ExpandMode::Combinatorial).len(), expected);
            prop_assert_eq!(expand(&g, ExpandMode::PerConstruction).len(), counts.iter().sum::<usize>());
        }
    }
}
