//! Named construction catalogues.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use ev_core::{ConstructionSpec, ElementType, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;
use crate::expand::{CandidateGroups, CatalogueRow};

/// Source of construction definitions looked up by element and name.
pub trait ConstructionCatalogue {
    fn lookup(&self, element: ElementType, name: &str) -> Option<ConstructionSpec>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogueFile {
    #[serde(default)]
    constructions: Vec<CatalogueRow>,
}

/// Catalogue loaded from a YAML file:
///
/// ```yaml
/// constructions:
///   - element_type: wall
///     name: W2
///     layers: [Brick, Insulation, Gypsum]
///   - element_type: window
///     name: G1
///     simple_glazing: { u: 1.4, shgc: 0.4, tvis: 0.6 }
/// ```
#[derive(Debug, Clone, Default)]
pub struct YamlCatalogue {
    rows: Vec<CatalogueRow>,
}

impl YamlCatalogue {
    pub fn from_rows(rows: Vec<CatalogueRow>) -> Result<Self, CatalogueError> {
        let mut seen = HashSet::new();
        for row in &rows {
            row.validate()?;
            if !seen.insert((row.element_type, row.name.to_ascii_uppercase())) {
                return Err(ValidationError::Malformed(format!(
                    "catalogue lists {} construction '{}' more than once",
                    row.element_type, row.name
                ))
                .into());
            }
        }
        Ok(Self { rows })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogueError> {
        let file: CatalogueFile = serde_yaml::from_str(text)?;
        Self::from_rows(file.constructions)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalogue = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), rows = catalogue.rows.len(), "loaded catalogue");
        Ok(catalogue)
    }

    pub fn rows(&self) -> &[CatalogueRow] {
        &self.rows
    }

    /// Every row as candidates, for scenarios that want the whole catalogue.
    pub fn all_candidates(&self) -> CandidateGroups {
        CandidateGroups::from_rows(&self.rows)
    }
}

impl ConstructionCatalogue for YamlCatalogue {
    fn lookup(&self, element: ElementType, name: &str) -> Option<ConstructionSpec> {
        self.rows
            .iter()
            .find(|r| r.element_type == element && r.name.eq_ignore_ascii_case(name))
            .map(CatalogueRow::spec)
    }
}

/// Resolve candidate names against a catalogue, keeping request order.
pub fn resolve_candidates(
    catalogue: &dyn ConstructionCatalogue,
    names: &BTreeMap<ElementType, Vec<String>>,
) -> Result<CandidateGroups, ValidationError> {
    let mut groups = CandidateGroups::new();
    for (element, wanted) in names {
        for name in wanted {
            let spec = catalogue
                .lookup(*element, name)
                .ok_or_else(|| ValidationError::MissingReference {
                    id: name.clone(),
                    context: format!("{element} candidates"),
                })?;
            groups.push(*element, spec);
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOGUE: &str = "\
constructions:
  - element_type: wall
    name: W2
    layers: [Brick, Insulation]
  - element_type: window
    name: G1
    simple_glazing: { u: 1.4, shgc: 0.4, tvis: 0.6 }
";

    #[test]
    fn lookup_is_case_insensitive() {
        let catalogue = YamlCatalogue::from_yaml_str(CATALOGUE).unwrap();
        let spec = catalogue.lookup(ElementType::Wall, "w2").unwrap();
        assert_eq!(spec.layers, vec!["Brick", "Insulation"]);
        assert!(catalogue.lookup(ElementType::Roof, "W2").is_none());
    }

    #[test]
    fn resolve_reports_unknown_names() {
        let catalogue = YamlCatalogue::from_yaml_str(CATALOGUE).unwrap();
        let mut names = BTreeMap::new();
        names.insert(ElementType::Wall, vec!["W2".to_string(), "W9".to_string()]);
        let err = resolve_candidates(&catalogue, &names).unwrap_err();
        assert!(matches!(err, ValidationError::MissingReference { ref id, .. } if id == "W9"));
    }

    #[test]
    fn invalid_rows_are_rejected() {
        let text = "constructions:\n  - {element_type: roof, name: R, simple_glazing: {u: 1, shgc: 0.5, tvis: 0.5}}\n";
        assert!(matches!(
            YamlCatalogue::from_yaml_str(text),
            Err(CatalogueError::Validation(ValidationError::GlazingOnOpaque { .. }))
        ));
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let text = "constructions:\n  - {element_type: wall, name: W, layers: [A]}\n  - {element_type: wall, name: w, layers: [B]}\n";
        assert!(YamlCatalogue::from_yaml_str(text).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.yaml");
        std::fs::write(&path, CATALOGUE).unwrap();
        let catalogue = YamlCatalogue::load(&path).unwrap();
        assert_eq!(catalogue.all_candidates().total_rows(), 2);
    }
}
