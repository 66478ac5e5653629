//! Construction-set requests: what to put on which envelope element.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::ElementType;
use crate::error::{ValidationError, ValidationResult};

/// Characters that end a field, an object or a line in document text.
pub const RESERVED_CHARS: [char; 5] = [',', ';', '!', '\n', '\r'];

fn has_reserved(value: &str) -> bool {
    value.contains(RESERVED_CHARS)
}

/// Simplified single-layer window description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimpleGlazing {
    /// U-factor in W/m2-K.
    pub u: f64,
    /// Solar heat gain coefficient.
    pub shgc: f64,
    /// Visible transmittance.
    pub tvis: f64,
}

impl SimpleGlazing {
    pub fn validate(&self) -> ValidationResult<()> {
        check_glazing_value("simple_glazing.u", self.u, |v| v > 0.0, "must be positive and finite")?;
        check_glazing_value(
            "simple_glazing.shgc",
            self.shgc,
            |v| v > 0.0 && v < 1.0,
            "must lie strictly between 0 and 1",
        )?;
        check_glazing_value(
            "simple_glazing.tvis",
            self.tvis,
            |v| v > 0.0 && v < 1.0,
            "must lie strictly between 0 and 1",
        )
    }
}

fn check_glazing_value(
    field: &str,
    value: f64,
    ok: impl Fn(f64) -> bool,
    reason: &str,
) -> ValidationResult<()> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// One requested construction: a name plus either ordered layers or,
/// for windows only, a simple glazing spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstructionSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_glazing: Option<SimpleGlazing>,
}

impl ConstructionSpec {
    pub fn layered<S: Into<String>>(name: S, layers: &[&str]) -> Self {
        Self {
            name: name.into(),
            layers: layers.iter().map(|l| l.to_string()).collect(),
            simple_glazing: None,
        }
    }

    pub fn glazing<S: Into<String>>(name: S, glazing: SimpleGlazing) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
            simple_glazing: Some(glazing),
        }
    }

    pub fn validate(&self, element: ElementType) -> ValidationResult<()> {
        if has_reserved(&self.name) {
            return Err(ValidationError::ReservedCharacter {
                element,
                field: "name".to_string(),
                value: self.name.clone(),
            });
        }
        if let Some((index, layer)) = self.layers.iter().enumerate().find(|(_, l)| has_reserved(l)) {
            return Err(ValidationError::ReservedCharacter {
                element,
                field: format!("layer {}", index + 1),
                value: layer.clone(),
            });
        }
        if let Some(index) = self.layers.iter().position(|l| l.trim().is_empty()) {
            return Err(ValidationError::BlankLayerName { element, index });
        }

        match (element.is_opaque(), &self.simple_glazing) {
            (true, Some(_)) => Err(ValidationError::GlazingOnOpaque { element }),
            (true, None) if self.layers.is_empty() => Err(ValidationError::EmptyLayers { element }),
            (true, None) => Ok(()),
            (false, Some(glazing)) => glazing.validate(),
            (false, None) if self.layers.is_empty() => Err(ValidationError::WindowWithoutLayers),
            (false, None) => Ok(()),
        }
    }
}

/// Mapping from element type to the construction requested for it.
///
/// Keyed by [`ElementType`], so there is at most one entry per element and
/// iteration follows the canonical element order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, ConstructionSpec>")]
pub struct ConstructionSet(BTreeMap<ElementType, ConstructionSpec>);

impl ConstructionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, element: ElementType, spec: ConstructionSpec) -> Self {
        self.0.insert(element, spec);
        self
    }

    pub fn insert(&mut self, element: ElementType, spec: ConstructionSpec) -> Option<ConstructionSpec> {
        self.0.insert(element, spec)
    }

    pub fn get(&self, element: ElementType) -> Option<&ConstructionSpec> {
        self.0.get(&element)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementType, &ConstructionSpec)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn element_types(&self) -> impl Iterator<Item = ElementType> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check every entry; the whole set is rejected on the first problem.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.0.is_empty() {
            return Err(ValidationError::Empty {
                what: "construction set has no entries".to_string(),
            });
        }
        for (element, spec) in &self.0 {
            spec.validate(*element)?;
        }
        Ok(())
    }

    /// Short human-readable label, e.g. `wall=W2+window=G1`.
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|(element, spec)| format!("{}={}", element, spec.name))
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Parse from JSON, reporting unknown element keys as validation errors.
    pub fn from_json_str(text: &str) -> ValidationResult<Self> {
        let raw: BTreeMap<String, ConstructionSpec> =
            serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::try_from(raw)
    }
}

impl TryFrom<BTreeMap<String, ConstructionSpec>> for ConstructionSet {
    type Error = ValidationError;

    fn try_from(raw: BTreeMap<String, ConstructionSpec>) -> Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for (key, spec) in raw {
            let element: ElementType = key.parse()?;
            if entries.insert(element, spec).is_some() {
                return Err(ValidationError::Malformed(format!(
                    "element type '{}' given more than once",
                    element
                )));
            }
        }
        Ok(Self(entries))
    }
}

impl FromIterator<(ElementType, ConstructionSpec)> for ConstructionSet {
    fn from_iter<T: IntoIterator<Item = (ElementType, ConstructionSpec)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_layers_and_glazing() {
        let set = ConstructionSet::from_json_str(
            r#"{
                "wall": {"name": "W2", "layers": ["Brick", "Insulation"]},
                "window": {"name": "G1", "simple_glazing": {"u": 1.8, "shgc": 0.6, "tvis": 0.7}}
            }"#,
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get(ElementType::Wall).unwrap().layers, vec!["Brick", "Insulation"]);
        assert!(set.get(ElementType::Window).unwrap().simple_glazing.is_some());
        set.validate().unwrap();
        assert_eq!(set.label(), "wall=W2+window=G1");
    }

    #[test]
    fn unknown_element_key_is_a_validation_error() {
        let err = ConstructionSet::from_json_str(r#"{"door": {"name": "D", "layers": ["Oak"]}}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownElementType {
                name: "door".to_string()
            }
        );
    }

    #[test]
    fn case_variants_of_one_key_collide() {
        let err = ConstructionSet::from_json_str(
            r#"{"wall": {"name": "A", "layers": ["x"]}, "WALL": {"name": "B", "layers": ["y"]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn unknown_spec_field_is_malformed() {
        let err = ConstructionSet::from_json_str(r#"{"wall": {"name": "W", "layerz": []}}"#)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn opaque_needs_layers() {
        let set = ConstructionSet::new().with(ElementType::Roof, ConstructionSpec::layered("R", &[]));
        assert_eq!(
            set.validate().unwrap_err(),
            ValidationError::EmptyLayers {
                element: ElementType::Roof
            }
        );
    }

    #[test]
    fn glazing_rejected_on_opaque() {
        let glazing = SimpleGlazing {
            u: 1.0,
            shgc: 0.5,
            tvis: 0.5,
        };
        let set = ConstructionSet::new().with(ElementType::Wall, ConstructionSpec::glazing("W", glazing));
        assert!(matches!(
            set.validate(),
            Err(ValidationError::GlazingOnOpaque { .. })
        ));
    }

    #[test]
    fn glazing_values_are_bounded() {
        let glazing = SimpleGlazing {
            u: 1.0,
            shgc: 1.5,
            tvis: 0.5,
        };
        let set = ConstructionSet::new().with(ElementType::Window, ConstructionSpec::glazing("G", glazing));
        assert!(matches!(set.validate(), Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn window_needs_layers_or_glazing() {
        let set = ConstructionSet::new().with(ElementType::Window, ConstructionSpec::layered("G", &[]));
        assert_eq!(set.validate().unwrap_err(), ValidationError::WindowWithoutLayers);
    }

    #[test]
    fn blank_layer_is_rejected() {
        let set = ConstructionSet::new().with(ElementType::Floor, ConstructionSpec::layered("F", &["Slab", " "]));
        assert_eq!(
            set.validate().unwrap_err(),
            ValidationError::BlankLayerName {
                element: ElementType::Floor,
                index: 1
            }
        );
    }

    #[test]
    fn delimiters_in_names_are_rejected() {
        let set = ConstructionSet::new().with(ElementType::Wall, ConstructionSpec::layered("Brick, 200mm", &["Brick"]));
        assert!(matches!(
            set.validate(),
            Err(ValidationError::ReservedCharacter { ref field, .. }) if field == "name"
        ));

        for layer in ["Gypsum; Board", "Oak!", "Line\nBreak"] {
            let set = ConstructionSet::new().with(ElementType::Roof, ConstructionSpec::layered("R", &["Deck", layer]));
            assert_eq!(
                set.validate().unwrap_err(),
                ValidationError::ReservedCharacter {
                    element: ElementType::Roof,
                    field: "layer 2".to_string(),
                    value: layer.to_string(),
                }
            );
        }
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(
            ConstructionSet::new().validate(),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn serializes_with_lowercase_keys() {
        let set = ConstructionSet::new().with(ElementType::Wall, ConstructionSpec::layered("W", &["A"]));
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"wall":{"name":"W","layers":["A"]}}"#);
        let back: ConstructionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
