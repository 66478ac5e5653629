use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Envelope element a construction can be assigned to.
///
/// The derived ordering is the canonical iteration order used everywhere
/// (wall, roof, floor, window), so expansions and reports are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Wall,
    Roof,
    Floor,
    Window,
}

impl ElementType {
    pub const ALL: [ElementType; 4] = [
        ElementType::Wall,
        ElementType::Roof,
        ElementType::Floor,
        ElementType::Window,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Wall => "wall",
            ElementType::Roof => "roof",
            ElementType::Floor => "floor",
            ElementType::Window => "window",
        }
    }

    /// Opaque elements are built from `Material` layers.
    pub fn is_opaque(self) -> bool {
        !matches!(self, ElementType::Window)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wall" => Ok(ElementType::Wall),
            "roof" => Ok(ElementType::Roof),
            "floor" => Ok(ElementType::Floor),
            "window" => Ok(ElementType::Window),
            other => Err(ValidationError::UnknownElementType {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Wall".parse::<ElementType>().unwrap(), ElementType::Wall);
        assert_eq!(" WINDOW ".parse::<ElementType>().unwrap(), ElementType::Window);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = "door".parse::<ElementType>().unwrap_err();
        assert!(matches!(err, ValidationError::UnknownElementType { .. }));
    }

    #[test]
    fn canonical_order() {
        let mut types = vec![ElementType::Window, ElementType::Floor, ElementType::Wall, ElementType::Roof];
        types.sort();
        assert_eq!(types, ElementType::ALL.to_vec());
    }
}
