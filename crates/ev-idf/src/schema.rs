//! Static object-class table.
//!
//! The table is the only process-wide state in the document layer. It is
//! read-only and built at compile time.

/// Role a class plays for construction handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    OpaqueMaterial,
    WindowMaterial,
    Construction,
    Surface,
    Fenestration,
    /// Other objects that reference a construction by name.
    ConstructionUser,
    Zone,
    Other,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub default: Option<&'static str>,
}

/// Repeating tail of a class (construction layers, surface vertices).
#[derive(Debug, Clone, Copy)]
pub struct Extensible {
    /// Index of the first repeating field.
    pub start: usize,
    /// Labels of one repeating group; `{}` is replaced by the group number.
    pub group: &'static [&'static str],
    /// Number assigned to the first group.
    pub first_number: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassSchema {
    pub name: &'static str,
    pub kind: ClassKind,
    /// Whether field 0 is the object name.
    pub named: bool,
    pub fields: &'static [FieldDef],
    pub extensible: Option<Extensible>,
}

const fn f(name: &'static str) -> FieldDef {
    FieldDef { name, default: None }
}

const fn d(name: &'static str, default: &'static str) -> FieldDef {
    FieldDef {
        name,
        default: Some(default),
    }
}

pub const MATERIAL: &str = "Material";
pub const MATERIAL_NO_MASS: &str = "Material:NoMass";
pub const MATERIAL_AIR_GAP: &str = "Material:AirGap";
pub const SIMPLE_GLAZING: &str = "WindowMaterial:SimpleGlazingSystem";
pub const GLAZING: &str = "WindowMaterial:Glazing";
pub const GAS: &str = "WindowMaterial:Gas";
pub const CONSTRUCTION: &str = "Construction";
pub const BUILDING_SURFACE: &str = "BuildingSurface:Detailed";
pub const FENESTRATION_SURFACE: &str = "FenestrationSurface:Detailed";
pub const WINDOW: &str = "Window";
pub const DOOR: &str = "Door";
pub const INTERNAL_MASS: &str = "InternalMass";
pub const ZONE: &str = "Zone";
pub const VERSION: &str = "Version";

/// Field holding the construction reference on every class that has one.
pub const CONSTRUCTION_NAME_FIELD: &str = "Construction Name";

const VERTEX: &[&str] = &[
    "Vertex {} X-coordinate",
    "Vertex {} Y-coordinate",
    "Vertex {} Z-coordinate",
];

static CLASSES: &[ClassSchema] = &[
    ClassSchema {
        name: VERSION,
        kind: ClassKind::Other,
        named: false,
        fields: &[f("Version Identifier")],
        extensible: None,
    },
    ClassSchema {
        name: MATERIAL,
        kind: ClassKind::OpaqueMaterial,
        named: true,
        fields: &[
            f("Name"),
            d("Roughness", "MediumRough"),
            f("Thickness"),
            f("Conductivity"),
            f("Density"),
            f("Specific Heat"),
            d("Thermal Absorptance", "0.9"),
            d("Solar Absorptance", "0.7"),
            d("Visible Absorptance", "0.7"),
        ],
        extensible: None,
    },
    ClassSchema {
        name: MATERIAL_NO_MASS,
        kind: ClassKind::OpaqueMaterial,
        named: true,
        fields: &[
            f("Name"),
            d("Roughness", "MediumRough"),
            f("Thermal Resistance"),
            d("Thermal Absorptance", "0.9"),
            d("Solar Absorptance", "0.7"),
            d("Visible Absorptance", "0.7"),
        ],
        extensible: None,
    },
    ClassSchema {
        name: MATERIAL_AIR_GAP,
        kind: ClassKind::OpaqueMaterial,
        named: true,
        fields: &[f("Name"), f("Thermal Resistance")],
        extensible: None,
    },
    ClassSchema {
        name: SIMPLE_GLAZING,
        kind: ClassKind::WindowMaterial,
        named: true,
        fields: &[
            f("Name"),
            f("U-Factor"),
            f("Solar Heat Gain Coefficient"),
            f("Visible Transmittance"),
        ],
        extensible: None,
    },
    ClassSchema {
        name: GLAZING,
        kind: ClassKind::WindowMaterial,
        named: true,
        fields: &[
            f("Name"),
            d("Optical Data Type", "SpectralAverage"),
            f("Window Glass Spectral Data Set Name"),
            f("Thickness"),
            f("Solar Transmittance at Normal Incidence"),
            f("Front Side Solar Reflectance at Normal Incidence"),
            f("Back Side Solar Reflectance at Normal Incidence"),
            f("Visible Transmittance at Normal Incidence"),
            f("Front Side Visible Reflectance at Normal Incidence"),
            f("Back Side Visible Reflectance at Normal Incidence"),
            d("Infrared Transmittance at Normal Incidence", "0.0"),
            d("Front Side Infrared Hemispherical Emissivity", "0.84"),
            d("Back Side Infrared Hemispherical Emissivity", "0.84"),
            d("Conductivity", "0.9"),
            d("Dirt Correction Factor for Solar and Visible Transmittance", "1.0"),
            d("Solar Diffusing", "No"),
        ],
        extensible: None,
    },
    ClassSchema {
        name: GAS,
        kind: ClassKind::WindowMaterial,
        named: true,
        fields: &[f("Name"), d("Gas Type", "Air"), f("Thickness")],
        extensible: None,
    },
    ClassSchema {
        name: CONSTRUCTION,
        kind: ClassKind::Construction,
        named: true,
        fields: &[f("Name"), f("Outside Layer")],
        extensible: Some(Extensible {
            start: 2,
            group: &["Layer {}"],
            first_number: 2,
        }),
    },
    ClassSchema {
        name: BUILDING_SURFACE,
        kind: ClassKind::Surface,
        named: true,
        fields: &[
            f("Name"),
            f("Surface Type"),
            f(CONSTRUCTION_NAME_FIELD),
            f("Zone Name"),
            f("Space Name"),
            f("Outside Boundary Condition"),
            f("Outside Boundary Condition Object"),
            d("Sun Exposure", "SunExposed"),
            d("Wind Exposure", "WindExposed"),
            d("View Factor to Ground", "autocalculate"),
            d("Number of Vertices", "autocalculate"),
        ],
        extensible: Some(Extensible {
            start: 11,
            group: VERTEX,
            first_number: 1,
        }),
    },
    ClassSchema {
        name: FENESTRATION_SURFACE,
        kind: ClassKind::Fenestration,
        named: true,
        fields: &[
            f("Name"),
            f("Surface Type"),
            f(CONSTRUCTION_NAME_FIELD),
            f("Building Surface Name"),
            f("Outside Boundary Condition Object"),
            d("View Factor to Ground", "autocalculate"),
            f("Frame and Divider Name"),
            d("Multiplier", "1"),
            d("Number of Vertices", "autocalculate"),
        ],
        extensible: Some(Extensible {
            start: 9,
            group: VERTEX,
            first_number: 1,
        }),
    },
    ClassSchema {
        name: WINDOW,
        kind: ClassKind::Fenestration,
        named: true,
        fields: &[
            f("Name"),
            f(CONSTRUCTION_NAME_FIELD),
            f("Building Surface Name"),
            f("Frame and Divider Name"),
            d("Multiplier", "1"),
            f("Starting X Coordinate"),
            f("Starting Z Coordinate"),
            f("Length"),
            f("Height"),
        ],
        extensible: None,
    },
    ClassSchema {
        name: DOOR,
        kind: ClassKind::ConstructionUser,
        named: true,
        fields: &[
            f("Name"),
            f(CONSTRUCTION_NAME_FIELD),
            f("Building Surface Name"),
            d("Multiplier", "1"),
            f("Starting X Coordinate"),
            f("Starting Z Coordinate"),
            f("Length"),
            f("Height"),
        ],
        extensible: None,
    },
    ClassSchema {
        name: INTERNAL_MASS,
        kind: ClassKind::ConstructionUser,
        named: true,
        fields: &[
            f("Name"),
            f(CONSTRUCTION_NAME_FIELD),
            f("Zone or ZoneList Name"),
            f("Space or SpaceList Name"),
            f("Surface Area"),
        ],
        extensible: None,
    },
    ClassSchema {
        name: ZONE,
        kind: ClassKind::Zone,
        named: true,
        fields: &[
            f("Name"),
            d("Direction of Relative North", "0"),
            d("X Origin", "0"),
            d("Y Origin", "0"),
            d("Z Origin", "0"),
            d("Type", "1"),
            d("Multiplier", "1"),
            d("Ceiling Height", "autocalculate"),
            d("Volume", "autocalculate"),
        ],
        extensible: None,
    },
];

/// Look up a class, ignoring case as the engine does.
pub fn lookup(class: &str) -> Option<&'static ClassSchema> {
    CLASSES.iter().find(|c| c.name.eq_ignore_ascii_case(class))
}

/// All known classes playing the given role.
pub fn classes_of_kind(kind: ClassKind) -> impl Iterator<Item = &'static ClassSchema> {
    CLASSES.iter().filter(move |c| c.kind == kind)
}

impl ClassSchema {
    /// Index of a field by its label, including labels of the repeating tail.
    pub fn field_index(&self, field: &str) -> Option<usize> {
        if let Some(i) = self
            .fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(field))
        {
            return Some(i);
        }
        let ext = self.extensible?;
        (0..ext.group.len()).find_map(|slot| {
            let template = ext.group[slot];
            let (prefix, suffix) = template.split_once("{}")?;
            let lower = field.to_ascii_lowercase();
            let number = lower
                .strip_prefix(&prefix.to_ascii_lowercase())?
                .strip_suffix(&suffix.to_ascii_lowercase())?
                .parse::<usize>()
                .ok()?;
            let group = number.checked_sub(ext.first_number)?;
            Some(ext.start + group * ext.group.len() + slot)
        })
    }

    /// Label of the field at `index`, if the schema defines one.
    pub fn field_label(&self, index: usize) -> Option<String> {
        if let Some(def) = self.fields.get(index) {
            return Some(def.name.to_string());
        }
        let ext = self.extensible?;
        let offset = index.checked_sub(ext.start)?;
        let number = ext.first_number + offset / ext.group.len();
        Some(ext.group[offset % ext.group.len()].replace("{}", &number.to_string()))
    }

    pub fn default_for(&self, index: usize) -> Option<&'static str> {
        self.fields.get(index).and_then(|f| f.default)
    }

    /// Number of fields the object can hold before spilling into `extra`.
    pub fn capacity(&self) -> Option<usize> {
        match self.extensible {
            Some(_) => None,
            None => Some(self.fields.len()),
        }
    }
}
