//! Typed accessors over raw objects.

use crate::object::IdfObject;
use crate::schema::{self, CONSTRUCTION_NAME_FIELD, ClassKind};

/// Opaque `Material` with every property spelled out.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub roughness: String,
    pub thickness_m: f64,
    pub conductivity_w_mk: f64,
    pub density_kg_m3: f64,
    pub specific_heat_j_kgk: f64,
    pub thermal_absorptance: f64,
    pub solar_absorptance: f64,
    pub visible_absorptance: f64,
}

impl Material {
    pub fn from_object(obj: &IdfObject) -> Option<Self> {
        if !obj.is_class(schema::MATERIAL) {
            return None;
        }
        Some(Self {
            name: obj.name()?.to_string(),
            roughness: obj.get("Roughness")?.to_string(),
            thickness_m: obj.get_f64("Thickness")?,
            conductivity_w_mk: obj.get_f64("Conductivity")?,
            density_kg_m3: obj.get_f64("Density")?,
            specific_heat_j_kgk: obj.get_f64("Specific Heat")?,
            thermal_absorptance: obj.get_f64("Thermal Absorptance")?,
            solar_absorptance: obj.get_f64("Solar Absorptance")?,
            visible_absorptance: obj.get_f64("Visible Absorptance")?,
        })
    }

    pub fn to_object(&self) -> IdfObject {
        IdfObject::named(
            schema::MATERIAL,
            &self.name,
            [
                self.roughness.clone(),
                self.thickness_m.to_string(),
                self.conductivity_w_mk.to_string(),
                self.density_kg_m3.to_string(),
                self.specific_heat_j_kgk.to_string(),
                self.thermal_absorptance.to_string(),
                self.solar_absorptance.to_string(),
                self.visible_absorptance.to_string(),
            ],
        )
    }
}

/// `WindowMaterial:SimpleGlazingSystem`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleGlazingMaterial {
    pub name: String,
    pub u_factor: f64,
    pub shgc: f64,
    pub visible_transmittance: f64,
}

impl SimpleGlazingMaterial {
    pub fn to_object(&self) -> IdfObject {
        IdfObject::named(
            schema::SIMPLE_GLAZING,
            &self.name,
            [
                self.u_factor.to_string(),
                self.shgc.to_string(),
                self.visible_transmittance.to_string(),
            ],
        )
    }
}

/// Build a `Construction` object from ordered layer names (outside first).
pub fn construction_object<S: AsRef<str>>(name: &str, layers: &[S]) -> IdfObject {
    IdfObject::named(
        schema::CONSTRUCTION,
        name,
        layers.iter().map(|l| l.as_ref().to_string()),
    )
}

/// Ordered layer names of a `Construction`, outside layer first.
pub fn construction_layers(obj: &IdfObject) -> Vec<&str> {
    obj.fields()
        .iter()
        .skip(1)
        .map(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Read-only view of anything carrying a construction reference.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceView<'a> {
    obj: &'a IdfObject,
}

impl<'a> SurfaceView<'a> {
    pub fn new(obj: &'a IdfObject) -> Option<Self> {
        let refers = matches!(
            obj.kind(),
            ClassKind::Surface | ClassKind::Fenestration | ClassKind::ConstructionUser
        );
        refers.then_some(Self { obj })
    }

    pub fn object(&self) -> &'a IdfObject {
        self.obj
    }

    pub fn name(&self) -> &'a str {
        self.obj.name().unwrap_or("")
    }

    /// Surface type; `Window` objects have none and report "Window".
    pub fn surface_type(&self) -> &'a str {
        if self.obj.is_class(schema::WINDOW) {
            return "Window";
        }
        self.obj.get("Surface Type").unwrap_or("")
    }

    /// Outside boundary condition; empty for classes without one.
    pub fn boundary_condition(&self) -> &'a str {
        self.obj.get("Outside Boundary Condition").unwrap_or("")
    }

    pub fn construction_name(&self) -> &'a str {
        self.obj.get(CONSTRUCTION_NAME_FIELD).unwrap_or("")
    }
}

/// Whether the object carries a `Construction Name` field.
pub fn references_construction(obj: &IdfObject) -> bool {
    SurfaceView::new(obj).is_some()
}
