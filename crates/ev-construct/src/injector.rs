//! Applying a construction set to a document.
//!
//! Validation and the window-layer check run before the document is
//! touched, so a rejected request leaves it exactly as it was.

use std::collections::BTreeMap;

use ev_core::{ConstructionSet, ConstructionSpec, ElementType};
use ev_idf::schema::{CONSTRUCTION, CONSTRUCTION_NAME_FIELD, SIMPLE_GLAZING};
use ev_idf::views::construction_object;
use ev_idf::{ClassKind, Document, Material, NameRegistry, SimpleGlazingMaterial, SurfaceView};
use serde::Serialize;

use crate::error::{InjectError, Warning};
use crate::repair;

/// What an injection changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeReport {
    pub materials_created: Vec<String>,
    /// Final construction name per requested element.
    pub constructions_created: BTreeMap<ElementType, String>,
    /// Number of objects now pointing at each new construction.
    pub assignments: BTreeMap<ElementType, usize>,
    pub remapped_references: usize,
    pub renamed_duplicates: usize,
    pub pruned_constructions: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl ChangeReport {
    pub fn assigned(&self, element: ElementType) -> usize {
        self.assignments.get(&element).copied().unwrap_or(0)
    }
}

/// Placeholder physical properties for layers nobody defined.
pub fn default_material(name: &str) -> Material {
    Material {
        name: name.to_string(),
        roughness: "MediumRough".to_string(),
        thickness_m: 0.2,
        conductivity_w_mk: 0.5,
        density_kg_m3: 800.0,
        specific_heat_j_kgk: 900.0,
        thermal_absorptance: 0.9,
        solar_absorptance: 0.7,
        visible_absorptance: 0.7,
    }
}

/// Injects construction sets; the seed feeds synthesized names.
#[derive(Debug, Clone, Default)]
pub struct Injector {
    seed: String,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: impl Into<String>) -> Self {
        Self { seed: seed.into() }
    }

    pub fn inject(&self, doc: &mut Document, set: &ConstructionSet) -> Result<ChangeReport, InjectError> {
        set.validate()?;
        check_window_layers(doc, set)?;

        let mut report = ChangeReport::default();

        for (element, spec) in set.iter() {
            if !element.is_opaque() {
                if spec.simple_glazing.is_some() && !spec.layers.is_empty() {
                    report.warnings.push(Warning::GlazingOverridesLayers {
                        construction: spec.name.clone(),
                    });
                }
                continue;
            }
            for layer in &spec.layers {
                if material_exists(doc, layer) {
                    continue;
                }
                doc.push(default_material(layer).to_object());
                tracing::warn!(material = %layer, "created material with default properties");
                report.materials_created.push(layer.clone());
                report.warnings.push(Warning::DefaultedMaterial {
                    material: layer.clone(),
                });
            }
        }

        for target in planned_names(set) {
            while doc.remove(CONSTRUCTION, &target).is_some() {}
        }

        let mut registry = NameRegistry::from_document(doc).with_seed(self.seed.clone());
        for (element, spec) in set.iter() {
            let name = registry.reserve(&spec.name);
            let layers = construction_layers_for(doc, &name, spec);
            doc.push(construction_object(&name, &layers));
            tracing::debug!(%element, construction = %name, "created construction");
            report.constructions_created.insert(element, name);
        }

        report.assignments = assign_exterior(doc, &report.constructions_created);

        let duplicates = repair::dedupe_constructions(doc, &mut registry);
        report.renamed_duplicates = duplicates.len();
        report.warnings.extend(duplicates);

        let repairs = repair::repair_references(doc);
        report.remapped_references = repairs
            .iter()
            .filter(|w| matches!(w, Warning::RemappedReference { .. }))
            .count();
        report.warnings.extend(repairs);

        report.pruned_constructions = repair::prune_unreferenced(doc);

        for (element, name) in &report.constructions_created {
            if report.assigned(*element) == 0 {
                tracing::warn!(%element, construction = %name, "no qualifying surfaces");
                report.warnings.push(Warning::NoQualifyingSurfaces {
                    element: *element,
                    construction: name.clone(),
                });
            }
        }

        tracing::info!(
            constructions = report.constructions_created.len(),
            materials = report.materials_created.len(),
            pruned = report.pruned_constructions.len(),
            warnings = report.warnings.len(),
            "construction set injected"
        );
        Ok(report)
    }
}

/// Apply `set` to `doc` with an unseeded [`Injector`].
pub fn inject_construction_set(doc: &mut Document, set: &ConstructionSet) -> Result<ChangeReport, InjectError> {
    Injector::new().inject(doc, set)
}

/// Managed names a request resolves to on a document holding none of
/// them: request names shared by several elements get `_dup{N}` in element
/// order. Removing exactly these before reserving makes reinjection
/// reproduce the same names.
fn planned_names(set: &ConstructionSet) -> Vec<String> {
    let mut planned = NameRegistry::new();
    set.iter()
        .filter(|(_, spec)| !spec.name.trim().is_empty())
        .map(|(_, spec)| planned.reserve(&spec.name))
        .collect()
}

/// Boundaries that put a floor in contact with the ground.
fn is_ground_boundary(boundary: &str) -> bool {
    boundary == "ground"
        || boundary.starts_with("groundfcfactormethod")
        || boundary.starts_with("groundslabpreprocessor")
        || boundary.starts_with("groundbasementpreprocessor")
}

/// Which requested element, if any, may be assigned to this object.
///
/// Only outward-facing surfaces qualify: walls and roofs facing outdoors,
/// floors on the ground or facing outdoors. Windows go to `Window` objects
/// and to fenestration of type `Window`, `GlassDoor` or blank; fenestration
/// of type `Door`, `Door` objects and internal mass are never reassigned.
pub fn qualifying_element(view: &SurfaceView<'_>) -> Option<ElementType> {
    let surface_type = view.surface_type().to_ascii_lowercase();
    match view.object().kind() {
        ClassKind::Surface => {
            let boundary = view.boundary_condition().to_ascii_lowercase();
            let outdoors = boundary == "outdoors";
            if surface_type.starts_with("wall") && outdoors {
                Some(ElementType::Wall)
            } else if (surface_type.starts_with("roof") || surface_type.starts_with("ceiling")) && outdoors {
                Some(ElementType::Roof)
            } else if surface_type.starts_with("floor") && (outdoors || is_ground_boundary(&boundary)) {
                Some(ElementType::Floor)
            } else {
                None
            }
        }
        ClassKind::Fenestration => {
            matches!(surface_type.as_str(), "window" | "glassdoor" | "").then_some(ElementType::Window)
        }
        _ => None,
    }
}

fn assign_exterior(
    doc: &mut Document,
    created: &BTreeMap<ElementType, String>,
) -> BTreeMap<ElementType, usize> {
    let plan: Vec<(usize, ElementType)> = doc
        .objects()
        .iter()
        .enumerate()
        .filter_map(|(index, obj)| {
            let view = SurfaceView::new(obj)?;
            let element = qualifying_element(&view)?;
            created.contains_key(&element).then_some((index, element))
        })
        .collect();

    let mut counts: BTreeMap<ElementType, usize> = created.keys().map(|e| (*e, 0)).collect();
    for (index, element) in plan {
        let (Some(obj), Some(name)) = (doc.object_mut(index), created.get(&element)) else {
            continue;
        };
        if obj.set(CONSTRUCTION_NAME_FIELD, name.clone()) {
            *counts.entry(element).or_default() += 1;
        }
    }
    counts
}

fn construction_layers_for(doc: &mut Document, name: &str, spec: &ConstructionSpec) -> Vec<String> {
    match &spec.simple_glazing {
        Some(glazing) => {
            let material = SimpleGlazingMaterial {
                name: format!("{name}_Glazing"),
                u_factor: glazing.u,
                shgc: glazing.shgc,
                visible_transmittance: glazing.tvis,
            };
            doc.remove(SIMPLE_GLAZING, &material.name);
            doc.push(material.to_object());
            vec![material.name]
        }
        None => spec.layers.clone(),
    }
}

fn check_window_layers(doc: &Document, set: &ConstructionSet) -> Result<(), InjectError> {
    let Some(spec) = set.get(ElementType::Window) else {
        return Ok(());
    };
    if spec.simple_glazing.is_some() {
        return Ok(());
    }
    let missing: Vec<String> = spec
        .layers
        .iter()
        .filter(|layer| !window_material_exists(doc, layer))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    tracing::error!(
        construction = %spec.name,
        missing = %missing.join(", "),
        "window construction references missing layers"
    );
    Err(InjectError::MissingWindowLayers {
        construction: spec.name.clone(),
        missing,
    })
}

fn is_material_class(class: &str) -> bool {
    let lower = class.to_ascii_lowercase();
    lower == "material" || lower.starts_with("material:") || lower.starts_with("windowmaterial:")
}

fn material_exists(doc: &Document, name: &str) -> bool {
    doc.objects()
        .iter()
        .any(|o| is_material_class(o.class()) && o.has_name(name))
}

fn window_material_exists(doc: &Document, name: &str) -> bool {
    doc.objects().iter().any(|o| {
        o.class().to_ascii_lowercase().starts_with("windowmaterial:") && o.has_name(name)
    })
}
