use ev_construct::{
    CandidateGroups, ExpandMode, InjectError, Injector, Warning, expand, inject_construction_set,
};
use ev_core::{ConstructionSet, ConstructionSpec, ElementType, SimpleGlazing, ValidationError};
use ev_idf::schema::{BUILDING_SURFACE, CONSTRUCTION, CONSTRUCTION_NAME_FIELD, FENESTRATION_SURFACE};
use ev_idf::Document;

const OFFICE: &str = "\
Material,Brick,Rough,0.1,0.9,1900,800;
Material,Plaster,Smooth,0.02,0.6,1100,840;
WindowMaterial:SimpleGlazingSystem,Clear,2.7,0.7,0.8;
Construction,Wall1,Brick,Plaster;
Construction,Wall2,Brick,Plaster;
Construction,Partition,Plaster;
Construction,Glass,Clear;
Zone,Office;
Zone,Store;
BuildingSurface:Detailed,North,Wall,Wall1,Office,,Outdoors;
BuildingSurface:Detailed,South,Wall,Wall2,Office,,Outdoors;
BuildingSurface:Detailed,Shared,Wall,Partition,Office,,Surface,Shared Back;
BuildingSurface:Detailed,Shared Back,Wall,Partition,Store,,Surface,Shared;
BuildingSurface:Detailed,Adiabatic,Wall,Wall1,Store,,Adiabatic;
BuildingSurface:Detailed,Slab,Floor,Partition,Office,,Ground;
FenestrationSurface:Detailed,South Win,Window,Glass,South;
Door,Entry,Partition,North;
";

fn surface_construction<'a>(doc: &'a Document, name: &str) -> &'a str {
    doc.get(BUILDING_SURFACE, name)
        .and_then(|s| s.get(CONSTRUCTION_NAME_FIELD))
        .unwrap_or_default()
}

#[test]
fn wall_replacement_touches_only_outdoor_walls() {
    let mut doc = Document::load(OFFICE).unwrap();
    let set = ConstructionSet::new().with(
        ElementType::Wall,
        ConstructionSpec::layered("W2", &["Brick", "Mineral Wool", "Plaster"]),
    );

    let report = inject_construction_set(&mut doc, &set).unwrap();

    assert_eq!(report.assigned(ElementType::Wall), 2);
    assert_eq!(surface_construction(&doc, "North"), "EV_W2");
    assert_eq!(surface_construction(&doc, "South"), "EV_W2");
    assert_eq!(surface_construction(&doc, "Shared"), "Partition");
    assert_eq!(surface_construction(&doc, "Adiabatic"), "Wall1");

    // Wall1 is still used by the adiabatic wall; Wall2 is orphaned.
    assert_eq!(report.pruned_constructions, vec!["Wall2".to_string()]);
    assert!(doc.contains(CONSTRUCTION, "Wall1"));
    assert_eq!(report.materials_created, vec!["Mineral Wool".to_string()]);
}

#[test]
fn repeated_injection_is_idempotent() {
    let glazed = ConstructionSet::new()
        .with(ElementType::Wall, ConstructionSpec::layered("W2", &["Brick"]))
        .with(
            ElementType::Window,
            ConstructionSpec::glazing("G1", SimpleGlazing { u: 1.2, shgc: 0.35, tvis: 0.6 }),
        );
    let shared_name = ConstructionSet::new()
        .with(ElementType::Wall, ConstructionSpec::layered("Shell", &["Brick"]))
        .with(ElementType::Floor, ConstructionSpec::layered("Shell", &["Brick", "Plaster"]));

    for set in [glazed, shared_name] {
        let mut once = Document::load(OFFICE).unwrap();
        let first = inject_construction_set(&mut once, &set).unwrap();
        let mut twice = once.clone();
        let second = inject_construction_set(&mut twice, &set).unwrap();

        assert_eq!(once.to_idf_string(), twice.to_idf_string(), "{}", set.label());
        assert_eq!(first.constructions_created, second.constructions_created);
        assert!(second.pruned_constructions.is_empty(), "{:?}", second.pruned_constructions);
        assert_eq!(second.renamed_duplicates, 0);
    }
}

#[test]
fn injected_document_reloads_unchanged() {
    let set = ConstructionSet::new()
        .with(ElementType::Wall, ConstructionSpec::layered("Brick 200mm (ext)", &["Brick", "Mineral Wool"]))
        .with(ElementType::Floor, ConstructionSpec::layered("Slab-on-grade", &["Plaster"]))
        .with(
            ElementType::Window,
            ConstructionSpec::glazing("Low-E", SimpleGlazing { u: 1.1, shgc: 0.3, tvis: 0.55 }),
        );
    let mut doc = Document::load(OFFICE).unwrap();
    inject_construction_set(&mut doc, &set).unwrap();

    let reloaded = Document::load(&doc.to_idf_string()).unwrap();
    assert_eq!(reloaded, doc);
    assert_eq!(surface_construction(&reloaded, "North"), "EV_Brick 200mm (ext)");
    let north = reloaded.get(BUILDING_SURFACE, "North").unwrap();
    assert_eq!(north.get("Outside Boundary Condition"), Some("Outdoors"));
}

#[test]
fn delimiter_in_request_never_reaches_the_document() {
    let mut doc = Document::load(OFFICE).unwrap();
    let before = doc.clone();
    for set in [
        ConstructionSet::new().with(ElementType::Wall, ConstructionSpec::layered("Brick, 200mm", &["Brick"])),
        ConstructionSet::new().with(ElementType::Roof, ConstructionSpec::layered("R1", &["Gypsum; Board"])),
    ] {
        assert!(matches!(
            inject_construction_set(&mut doc, &set),
            Err(InjectError::Validation(ValidationError::ReservedCharacter { .. }))
        ));
    }
    assert_eq!(doc, before);
}

#[test]
fn windows_and_doors_are_distinguished() {
    let mut doc = Document::load(OFFICE).unwrap();
    let set = ConstructionSet::new().with(
        ElementType::Window,
        ConstructionSpec::glazing("Low-E", SimpleGlazing { u: 1.1, shgc: 0.3, tvis: 0.55 }),
    );
    let report = inject_construction_set(&mut doc, &set).unwrap();

    assert_eq!(report.assigned(ElementType::Window), 1);
    let window = doc.get(FENESTRATION_SURFACE, "South Win").unwrap();
    assert_eq!(window.get(CONSTRUCTION_NAME_FIELD), Some("EV_Low-E"));
    let door = doc.get("Door", "Entry").unwrap();
    assert_eq!(door.get(CONSTRUCTION_NAME_FIELD), Some("Partition"));
}

#[test]
fn colliding_request_names_get_dup_suffix() {
    let mut doc = Document::load(OFFICE).unwrap();
    let set = ConstructionSet::new()
        .with(ElementType::Wall, ConstructionSpec::layered("Shell", &["Brick"]))
        .with(ElementType::Floor, ConstructionSpec::layered("Shell", &["Brick"]));
    let report = inject_construction_set(&mut doc, &set).unwrap();

    assert_eq!(report.constructions_created[&ElementType::Wall], "EV_Shell");
    assert_eq!(report.constructions_created[&ElementType::Floor], "EV_Shell_dup1");
    assert_eq!(surface_construction(&doc, "Slab"), "EV_Shell_dup1");
}

#[test]
fn dangling_reference_is_remapped() {
    let text = format!("{OFFICE}BuildingSurface:Detailed,Annex,Wall,Partition_v2,Store,,Surface,Shared;\n");
    let mut doc = Document::load(&text).unwrap();
    let set = ConstructionSet::new().with(ElementType::Roof, ConstructionSpec::layered("R1", &["Brick"]));
    let report = inject_construction_set(&mut doc, &set).unwrap();

    assert_eq!(surface_construction(&doc, "Annex"), "Partition");
    assert_eq!(report.remapped_references, 1);
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        Warning::RemappedReference { exact: true, .. }
    )));
}

#[test]
fn every_expanded_variant_injects_cleanly() {
    let mut groups = CandidateGroups::new();
    groups.push(ElementType::Wall, ConstructionSpec::layered("W2", &["Brick"]));
    groups.push(ElementType::Wall, ConstructionSpec::layered("W3", &["Brick", "Plaster"]));
    groups.push(
        ElementType::Window,
        ConstructionSpec::glazing("G1", SimpleGlazing { u: 1.4, shgc: 0.4, tvis: 0.6 }),
    );

    let sets = expand(&groups, ExpandMode::Combinatorial);
    assert_eq!(sets.len(), 5);
    for (i, set) in sets.iter().enumerate() {
        let mut doc = Document::load(OFFICE).unwrap();
        let report = Injector::with_seed(format!("variant-{i}"))
            .inject(&mut doc, set)
            .unwrap();
        assert_eq!(report.constructions_created.len(), set.len());
        Document::load(&doc.to_idf_string()).unwrap();
    }
}

mod exterior_only {
    use super::*;
    use proptest::prelude::*;

    fn boundary() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "Outdoors", "outdoors", "Ground", "GroundFCfactorMethod", "Surface", "Zone", "Adiabatic",
            "OtherSideCoefficients",
        ])
    }

    fn surface_type() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["Wall", "Roof", "Ceiling", "Floor"])
    }

    proptest! {
        #[test]
        fn non_exterior_surfaces_keep_their_construction(
            surfaces in prop::collection::vec((surface_type(), boundary()), 1..12)
        ) {
            let mut text = String::from("Material,Brick,Rough,0.1,0.9,1900,800;\nConstruction,Old,Brick;\n");
            for (i, (kind, boundary)) in surfaces.iter().enumerate() {
                text.push_str(&format!("BuildingSurface:Detailed,S{i},{kind},Old,Z,,{boundary};\n"));
            }
            let mut doc = Document::load(&text).unwrap();
            let set = ConstructionSet::new()
                .with(ElementType::Wall, ConstructionSpec::layered("W", &["Brick"]))
                .with(ElementType::Roof, ConstructionSpec::layered("R", &["Brick"]))
                .with(ElementType::Floor, ConstructionSpec::layered("F", &["Brick"]));
            inject_construction_set(&mut doc, &set).unwrap();

            for (i, (_, boundary)) in surfaces.iter().enumerate() {
                let lower = boundary.to_ascii_lowercase();
                let exterior = matches!(lower.as_str(), "outdoors" | "ground" | "groundfcfactormethod");
                if !exterior {
                    prop_assert_eq!(surface_construction(&doc, &format!("S{i}")), "Old");
                }
            }
        }
    }
}
