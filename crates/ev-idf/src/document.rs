//! In-memory document: an ordered list of objects.

use std::path::Path;

use crate::object::IdfObject;
use crate::parse::{self, ParseError};
use crate::schema::ClassKind;
use crate::write;
use crate::{IdfError, IdfResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    objects: Vec<IdfObject>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(text: &str) -> Result<Self, ParseError> {
        parse::parse(text)
    }

    pub fn to_idf_string(&self) -> String {
        write::serialize(self)
    }

    pub fn read_file(path: &Path) -> IdfResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| IdfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(&text).map_err(|source| IdfError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Write the document, refusing values that would change meaning on reload.
    pub fn write_file(&self, path: &Path) -> IdfResult<()> {
        write::check_writable(self)?;
        std::fs::write(path, self.to_idf_string()).map_err(|source| IdfError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[IdfObject] {
        &self.objects
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut IdfObject> {
        self.objects.get_mut(index)
    }

    pub fn push(&mut self, obj: IdfObject) -> &mut IdfObject {
        self.objects.push(obj);
        let last = self.objects.len() - 1;
        &mut self.objects[last]
    }

    /// Objects of `class` matching `predicate`, in document order.
    pub fn find<P>(&self, class: &str, mut predicate: P) -> Vec<&IdfObject>
    where
        P: FnMut(&IdfObject) -> bool,
    {
        self.objects
            .iter()
            .filter(|o| o.is_class(class) && predicate(*o))
            .collect()
    }

    pub fn find_mut<P>(&mut self, class: &str, mut predicate: P) -> Vec<&mut IdfObject>
    where
        P: FnMut(&IdfObject) -> bool,
    {
        self.objects
            .iter_mut()
            .filter(|o| o.is_class(class) && predicate(&**o))
            .collect()
    }

    pub fn of_kind(&self, kind: ClassKind) -> impl Iterator<Item = &IdfObject> {
        self.objects.iter().filter(move |o| o.kind() == kind)
    }

    pub fn of_kind_mut(&mut self, kind: ClassKind) -> impl Iterator<Item = &mut IdfObject> {
        self.objects.iter_mut().filter(move |o| o.kind() == kind)
    }

    pub fn get(&self, class: &str, name: &str) -> Option<&IdfObject> {
        self.objects
            .iter()
            .find(|o| o.is_class(class) && o.has_name(name))
    }

    pub fn get_mut(&mut self, class: &str, name: &str) -> Option<&mut IdfObject> {
        self.objects
            .iter_mut()
            .find(|o| o.is_class(class) && o.has_name(name))
    }

    pub fn contains(&self, class: &str, name: &str) -> bool {
        self.get(class, name).is_some()
    }

    /// Replace the fields of the named object, or append a new one.
    ///
    /// `values` are the fields after the name.
    pub fn upsert(&mut self, class: &str, name: &str, values: Vec<String>) -> &mut IdfObject {
        let fresh = IdfObject::named(class, name, values);
        let existing = self
            .objects
            .iter()
            .position(|o| o.is_class(class) && o.has_name(name));
        match existing {
            Some(index) => {
                self.objects[index] = fresh;
                &mut self.objects[index]
            }
            None => self.push(fresh),
        }
    }

    /// Remove the first object of `class` with this name.
    pub fn remove(&mut self, class: &str, name: &str) -> Option<IdfObject> {
        let index = self
            .objects
            .iter()
            .position(|o| o.is_class(class) && o.has_name(name))?;
        Some(self.objects.remove(index))
    }

    /// Remove every object matching `predicate`; returns how many went.
    pub fn remove_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&IdfObject) -> bool,
    {
        let before = self.objects.len();
        self.objects.retain(|o| !predicate(o));
        before - self.objects.len()
    }

    /// Every object name in the document.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().filter_map(|o| o.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "\
Zone,Office;
Material,Brick,Rough,0.1,0.7,1900,800;
Construction,Wall1,Brick;
BuildingSurface:Detailed,Wall1,Wall,Wall1,Office,,Outdoors;
";

    #[test]
    fn find_and_get() {
        let doc = Document::load(SMALL).unwrap();
        assert_eq!(doc.len(), 4);
        assert!(doc.contains("construction", "WALL1"));
        let surfaces = doc.find("BuildingSurface:Detailed", |o| {
            o.get("Outside Boundary Condition") == Some("Outdoors")
        });
        assert_eq!(surfaces.len(), 1);
        assert_eq!(doc.of_kind(ClassKind::OpaqueMaterial).count(), 1);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut doc = Document::load(SMALL).unwrap();
        doc.upsert("Construction", "Wall1", vec!["Brick".into(), "Brick".into()]);
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.objects()[2].fields(), ["Wall1", "Brick", "Brick"]);

        doc.upsert("Construction", "Roof1", vec!["Brick".into()]);
        assert_eq!(doc.len(), 5);
    }

    #[test]
    fn remove_and_remove_where() {
        let mut doc = Document::load(SMALL).unwrap();
        let removed = doc.remove("Material", "brick").unwrap();
        assert_eq!(removed.name(), Some("Brick"));
        assert!(doc.remove("Material", "brick").is_none());

        let n = doc.remove_where(|o| o.kind() == ClassKind::Zone);
        assert_eq!(n, 1);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn serialize_then_load_is_identity() {
        let doc = Document::load(SMALL).unwrap();
        let again = Document::load(&doc.to_idf_string()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.idf");
        let doc = Document::load(SMALL).unwrap();
        doc.write_file(&path).unwrap();
        assert_eq!(Document::read_file(&path).unwrap(), doc);
    }

    #[test]
    fn read_file_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.idf");
        std::fs::write(&path, "Zone,Office").unwrap();
        let err = Document::read_file(&path).unwrap_err();
        assert!(matches!(err, IdfError::Parse { path: Some(_), .. }));
    }
}
