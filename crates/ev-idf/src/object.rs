//! A single document object with schema-backed field access.

use core::fmt;

use crate::schema::{self, ClassKind, ClassSchema};

/// Location of an object in its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the first character of the object.
    pub start: usize,
    /// Byte offset one past the terminating `;` (or end of input).
    pub end: usize,
    /// 1-based line of `start`.
    pub start_line: usize,
    /// 1-based line of `end`.
    pub end_line: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "line {}", self.start_line)
        } else {
            write!(f, "lines {}-{}", self.start_line, self.end_line)
        }
    }
}

/// One object: a class name plus positional fields.
///
/// Known classes keep their fields in `fields` up to the schema capacity;
/// anything beyond goes to `extra` and is written back unchanged.
#[derive(Debug, Clone)]
pub struct IdfObject {
    class: String,
    schema: Option<&'static ClassSchema>,
    fields: Vec<String>,
    extra: Vec<String>,
    span: Option<Span>,
}

impl PartialEq for IdfObject {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.fields == other.fields && self.extra == other.extra
    }
}

impl IdfObject {
    pub fn new(class: &str, mut values: Vec<String>) -> Self {
        let schema = schema::lookup(class);
        let class = schema.map_or_else(|| class.to_string(), |s| s.name.to_string());
        let extra = match schema.and_then(|s| s.capacity()) {
            Some(capacity) if values.len() > capacity => values.split_off(capacity),
            _ => Vec::new(),
        };
        Self {
            class,
            schema,
            fields: values,
            extra,
            span: None,
        }
    }

    /// Object of a named class whose first field is `name`.
    pub fn named<I, S>(class: &str, name: &str, rest: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = vec![name.to_string()];
        values.extend(rest.into_iter().map(Into::into));
        Self::new(class, values)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is_class(&self, class: &str) -> bool {
        self.class.eq_ignore_ascii_case(class)
    }

    pub fn schema(&self) -> Option<&'static ClassSchema> {
        self.schema
    }

    pub fn kind(&self) -> ClassKind {
        self.schema.map_or(ClassKind::Other, |s| s.kind)
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn extra(&self) -> &[String] {
        &self.extra
    }

    /// Object name; unknown classes are assumed to be named by field 0.
    pub fn name(&self) -> Option<&str> {
        if self.schema.is_some_and(|s| !s.named) {
            return None;
        }
        self.value(0)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name().is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    /// Raw value at `index`; blank fields read as absent.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.fields
            .get(index)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Value of a schema field, falling back to the schema default.
    pub fn get(&self, field: &str) -> Option<&str> {
        let schema = self.schema?;
        let index = schema.field_index(field)?;
        self.value(index).or_else(|| schema.default_for(index))
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(|v| v.parse().ok())
    }

    /// Set a schema field; returns `false` for labels the schema does not know.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        match self.schema.and_then(|s| s.field_index(field)) {
            Some(index) => {
                self.set_value(index, value);
                true
            }
            None => false,
        }
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<String>) {
        if self.fields.len() <= index {
            self.fields.resize(index + 1, String::new());
        }
        self.fields[index] = value.into();
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set_value(0, name);
    }

    /// Values of the repeating tail (layers, vertices), without trailing blanks.
    pub fn tail(&self) -> &[String] {
        let start = self
            .schema
            .and_then(|s| s.extensible)
            .map_or(self.fields.len(), |e| e.start)
            .min(self.fields.len());
        trim_trailing_blanks(&self.fields[start..])
    }

    /// Replace every value from `index` onwards.
    pub fn replace_from(&mut self, index: usize, values: Vec<String>) {
        self.fields.truncate(index);
        self.fields.resize(index, String::new());
        self.fields.extend(values);
    }
}

fn trim_trailing_blanks(values: &[String]) -> &[String] {
    let end = values
        .iter()
        .rposition(|v| !v.is_empty())
        .map_or(0, |i| i + 1);
    &values[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_class_is_canonicalized() {
        let obj = IdfObject::named("MATERIAL", "Brick", ["Rough", "0.1"]);
        assert_eq!(obj.class(), "Material");
        assert_eq!(obj.kind(), ClassKind::OpaqueMaterial);
        assert!(obj.has_name("brick"));
    }

    #[test]
    fn missing_optional_fields_read_as_defaults() {
        let obj = IdfObject::named("Material", "Brick", ["", "0.1", "0.7", "1900", "800"]);
        assert_eq!(obj.get("Roughness"), Some("MediumRough"));
        assert_eq!(obj.get("Thermal Absorptance"), Some("0.9"));
        assert_eq!(obj.get_f64("Thickness"), Some(0.1));
    }

    #[test]
    fn overflow_goes_to_extra_bucket() {
        let values: Vec<String> = ["Glass", "1.8", "0.6", "0.7", "surplus"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let obj = IdfObject::new("WindowMaterial:SimpleGlazingSystem", values);
        assert_eq!(obj.fields().len(), 4);
        assert_eq!(obj.extra(), ["surplus".to_string()]);
    }

    #[test]
    fn unknown_class_keeps_everything() {
        let obj = IdfObject::named("Output:Variable", "*", ["Zone Mean Air Temperature", "Hourly"]);
        assert_eq!(obj.kind(), ClassKind::Other);
        assert_eq!(obj.fields().len(), 3);
        assert!(obj.extra().is_empty());
        assert_eq!(obj.get("Name"), None);
    }

    #[test]
    fn set_extends_short_objects() {
        let mut obj = IdfObject::named("BuildingSurface:Detailed", "Wall1", ["Wall"]);
        assert!(obj.set("Construction Name", "C1"));
        assert_eq!(obj.get("Construction Name"), Some("C1"));
        assert!(!obj.set("No Such Field", "x"));
    }

    #[test]
    fn construction_tail_is_layer_list() {
        let mut obj = IdfObject::named("Construction", "C", ["Outer", "Inner", ""]);
        assert_eq!(obj.tail(), ["Inner".to_string()]);
        obj.replace_from(1, vec!["A".into(), "B".into(), "C".into()]);
        assert_eq!(obj.fields(), ["C", "A", "B", "C"]);
    }

    #[test]
    fn unnamed_class_has_no_name() {
        let obj = IdfObject::new("Version", vec!["23.2".to_string()]);
        assert_eq!(obj.name(), None);
    }

    #[test]
    fn span_display() {
        let span = Span {
            start: 0,
            end: 10,
            start_line: 3,
            end_line: 5,
        };
        assert_eq!(span.to_string(), "lines 3-5");
    }
}
