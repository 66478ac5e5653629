//! [`Document`] to text.

use std::fmt::Write as _;

use crate::document::Document;
use crate::object::IdfObject;
use crate::{IdfError, IdfResult};

const VALUE_COLUMN: usize = 25;

pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for (i, obj) in doc.objects().iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_object(&mut out, obj);
    }
    out
}

/// Fail on the first value that would not read back as a single field.
pub fn check_writable(doc: &Document) -> IdfResult<()> {
    for obj in doc.objects() {
        let bad = obj
            .fields()
            .iter()
            .chain(obj.extra())
            .find(|v| v.contains([',', ';', '!', '\n', '\r']));
        if let Some(value) = bad {
            return Err(IdfError::UnwritableValue {
                class: obj.class().to_string(),
                object: obj.name().unwrap_or_default().to_string(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

fn write_object(out: &mut String, obj: &IdfObject) {
    let values: Vec<&str> = obj
        .fields()
        .iter()
        .chain(obj.extra())
        .map(|v| v.as_str())
        .collect();

    if values.is_empty() {
        let _ = writeln!(out, "{};", obj.class());
        return;
    }

    let _ = writeln!(out, "{},", obj.class());
    let last = values.len() - 1;
    for (index, value) in values.iter().enumerate() {
        let terminator = if index == last { ';' } else { ',' };
        let cell = format!("{}{}", value, terminator);
        let label = obj.schema().and_then(|s| s.field_label(index));
        match label {
            Some(label) if index < obj.fields().len() => {
                let _ = writeln!(out, "    {:<width$} !- {}", cell, label, width = VALUE_COLUMN);
            }
            _ => {
                let _ = writeln!(out, "    {}", cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, IdfObject};

    #[test]
    fn writes_labels_from_schema() {
        let mut doc = Document::new();
        doc.push(IdfObject::named("Construction", "Wall1", ["Brick", "Insulation"]));
        let text = doc.to_idf_string();

        assert!(text.starts_with("Construction,\n"));
        assert!(text.contains("Wall1,"));
        assert!(text.contains("!- Outside Layer"));
        assert!(text.contains("Insulation;"));
        assert!(text.contains("!- Layer 2"));
    }

    #[test]
    fn delimiter_in_value_is_unwritable() {
        let mut doc = Document::load("Construction,Wall1,Brick;").unwrap();
        assert!(super::check_writable(&doc).is_ok());
        doc.push(IdfObject::named("Construction", "Brick, 200mm", ["Brick"]));
        assert!(matches!(
            super::check_writable(&doc),
            Err(crate::IdfError::UnwritableValue { ref value, .. }) if value == "Brick, 200mm"
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.idf");
        assert!(doc.write_file(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn bare_class_on_one_line() {
        let mut doc = Document::new();
        doc.push(IdfObject::new("Output:Surfaces:List", vec![]));
        assert_eq!(doc.to_idf_string(), "Output:Surfaces:List;\n");
    }

    #[test]
    fn extra_fields_survive() {
        let doc = Document::load("Material:AirGap,Gap,0.18,spare;").unwrap();
        let text = doc.to_idf_string();
        let again = Document::load(&text).unwrap();
        assert_eq!(again, doc);
        assert_eq!(again.objects()[0].extra(), ["spare".to_string()]);
    }
}
