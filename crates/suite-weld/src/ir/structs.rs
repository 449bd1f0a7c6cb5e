//! Struct field tables
//!
//! Well-known fixed-layout structs are marshaled field by field as nested
//! records, in table order. A struct without a field table degrades to a
//! single opaque field.

use crate::ir::WirePrimitive;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Name of the single field used for structs without a field table
pub const OPAQUE_FIELD: &str = "opaque";

/// Kind of one struct field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Primitive(WirePrimitive),
    /// Placeholder for an unknown layout
    Opaque,
}

impl FieldKind {
    pub fn to_typescript(&self) -> &'static str {
        match self {
            FieldKind::Primitive(wire) => wire.to_typescript(),
            FieldKind::Opaque => "unknown",
        }
    }
}

/// One named field of a struct layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub kind: FieldKind,
}

impl StructField {
    pub fn new(name: impl Into<String>, kind: WirePrimitive) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Primitive(kind),
        }
    }
}

/// Field entry as written in the type map's `struct_fields` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: WirePrimitive,
}

impl From<&FieldSpec> for StructField {
    fn from(spec: &FieldSpec) -> Self {
        StructField::new(spec.name.clone(), spec.kind)
    }
}

/// Ordered field list of a struct type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub name: String,
    pub fields: Vec<StructField>,
    /// False when the struct has no field table and uses the opaque fallback
    pub known: bool,
}

impl StructLayout {
    /// Layout backed by a field table
    pub fn new(name: impl Into<String>, fields: Vec<StructField>) -> Self {
        Self {
            name: name.into(),
            fields,
            known: true,
        }
    }

    /// Fallback layout for a struct without a field table
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![StructField {
                name: OPAQUE_FIELD.to_string(),
                kind: FieldKind::Opaque,
            }],
            known: false,
        }
    }
}

lazy_static! {
    /// Field tables for the well-known SDK structs
    static ref BUILTIN_FIELDS: IndexMap<&'static str, Vec<StructField>> = {
        use WirePrimitive::*;
        let mut table = IndexMap::new();
        table.insert(
            "A_Time",
            vec![StructField::new("value", Int32), StructField::new("scale", UInt32)],
        );
        table.insert(
            "A_Ratio",
            vec![StructField::new("num", Int32), StructField::new("den", UInt32)],
        );
        table.insert(
            "A_FloatPoint",
            vec![StructField::new("x", Float64), StructField::new("y", Float64)],
        );
        table.insert(
            "A_FloatPoint3",
            vec![
                StructField::new("x", Float64),
                StructField::new("y", Float64),
                StructField::new("z", Float64),
            ],
        );
        table.insert("A_Rect", rect_fields(Int16));
        table.insert("A_LRect", rect_fields(Int32));
        table.insert("A_FloatRect", rect_fields(Float64));
        table.insert(
            "AEGP_ColorVal",
            vec![
                StructField::new("alphaF", Float64),
                StructField::new("redF", Float64),
                StructField::new("greenF", Float64),
                StructField::new("blueF", Float64),
            ],
        );
        table.insert(
            "AEGP_DownsampleFactor",
            vec![StructField::new("xS", Int16), StructField::new("yS", Int16)],
        );
        table
    };
}

fn rect_fields(kind: WirePrimitive) -> Vec<StructField> {
    ["left", "top", "right", "bottom"]
        .iter()
        .map(|name| StructField::new(*name, kind))
        .collect()
}

/// Struct field tables: the built-in well-known structs plus configured overrides
#[derive(Debug, Clone, Default)]
pub struct StructFieldTable {
    overrides: IndexMap<String, Vec<StructField>>,
}

impl StructFieldTable {
    /// Built-in tables only
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with configured field lists layered over the built-in ones
    pub fn with_overrides(overrides: IndexMap<String, Vec<StructField>>) -> Self {
        Self { overrides }
    }

    /// Layout for a struct type, falling back to the opaque layout
    pub fn layout(&self, name: &str) -> StructLayout {
        if let Some(fields) = self.overrides.get(name) {
            return StructLayout::new(name, fields.clone());
        }
        match BUILTIN_FIELDS.get(name) {
            Some(fields) => StructLayout::new(name, fields.clone()),
            None => StructLayout::opaque(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layout() {
        let table = StructFieldTable::new();
        let time = table.layout("A_Time");
        assert!(time.known);
        let names: Vec<_> = time.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["value", "scale"]);
    }

    #[test]
    fn test_unknown_layout_is_opaque() {
        let table = StructFieldTable::new();
        let layout = table.layout("PF_Mystery");
        assert!(!layout.known);
        assert_eq!(layout.fields.len(), 1);
        assert_eq!(layout.fields[0].name, OPAQUE_FIELD);
        assert_eq!(layout.fields[0].kind, FieldKind::Opaque);
    }

    #[test]
    fn test_override_wins() {
        let mut overrides = IndexMap::new();
        overrides.insert(
            "A_Time".to_string(),
            vec![StructField::new("ticks", WirePrimitive::Int64)],
        );
        let table = StructFieldTable::with_overrides(overrides);
        let layout = table.layout("A_Time");
        assert_eq!(layout.fields, vec![StructField::new("ticks", WirePrimitive::Int64)]);
    }
}
