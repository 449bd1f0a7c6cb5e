//! Type classification for suite-weld
//!
//! Every parameter and return type of a suite function is reduced to one of a
//! small, closed set of marshaling categories. Both generators switch on these
//! categories, so the mapping below is the contract between the native wrapper
//! and the TypeScript client.
//!
//! # Category Overview
//!
//! | Category | Native side | Wire | TypeScript |
//! |----------|-------------|------|------------|
//! | `Handle` | opaque pointer, looked up in a registry | integer id | `number` |
//! | `ManagedHandle` | value type owning native resources | integer id | `number` |
//! | `Primitive` | numeric / boolean scalar | number / bool | `number` / `boolean` |
//! | `String` | owned string type or `char*` | string | `string` |
//! | `Struct` | fixed-layout aggregate | nested record | `interface` |
//! | `Enum` | integer-backed constant set | integer | `number` |
//! | `Error` | canonical error-code type | integer | `number` |
//! | `Void` | `void` | none | `void` |
//! | `Unknown` | unmapped | none | `unknown` |
//!
//! `Unknown` is a real category: nothing downstream is allowed to treat it as
//! any of the others.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base type recorded for raw `char` strings
pub const CSTRING_BASE: &str = "char";

/// Wire-level numeric/boolean kind of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WirePrimitive {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    #[serde(alias = "float")]
    Float32,
    #[serde(alias = "double")]
    Float64,
    #[serde(alias = "boolean")]
    Bool,
}

impl WirePrimitive {
    /// TypeScript spelling
    pub fn to_typescript(&self) -> &'static str {
        match self {
            WirePrimitive::Bool => "boolean",
            _ => "number",
        }
    }

    /// C++ type handed to `json::get<T>()` when reading this kind off the wire
    pub fn cpp_wire_type(&self) -> &'static str {
        match self {
            WirePrimitive::Int8 | WirePrimitive::Int16 | WirePrimitive::Int32 | WirePrimitive::Int64 => {
                "int64_t"
            }
            WirePrimitive::UInt8
            | WirePrimitive::UInt16
            | WirePrimitive::UInt32
            | WirePrimitive::UInt64 => "uint64_t",
            WirePrimitive::Float32 | WirePrimitive::Float64 => "double",
            WirePrimitive::Bool => "bool",
        }
    }
}

impl fmt::Display for WirePrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WirePrimitive::Int8 => "int8",
            WirePrimitive::Int16 => "int16",
            WirePrimitive::Int32 => "int32",
            WirePrimitive::Int64 => "int64",
            WirePrimitive::UInt8 => "uint8",
            WirePrimitive::UInt16 => "uint16",
            WirePrimitive::UInt32 => "uint32",
            WirePrimitive::UInt64 => "uint64",
            WirePrimitive::Float32 => "float32",
            WirePrimitive::Float64 => "float64",
            WirePrimitive::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Native representation of a string category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringRepr {
    /// Configured string type, constructed from and exported to `std::string`
    Owned,
    /// Raw `char*`; an input borrows a C-string view, an output is a buffer
    CString,
}

/// Marshaling category with its category-specific metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Handle { registry_key: String },
    ManagedHandle { registry_key: String },
    Primitive(WirePrimitive),
    String(StringRepr),
    Struct,
    Enum,
    Error,
    Void,
    Unknown,
}

impl TypeKind {
    pub fn category(&self) -> Category {
        match self {
            TypeKind::Handle { .. } => Category::Handle,
            TypeKind::ManagedHandle { .. } => Category::ManagedHandle,
            TypeKind::Primitive(_) => Category::Primitive,
            TypeKind::String(_) => Category::String,
            TypeKind::Struct => Category::Struct,
            TypeKind::Enum => Category::Enum,
            TypeKind::Error => Category::Error,
            TypeKind::Void => Category::Void,
            TypeKind::Unknown => Category::Unknown,
        }
    }
}

/// Category tag without metadata.
///
/// The declaration order of [`Category::PRIORITY`] is the classifier's
/// resolution order: the first category whose table contains a base type wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Void,
    Error,
    String,
    ManagedHandle,
    Handle,
    Primitive,
    Enum,
    Struct,
    Unknown,
}

impl Category {
    /// Resolution order used by the classifier. `Unknown` is the fallback and
    /// therefore not listed.
    pub const PRIORITY: [Category; 8] = [
        Category::Void,
        Category::Error,
        Category::String,
        Category::ManagedHandle,
        Category::Handle,
        Category::Primitive,
        Category::Enum,
        Category::Struct,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Void => "void",
            Category::Error => "error",
            Category::String => "string",
            Category::ManagedHandle => "managed_handle",
            Category::Handle => "handle",
            Category::Primitive => "primitive",
            Category::Enum => "enum",
            Category::Struct => "struct",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying one declared type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeClassification {
    pub kind: TypeKind,
    /// Type name with `const`, `*` and `&` stripped; names native locals
    pub base_type: String,
    pub is_const: bool,
    pub pointer_depth: u8,
    pub is_reference: bool,
}

impl TypeClassification {
    pub fn new(kind: TypeKind, base_type: impl Into<String>) -> Self {
        Self {
            kind,
            base_type: base_type.into(),
            is_const: false,
            pointer_depth: 0,
            is_reference: false,
        }
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// At least one level of indirection
    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Unknown)
    }

    /// TypeScript type of this category on the client side
    pub fn to_typescript(&self) -> String {
        match &self.kind {
            TypeKind::Handle { .. }
            | TypeKind::ManagedHandle { .. }
            | TypeKind::Enum
            | TypeKind::Error => "number".to_string(),
            TypeKind::Primitive(wire) => wire.to_typescript().to_string(),
            TypeKind::String(_) => "string".to_string(),
            TypeKind::Struct => self.base_type.clone(),
            TypeKind::Void => "void".to_string(),
            TypeKind::Unknown => "unknown".to_string(),
        }
    }
}

impl fmt::Display for TypeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.base_type, self.category())
    }
}
