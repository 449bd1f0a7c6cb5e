//! Descriptors for suites, functions and parameters
//!
//! These are produced by the extractor, annotated by the model builder and
//! consumed read-only by both generators. Parameter order is the native call's
//! argument order and is never changed after extraction.

use crate::ir::TypeClassification;
use serde::{Deserialize, Serialize};

/// Syntactic shape of a parameter declarator.
///
/// Only `Simple` declarators are reconstructed exactly; the other shapes are
/// recorded so the model builder can exclude the function instead of guessing
/// a marshal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeclaratorShape {
    #[default]
    Simple,
    /// `T name[N]`
    Array,
    /// `T (*name)(...)`
    FunctionPointer,
    /// `...`
    Variadic,
}

/// Whether a handle parameter may be absent at the call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Optionality {
    Required,
    Optional,
    /// Not a handle input, or not yet resolved
    #[default]
    Unknown,
}

/// One parameter of a suite function
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    /// Declared type text, e.g. `const A_char*`
    pub ty: String,
    pub is_pointer: bool,
    pub is_const: bool,
    pub is_reference: bool,
    pub shape: DeclaratorShape,
    pub optionality: Optionality,
    pub classification: Option<TypeClassification>,
}

impl ParameterDescriptor {
    /// Descriptor for a simple declarator; flags are read off the type text
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        let ty = ty.into();
        let is_pointer = ty.contains('*');
        let is_reference = ty.contains('&');
        let is_const = ty.split(|c: char| !c.is_alphanumeric() && c != '_').any(|t| t == "const");
        Self {
            name: name.into(),
            ty,
            is_pointer,
            is_const,
            is_reference,
            shape: DeclaratorShape::Simple,
            optionality: Optionality::Unknown,
            classification: None,
        }
    }

    /// Record a non-simple declarator shape
    pub fn with_shape(mut self, shape: DeclaratorShape) -> Self {
        self.shape = shape;
        self
    }

    /// Pointer to non-const data: the callee writes through it
    pub fn is_output(&self) -> bool {
        self.is_pointer && !self.is_const
    }
}

/// One function-pointer slot of a suite
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub return_type: String,
    pub params: Vec<ParameterDescriptor>,
    pub suite_name: String,
}

impl FunctionDescriptor {
    pub fn new(
        suite_name: impl Into<String>,
        name: impl Into<String>,
        return_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            params: Vec::new(),
            suite_name: suite_name.into(),
        }
    }

    pub fn with_params(mut self, params: Vec<ParameterDescriptor>) -> Self {
        self.params = params;
        self
    }
}

/// A named table of function pointers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuiteDescriptor {
    pub name: String,
    pub functions: Vec<FunctionDescriptor>,
}

/// TypeScript reserved words that cannot be used as parameter names
const TS_RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "let", "static", "yield", "await",
    "interface", "package", "private", "protected", "public", "implements", "arguments",
];

/// Temporary holding the transport's reply inside generated client stubs
pub const TS_REPLY_VAR: &str = "__reply";

/// Identifier usable in TypeScript for a native parameter name.
///
/// Reserved words and the stub's reply temporary get a trailing `_`.
pub fn ts_ident(name: &str) -> String {
    if TS_RESERVED.contains(&name) || name == TS_REPLY_VAR {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}
