//! Type classifier
//!
//! Reduces declared type text to a [`TypeClassification`] by walking
//! [`Category::PRIORITY`] against the type map. Total: a base type listed in
//! no table classifies as `Unknown`.

use crate::config::TypeMapConfig;
use crate::ir::{Category, StringRepr, TypeClassification, TypeKind, WirePrimitive, CSTRING_BASE};
use tracing::trace;

/// Qualifier and sigil tokens removed before lookup
const STRIPPED_TOKENS: &[&str] = &["const", "volatile", "struct", "enum", "class", "union"];

/// Declared type text split into base type and qualifier flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedType {
    pub base_type: String,
    pub is_const: bool,
    pub pointer_depth: u8,
    pub is_reference: bool,
}

/// Strip `const`, pointer and reference tokens from declared type text
pub fn strip_type(raw: &str) -> StrippedType {
    let pointer_depth = raw.matches('*').count().min(u8::MAX as usize) as u8;
    let is_reference = raw.contains('&');

    let spaced = raw.replace(['*', '&'], " ");
    let mut is_const = false;
    let mut base = Vec::new();
    for token in spaced.split_whitespace() {
        if token == "const" {
            is_const = true;
        }
        if !STRIPPED_TOKENS.contains(&token) {
            base.push(token);
        }
    }

    StrippedType {
        base_type: base.join(" "),
        is_const,
        pointer_depth,
        is_reference,
    }
}

/// Native boolean types always travel as the boolean wire kind
fn is_boolean_flavoured(base_type: &str) -> bool {
    base_type == "bool" || base_type == "_Bool" || base_type.to_ascii_lowercase().ends_with("boolean")
}

/// Classifies declared types against a loaded type map
pub struct Classifier<'a> {
    config: &'a TypeMapConfig,
}

impl<'a> Classifier<'a> {
    /// Classifier backed by `config`
    pub fn new(config: &'a TypeMapConfig) -> Self {
        Self { config }
    }

    /// Classify `raw` as declared for `name` (a parameter name, or the
    /// function name for a return type)
    pub fn classify(&self, raw: &str, name: &str) -> TypeClassification {
        let stripped = strip_type(raw);
        let mut base_type = stripped.base_type;

        let kind = Category::PRIORITY
            .iter()
            .find_map(|category| self.kind_for(*category, &base_type))
            .unwrap_or(TypeKind::Unknown);

        if matches!(kind, TypeKind::String(StringRepr::CString)) {
            base_type = CSTRING_BASE.to_string();
        }
        if kind == TypeKind::Unknown {
            trace!(raw, name, base_type = %base_type, "unclassified type");
        }

        TypeClassification {
            kind,
            base_type,
            is_const: stripped.is_const,
            pointer_depth: stripped.pointer_depth,
            is_reference: stripped.is_reference,
        }
    }

    /// Kind for `base_type` if the table backing `category` lists it
    fn kind_for(&self, category: Category, base_type: &str) -> Option<TypeKind> {
        let config = self.config;
        if !config.lists(category, base_type) {
            return None;
        }
        let kind = match category {
            Category::Void => TypeKind::Void,
            Category::Error => TypeKind::Error,
            Category::String => {
                if config.string_types.iter().any(|t| t == base_type) {
                    TypeKind::String(StringRepr::Owned)
                } else {
                    TypeKind::String(StringRepr::CString)
                }
            }
            Category::ManagedHandle => TypeKind::ManagedHandle {
                registry_key: config.managed_handles.get(base_type)?.clone(),
            },
            Category::Handle => TypeKind::Handle {
                registry_key: config.handles.get(base_type)?.clone(),
            },
            Category::Primitive => {
                if is_boolean_flavoured(base_type) {
                    TypeKind::Primitive(WirePrimitive::Bool)
                } else {
                    TypeKind::Primitive(*config.primitives.get(base_type)?)
                }
            }
            Category::Enum => TypeKind::Enum,
            Category::Struct => TypeKind::Struct,
            Category::Unknown => return None,
        };
        Some(kind)
    }
}
