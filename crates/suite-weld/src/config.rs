//! Type-map configuration
//!
//! The type map is the single source of truth the classifier consults. It is
//! loaded once per run (JSON or TOML) and shared read-only by every stage.
//! Supporting a new native type means adding one entry here.
//!
//! ```json
//! {
//!   "handles": { "AEGP_LayerH": "layers", "AEGP_CompH": "comps" },
//!   "managed_handles": { "AEGP_StreamValue2": "stream_values" },
//!   "primitives": { "A_long": "int32", "A_FpLong": "double", "A_Boolean": "uint8" },
//!   "structs": { "A_Time": "object" },
//!   "enums": ["AEGP_LayerQuality"],
//!   "string_types": ["AEGP_MemHandle"],
//!   "ignored_types": ["AEGP_PlatformWindowRef"]
//! }
//! ```

use crate::error::WeldError;
use crate::ir::{Category, FieldSpec, StructFieldTable, WirePrimitive, CSTRING_BASE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Naming and code-shape conventions of the native SDK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConventions {
    /// Prefix stripped from suite names to form the short name
    pub suite_prefix: String,
    /// Suffix marking an aggregate as a suite; may be followed by a version number
    pub suite_suffix: String,
    /// Prefix stripped from function names to form client stub names
    pub function_prefix: String,
    /// Function slots whose name starts with this are skipped
    pub reserved_prefix: String,
    /// Canonical error-code type
    pub error_type: String,
    /// Error-code constant meaning success
    pub error_none: String,
    /// Macro tokens removed before parsing
    pub strip_macros: Vec<String>,
    /// Aliases of `char`; pointers to them are raw C strings
    pub char_types: Vec<String>,
    /// Header providing the handle registry, error types and suite pointers
    pub runtime_header: String,
    /// Module exporting the client transport function
    pub transport_module: String,
    /// Name of the transport function
    pub transport_function: String,
    /// Size of `char*` output buffers
    pub string_buffer_size: usize,
    /// C++ namespace of the generated wrappers
    pub namespace: String,
}

impl Default for SuiteConventions {
    fn default() -> Self {
        Self {
            suite_prefix: "AEGP_".to_string(),
            suite_suffix: "Suite".to_string(),
            function_prefix: "AEGP_".to_string(),
            reserved_prefix: "reserved".to_string(),
            error_type: "A_Err".to_string(),
            error_none: "A_Err_NONE".to_string(),
            strip_macros: vec!["SPAPI".to_string()],
            char_types: vec!["A_char".to_string()],
            runtime_header: "SuiteBridgeRuntime.h".to_string(),
            transport_module: "./transport".to_string(),
            transport_function: "callSuite".to_string(),
            string_buffer_size: 256,
            namespace: "suite_bridge".to_string(),
        }
    }
}

impl SuiteConventions {
    /// Whether an aggregate name marks a suite (`FooSuite`, `AEGP_FooSuite4`)
    pub fn is_suite_name(&self, name: &str) -> bool {
        let unversioned = name.trim_end_matches(|c: char| c.is_ascii_digit());
        unversioned.len() > self.suite_suffix.len() && unversioned.ends_with(&self.suite_suffix)
    }

    /// Version number trailing the suite suffix, if any
    pub fn suite_version(&self, name: &str) -> Option<u32> {
        let unversioned = name.trim_end_matches(|c: char| c.is_ascii_digit());
        name[unversioned.len()..].parse().ok()
    }

    /// Suite name without prefix, suffix and version: `AEGP_LayerSuite9` -> `Layer`
    pub fn short_suite_name(&self, name: &str) -> String {
        let unversioned = name.trim_end_matches(|c: char| c.is_ascii_digit());
        let base = unversioned
            .strip_suffix(&self.suite_suffix)
            .unwrap_or(unversioned);
        let base = base.strip_prefix(&self.suite_prefix).unwrap_or(base);
        if base.is_empty() {
            name.to_string()
        } else {
            base.to_string()
        }
    }

    /// Client-facing function name: `AEGP_GetLayerName` -> `GetLayerName`
    pub fn export_name(&self, function: &str) -> String {
        match function.strip_prefix(&self.function_prefix) {
            Some(rest) if !rest.is_empty() => rest.to_string(),
            _ => function.to_string(),
        }
    }

    /// Whether a function slot is a reserved placeholder
    pub fn is_reserved(&self, function: &str) -> bool {
        !self.reserved_prefix.is_empty()
            && function
                .to_ascii_lowercase()
                .starts_with(&self.reserved_prefix.to_ascii_lowercase())
    }
}

/// Declarative allow-list deciding which handle parameters may be absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionalHandlePolicy {
    /// Exact parameter names, or `Function.param` for a single slot
    pub names: Vec<String>,
    /// Case-insensitive substrings of parameter names
    pub substrings: Vec<String>,
}

impl Default for OptionalHandlePolicy {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            substrings: ["parent", "sibling", "before", "insert", "position"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl OptionalHandlePolicy {
    /// Whether `param` of `function` may be absent at the call site
    pub fn is_optional(&self, function: &str, param: &str) -> bool {
        let qualified = format!("{}.{}", function, param);
        if self.names.iter().any(|n| *n == param || *n == qualified) {
            return true;
        }
        let lowered = param.to_ascii_lowercase();
        self.substrings
            .iter()
            .any(|s| !s.is_empty() && lowered.contains(&s.to_ascii_lowercase()))
    }
}

/// A base type listed under more than one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConflict {
    pub base_type: String,
    /// Categories in priority order; the first one wins
    pub categories: Vec<Category>,
}

impl TypeConflict {
    /// Category the classifier resolves the type to
    pub fn winner(&self) -> Category {
        self.categories[0]
    }
}

/// The declarative type-mapping table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMapConfig {
    /// Opaque handle types and their registry keys
    pub handles: IndexMap<String, String>,
    /// Resource-owning value types exchanged as ids, and their registry keys
    pub managed_handles: IndexMap<String, String>,
    /// Numeric/boolean scalars and their wire kinds
    pub primitives: IndexMap<String, WirePrimitive>,
    /// Struct types marshaled as objects
    pub structs: IndexMap<String, String>,
    /// Integer-backed enum types
    pub enums: Vec<String>,
    /// Owned string types
    pub string_types: Vec<String>,
    /// Types whose functions are excluded entirely
    pub ignored_types: Vec<String>,
    /// Field tables layered over the built-in ones
    pub struct_fields: IndexMap<String, Vec<FieldSpec>>,
    pub optional_handles: OptionalHandlePolicy,
    pub conventions: SuiteConventions,
}

impl TypeMapConfig {
    /// Empty type map with default conventions
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a type map from a `.json` or `.toml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WeldError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| WeldError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
        .map_err(|message| WeldError::Config {
            path: path.to_path_buf(),
            message,
        })?;

        debug!(
            path = %path.display(),
            handles = config.handles.len(),
            primitives = config.primitives.len(),
            structs = config.structs.len(),
            "loaded type map"
        );
        config.report_conflicts();
        Ok(config)
    }

    /// Parse a JSON type map; the error is the parser's message
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// Parse a TOML type map; the error is the parser's message
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Map an opaque handle type to its registry key
    pub fn handle(mut self, base_type: impl Into<String>, registry_key: impl Into<String>) -> Self {
        self.handles.insert(base_type.into(), registry_key.into());
        self
    }

    /// Map a resource-owning value type to its registry key
    pub fn managed_handle(
        mut self,
        base_type: impl Into<String>,
        registry_key: impl Into<String>,
    ) -> Self {
        self.managed_handles
            .insert(base_type.into(), registry_key.into());
        self
    }

    /// Map a scalar type to its wire kind
    pub fn primitive(mut self, base_type: impl Into<String>, wire: WirePrimitive) -> Self {
        self.primitives.insert(base_type.into(), wire);
        self
    }

    /// Mark a type as a struct marshaled as a nested record
    pub fn struct_type(mut self, base_type: impl Into<String>) -> Self {
        self.structs.insert(base_type.into(), "object".to_string());
        self
    }

    /// Mark a type as an integer-backed enum
    pub fn enum_type(mut self, base_type: impl Into<String>) -> Self {
        self.enums.push(base_type.into());
        self
    }

    /// Mark a type as an owned string
    pub fn string_type(mut self, base_type: impl Into<String>) -> Self {
        self.string_types.push(base_type.into());
        self
    }

    /// Exclude every function that uses this type
    pub fn ignored_type(mut self, base_type: impl Into<String>) -> Self {
        self.ignored_types.push(base_type.into());
        self
    }

    /// Whether `base_type` is listed in the table backing `category`.
    ///
    /// Built-in members (`void`, the error type, `char` and its aliases)
    /// count as listed.
    pub fn lists(&self, category: Category, base_type: &str) -> bool {
        match category {
            Category::Void => base_type == "void",
            Category::Error => base_type == self.conventions.error_type,
            Category::String => {
                self.string_types.iter().any(|t| t == base_type) || self.is_char_type(base_type)
            }
            Category::ManagedHandle => self.managed_handles.contains_key(base_type),
            Category::Handle => self.handles.contains_key(base_type),
            Category::Primitive => self.primitives.contains_key(base_type),
            Category::Enum => self.enums.iter().any(|t| t == base_type),
            Category::Struct => self.structs.contains_key(base_type),
            Category::Unknown => false,
        }
    }

    /// `char` or one of its configured aliases
    pub fn is_char_type(&self, base_type: &str) -> bool {
        base_type == CSTRING_BASE || self.conventions.char_types.iter().any(|t| t == base_type)
    }

    /// Whether functions using `base_type` are excluded
    pub fn is_ignored(&self, base_type: &str) -> bool {
        self.ignored_types.iter().any(|t| t == base_type)
    }

    /// Base types listed under more than one category
    pub fn conflicts(&self) -> Vec<TypeConflict> {
        let mut names: Vec<&str> = Vec::new();
        names.extend(self.handles.keys().map(String::as_str));
        names.extend(self.managed_handles.keys().map(String::as_str));
        names.extend(self.primitives.keys().map(String::as_str));
        names.extend(self.structs.keys().map(String::as_str));
        names.extend(self.enums.iter().map(String::as_str));
        names.extend(self.string_types.iter().map(String::as_str));

        let mut seen = std::collections::HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(*name))
            .filter_map(|name| {
                let categories: Vec<Category> = Category::PRIORITY
                    .iter()
                    .copied()
                    .filter(|c| self.lists(*c, name))
                    .collect();
                (categories.len() > 1).then(|| TypeConflict {
                    base_type: name.to_string(),
                    categories,
                })
            })
            .collect()
    }

    fn report_conflicts(&self) {
        for conflict in self.conflicts() {
            warn!(
                base_type = %conflict.base_type,
                categories = ?conflict.categories,
                winner = %conflict.winner(),
                "type map lists a base type under several categories"
            );
        }
    }

    /// Struct field tables: built-ins plus `struct_fields`
    pub fn struct_field_table(&self) -> StructFieldTable {
        StructFieldTable::with_overrides(
            self.struct_fields
                .iter()
                .map(|(name, specs)| (name.clone(), specs.iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_suite_naming() {
        let c = SuiteConventions::default();
        assert!(c.is_suite_name("AEGP_LayerSuite9"));
        assert!(c.is_suite_name("ExampleSuite"));
        assert!(!c.is_suite_name("Suite"));
        assert!(!c.is_suite_name("AEGP_LayerFlags"));

        assert_eq!(c.short_suite_name("AEGP_LayerSuite9"), "Layer");
        assert_eq!(c.short_suite_name("ExampleSuite"), "Example");
        assert_eq!(c.suite_version("AEGP_LayerSuite9"), Some(9));
        assert_eq!(c.suite_version("ExampleSuite"), None);

        assert_eq!(c.export_name("AEGP_GetLayerName"), "GetLayerName");
        assert_eq!(c.export_name("GetWidgetCount"), "GetWidgetCount");
        assert!(c.is_reserved("reserved0"));
        assert!(c.is_reserved("Reserved_Slot"));
        assert!(!c.is_reserved("GetReservedCount"));
    }

    #[test]
    fn test_optional_handle_policy() {
        let policy = OptionalHandlePolicy {
            names: vec!["targetH".into(), "Duplicate.srcH".into()],
            substrings: vec!["parent".into()],
        };
        assert!(policy.is_optional("Any", "targetH"));
        assert!(policy.is_optional("Duplicate", "srcH"));
        assert!(!policy.is_optional("Other", "srcH"));
        assert!(policy.is_optional("SetParent", "ParentLayerH"));
        assert!(!policy.is_optional("SetParent", "layerH"));
    }

    #[test]
    fn test_parse_json() {
        let config = TypeMapConfig::from_json_str(
            r#"{
                "handles": { "AEGP_LayerH": "layers" },
                "primitives": { "A_long": "int32", "A_FpLong": "double" },
                "structs": { "A_Time": "object" },
                "string_types": ["AEGP_MemHandle"],
                "conventions": { "error_type": "PF_Err", "error_none": "PF_Err_NONE" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.handles["AEGP_LayerH"], "layers");
        assert_eq!(config.primitives["A_FpLong"], WirePrimitive::Float64);
        assert!(config.lists(Category::Struct, "A_Time"));
        assert_eq!(config.conventions.error_type, "PF_Err");
        // untouched conventions keep their defaults
        assert_eq!(config.conventions.suite_suffix, "Suite");
        assert!(config.ignored_types.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let config = TypeMapConfig::from_toml_str(
            r#"
            string_types = ["AEGP_MemHandle"]
            enums = ["AEGP_LayerQuality"]

            [handles]
            AEGP_CompH = "comps"

            [primitives]
            A_Boolean = "uint8"

            [[struct_fields.PF_Point]]
            name = "h"
            kind = "int32"

            [[struct_fields.PF_Point]]
            name = "v"
            kind = "int32"
            "#,
        )
        .unwrap();

        assert_eq!(config.handles["AEGP_CompH"], "comps");
        assert!(config.lists(Category::Enum, "AEGP_LayerQuality"));
        let layout = config.struct_field_table().layout("PF_Point");
        assert!(layout.known);
        assert_eq!(layout.fields.len(), 2);
    }

    #[test]
    fn test_conflicts_follow_priority() {
        let config = TypeMapConfig::new()
            .primitive("A_char", WirePrimitive::Int8)
            .string_type("A_char")
            .handle("AEGP_ItemH", "items");

        let conflicts = config.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].base_type, "A_char");
        assert_eq!(
            conflicts[0].categories,
            vec![Category::String, Category::Primitive]
        );
        assert_eq!(conflicts[0].winner(), Category::String);
    }

    #[test]
    fn test_load_names_path_on_error() {
        let missing = std::env::temp_dir().join("suite-weld-no-such-types.json");
        let err = TypeMapConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("suite-weld-no-such-types.json"));

        let mut bad = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(bad, "{{ not json").unwrap();
        let err = TypeMapConfig::load(bad.path()).unwrap_err();
        assert!(matches!(err, WeldError::Config { .. }));
    }
}
