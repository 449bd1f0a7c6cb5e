//! Marshaling model
//!
//! Turns an extracted [`SuiteDescriptor`] into the classified shape both
//! generators render: which parameters travel in the request, which come back
//! in the response, how the return value is treated, and which functions had
//! to be left out.
//!
//! Excluding is fail-closed. A function whose return type or any parameter
//! cannot be marshaled exactly is recorded with a [`SkipReason`] and emitted
//! by neither generator.

use crate::classify::Classifier;
use crate::config::TypeMapConfig;
use crate::ir::{
    Category, DeclaratorShape, FunctionDescriptor, Optionality, StringRepr, SuiteDescriptor,
    TypeClassification, TypeKind,
};
use std::fmt;
use tracing::{debug, warn};

/// Field name of a directly returned value in the result record
pub const RESULT_FIELD: &str = "result";

/// How a function hands back its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnConvention {
    /// Returns the canonical error code; data comes through out-parameters
    ErrorCode,
    /// Returns `void`
    NoValue,
    /// Returns the value itself
    Direct(TypeClassification),
}

/// Why a function was excluded from generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Return type is unknown or cannot be marshaled
    UnsupportedReturn(String),
    /// A parameter's type is in none of the type-map tables
    UnknownParameter { param: String, ty: String },
    /// A parameter's declarator cannot be marshaled exactly
    Unsupported { param: String, detail: String },
    /// A parameter or the return uses a type listed in `ignored_types`
    IgnoredType(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedReturn(ty) => write!(f, "unsupported return type `{}`", ty),
            SkipReason::UnknownParameter { param, ty } => {
                write!(f, "parameter `{}` has unmapped type `{}`", param, ty)
            }
            SkipReason::Unsupported { param, detail } => {
                write!(f, "parameter `{}`: {}", param, detail)
            }
            SkipReason::IgnoredType(ty) => write!(f, "uses ignored type `{}`", ty),
        }
    }
}

/// A function left out of generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFunction {
    pub name: String,
    pub reason: SkipReason,
}

/// One classified parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalParam {
    pub name: String,
    /// Record key: the name itself, except for an output whose name is
    /// already taken in the result record
    pub key: String,
    /// Declared type text
    pub declared_type: String,
    pub class: TypeClassification,
    pub optionality: Optionality,
    pub is_output: bool,
}

impl MarshalParam {
    /// Handle input the caller may leave out
    pub fn is_optional(&self) -> bool {
        self.optionality == Optionality::Optional
    }
}

/// One field of a function's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultField {
    pub name: String,
    pub class: TypeClassification,
}

/// What the client receives back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    Void,
    /// Exactly one field, unwrapped by the client
    Single(ResultField),
    /// Several fields, returned as a record
    Record(Vec<ResultField>),
}

/// A function ready for generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalFunction {
    /// Native slot name
    pub native_name: String,
    /// Name used by the dispatcher and the client stub
    pub export_name: String,
    /// All parameters in native argument order
    pub params: Vec<MarshalParam>,
    pub convention: ReturnConvention,
    /// The extracted descriptor with every parameter classified
    pub descriptor: FunctionDescriptor,
}

impl MarshalFunction {
    /// Parameters carried in the request record
    pub fn inputs(&self) -> impl Iterator<Item = &MarshalParam> {
        self.params.iter().filter(|p| !p.is_output)
    }

    /// Parameters written back into the result record
    pub fn outputs(&self) -> impl Iterator<Item = &MarshalParam> {
        self.params.iter().filter(|p| p.is_output)
    }

    /// Result fields: `result` first for a direct return, then outputs in order
    pub fn result_fields(&self) -> Vec<ResultField> {
        let mut fields = Vec::new();
        if let ReturnConvention::Direct(class) = &self.convention {
            fields.push(ResultField {
                name: RESULT_FIELD.to_string(),
                class: class.clone(),
            });
        }
        fields.extend(self.outputs().map(|p| ResultField {
            name: p.key.clone(),
            class: p.class.clone(),
        }));
        fields
    }

    /// Void, a single unwrapped field, or a record
    pub fn result_shape(&self) -> ResultShape {
        let mut fields = self.result_fields();
        match fields.len() {
            0 => ResultShape::Void,
            1 => ResultShape::Single(fields.remove(0)),
            _ => ResultShape::Record(fields),
        }
    }
}

/// A suite ready for generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalSuite {
    pub name: String,
    /// Suite name without prefix, suffix and version; names the suite pointer
    pub short_name: String,
    pub functions: Vec<MarshalFunction>,
    pub skipped: Vec<SkippedFunction>,
}

impl MarshalSuite {
    /// Struct base types used by any generated function, first-seen order
    pub fn referenced_structs(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let classes = self.functions.iter().flat_map(|f| {
            let ret = match &f.convention {
                ReturnConvention::Direct(class) => Some(class),
                _ => None,
            };
            f.params.iter().map(|p| &p.class).chain(ret)
        });
        for class in classes {
            if class.kind == TypeKind::Struct && !names.contains(&class.base_type) {
                names.push(class.base_type.clone());
            }
        }
        names
    }
}

/// Builds the marshaling model from extracted suites
pub struct ModelBuilder<'a> {
    config: &'a TypeMapConfig,
    classifier: Classifier<'a>,
}

impl<'a> ModelBuilder<'a> {
    /// Builder classifying against `config`
    pub fn new(config: &'a TypeMapConfig) -> Self {
        Self {
            config,
            classifier: Classifier::new(config),
        }
    }

    /// Model for one suite. Never fails: functions that cannot be marshaled
    /// land in [`MarshalSuite::skipped`].
    pub fn build(&self, suite: &SuiteDescriptor) -> MarshalSuite {
        let conventions = &self.config.conventions;
        let mut functions = Vec::new();
        let mut skipped = Vec::new();

        for function in &suite.functions {
            match self.build_function(function) {
                Ok(marshal) => functions.push(marshal),
                Err(reason) => {
                    warn!(
                        suite = %suite.name,
                        function = %function.name,
                        reason = %reason,
                        "function skipped"
                    );
                    skipped.push(SkippedFunction {
                        name: function.name.clone(),
                        reason,
                    });
                }
            }
        }

        debug!(
            suite = %suite.name,
            generated = functions.len(),
            skipped = skipped.len(),
            "built marshaling model"
        );

        MarshalSuite {
            name: suite.name.clone(),
            short_name: conventions.short_suite_name(&suite.name),
            functions,
            skipped,
        }
    }

    fn build_function(&self, function: &FunctionDescriptor) -> Result<MarshalFunction, SkipReason> {
        let convention = self.return_convention(function)?;
        let export_name = self.config.conventions.export_name(&function.name);

        let mut descriptor = function.clone();
        let mut params = Vec::with_capacity(function.params.len());

        for param in descriptor.params.iter_mut() {
            let class = self.classifier.classify(&param.ty, &param.name);
            self.check_param(&param.name, &param.ty, param.shape, &class)?;

            let is_output = param.is_output();
            param.optionality = match class.category() {
                Category::Handle | Category::ManagedHandle if !is_output => {
                    let policy = &self.config.optional_handles;
                    if policy.is_optional(&function.name, &param.name)
                        || policy.is_optional(&export_name, &param.name)
                    {
                        Optionality::Optional
                    } else {
                        Optionality::Required
                    }
                }
                _ => Optionality::Unknown,
            };
            param.classification = Some(class.clone());

            params.push(MarshalParam {
                name: param.name.clone(),
                key: param.name.clone(),
                declared_type: param.ty.clone(),
                class,
                optionality: param.optionality,
                is_output,
            });
        }

        assign_result_keys(&convention, &mut params);

        Ok(MarshalFunction {
            native_name: function.name.clone(),
            export_name,
            params,
            convention,
            descriptor,
        })
    }

    fn return_convention(&self, function: &FunctionDescriptor) -> Result<ReturnConvention, SkipReason> {
        let class = self.classifier.classify(&function.return_type, &function.name);
        if self.config.is_ignored(&class.base_type) {
            return Err(SkipReason::IgnoredType(class.base_type));
        }

        let direct = match &class.kind {
            TypeKind::Error if !class.is_pointer() => return Ok(ReturnConvention::ErrorCode),
            TypeKind::Void if !class.is_pointer() => return Ok(ReturnConvention::NoValue),
            TypeKind::String(StringRepr::CString) => class.pointer_depth == 1,
            TypeKind::Handle { .. }
            | TypeKind::ManagedHandle { .. }
            | TypeKind::Primitive(_)
            | TypeKind::String(StringRepr::Owned)
            | TypeKind::Enum
            | TypeKind::Struct => !class.is_pointer() && !class.is_reference,
            _ => false,
        };

        if direct {
            Ok(ReturnConvention::Direct(class))
        } else {
            Err(SkipReason::UnsupportedReturn(function.return_type.clone()))
        }
    }

    fn check_param(
        &self,
        name: &str,
        declared: &str,
        shape: DeclaratorShape,
        class: &TypeClassification,
    ) -> Result<(), SkipReason> {
        let unsupported = |detail: &str| SkipReason::Unsupported {
            param: name.to_string(),
            detail: detail.to_string(),
        };

        match shape {
            DeclaratorShape::Simple => {}
            DeclaratorShape::Array => return Err(unsupported("array declarator")),
            DeclaratorShape::FunctionPointer => return Err(unsupported("function pointer")),
            DeclaratorShape::Variadic => return Err(unsupported("variadic arguments")),
        }

        if self.config.is_ignored(&class.base_type) {
            return Err(SkipReason::IgnoredType(class.base_type.clone()));
        }
        if class.pointer_depth > 1 {
            return Err(unsupported("pointer to pointer"));
        }

        match class.kind {
            TypeKind::Void if class.is_pointer() => Err(unsupported("untyped user data")),
            TypeKind::Void => Err(unsupported("void parameter")),
            TypeKind::Unknown => Err(SkipReason::UnknownParameter {
                param: name.to_string(),
                ty: declared.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Give every output a result-record key distinct from `result` and from
/// the other outputs, appending `_` until it is free
fn assign_result_keys(convention: &ReturnConvention, params: &mut [MarshalParam]) {
    let mut taken: Vec<String> = Vec::new();
    if matches!(convention, ReturnConvention::Direct(_)) {
        taken.push(RESULT_FIELD.to_string());
    }
    for param in params.iter_mut().filter(|p| p.is_output) {
        let mut key = param.name.clone();
        while taken.contains(&key) {
            key.push('_');
        }
        if key != param.name {
            debug!(param = %param.name, key = %key, "output renamed in result record");
        }
        taken.push(key.clone());
        param.key = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ParameterDescriptor, WirePrimitive};
    use pretty_assertions::assert_eq;

    fn config() -> TypeMapConfig {
        TypeMapConfig::new()
            .handle("ExampleWidgetH", "widgets")
            .handle("AEGP_LayerH", "layers")
            .primitive("A_long", WirePrimitive::Int32)
            .primitive("A_Boolean", WirePrimitive::UInt8)
            .struct_type("A_Time")
            .enum_type("AEGP_LayerQuality")
            .ignored_type("AEGP_PlatformWindowRef")
    }

    fn function(name: &str, ret: &str, params: &[(&str, &str)]) -> FunctionDescriptor {
        FunctionDescriptor::new("ExampleSuite", name, ret).with_params(
            params
                .iter()
                .map(|(n, t)| ParameterDescriptor::new(*n, *t))
                .collect(),
        )
    }

    fn build(functions: Vec<FunctionDescriptor>) -> MarshalSuite {
        let config = config();
        let suite = SuiteDescriptor {
            name: "ExampleSuite".into(),
            functions,
        };
        ModelBuilder::new(&config).build(&suite)
    }

    #[test]
    fn test_error_convention_single_output() {
        let suite = build(vec![function(
            "GetWidgetCount",
            "A_Err",
            &[("widget", "ExampleWidgetH"), ("count", "A_long*")],
        )]);
        assert_eq!(suite.short_name, "Example");
        let f = &suite.functions[0];
        assert_eq!(f.convention, ReturnConvention::ErrorCode);
        assert_eq!(f.inputs().count(), 1);

        match f.result_shape() {
            ResultShape::Single(field) => {
                assert_eq!(field.name, "count");
                assert_eq!(field.class.kind, TypeKind::Primitive(WirePrimitive::Int32));
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_multiple_outputs_form_a_record() {
        let suite = build(vec![function(
            "AEGP_GetBounds",
            "A_Err",
            &[("widget", "ExampleWidgetH"), ("left", "A_long*"), ("right", "A_long*")],
        )]);
        let f = &suite.functions[0];
        assert_eq!(f.export_name, "GetBounds");
        match f.result_shape() {
            ResultShape::Record(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["left", "right"]);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_direct_value_with_outputs() {
        let suite = build(vec![
            function("GetDefaultWidget", "ExampleWidgetH", &[]),
            function("GetQuality", "AEGP_LayerQuality", &[("time", "A_Time*")]),
        ]);

        let default_widget = &suite.functions[0];
        assert!(matches!(default_widget.convention, ReturnConvention::Direct(_)));
        match default_widget.result_shape() {
            ResultShape::Single(field) => assert_eq!(field.name, RESULT_FIELD),
            other => panic!("unexpected shape {:?}", other),
        }

        match suite.functions[1].result_shape() {
            ResultShape::Record(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["result", "time"]);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_void_function_without_outputs() {
        let suite = build(vec![function("Ping", "void", &[("widget", "ExampleWidgetH")])]);
        assert_eq!(suite.functions[0].convention, ReturnConvention::NoValue);
        assert_eq!(suite.functions[0].result_shape(), ResultShape::Void);
    }

    #[test]
    fn test_fail_closed_exclusions() {
        let suite = build(vec![
            function("Mystery", "PF_Mystery", &[]),
            function("TakesUnknown", "A_Err", &[("m", "PF_Mystery")]),
            function("TakesRefcon", "A_Err", &[("refcon", "void*")]),
            function("TakesWindow", "A_Err", &[("w", "AEGP_PlatformWindowRef")]),
            function("TakesDouble", "A_Err", &[("pp", "A_long**")]),
            function("TakesArray", "A_Err", &[]).with_params(vec![
                ParameterDescriptor::new("counts", "A_long").with_shape(DeclaratorShape::Array),
            ]),
        ]);

        assert!(suite.functions.is_empty());
        let reasons: Vec<_> = suite.skipped.iter().map(|s| &s.reason).collect();
        assert!(matches!(reasons[0], SkipReason::UnsupportedReturn(_)));
        assert!(matches!(reasons[1], SkipReason::UnknownParameter { .. }));
        assert!(matches!(reasons[2], SkipReason::Unsupported { .. }));
        assert!(matches!(reasons[3], SkipReason::IgnoredType(_)));
        assert!(matches!(reasons[4], SkipReason::Unsupported { .. }));
        assert!(matches!(reasons[5], SkipReason::Unsupported { .. }));
    }

    #[test]
    fn test_handle_optionality() {
        let suite = build(vec![function(
            "AEGP_ReorderLayer",
            "A_Err",
            &[
                ("layerH", "AEGP_LayerH"),
                ("parent_layerH", "AEGP_LayerH"),
                ("count", "A_long"),
            ],
        )]);
        let params = &suite.functions[0].params;
        assert_eq!(params[0].optionality, Optionality::Required);
        assert_eq!(params[1].optionality, Optionality::Optional);
        assert_eq!(params[2].optionality, Optionality::Unknown);
        assert_eq!(suite.functions[0].descriptor.params[1].optionality, Optionality::Optional);
        assert!(suite.functions[0].descriptor.params[0].classification.is_some());
    }

    #[test]
    fn test_referenced_structs_dedup() {
        let suite = build(vec![
            function("SetTime", "A_Err", &[("t", "const A_Time*")]),
            function("GetTime", "A_Err", &[("t", "A_Time*")]),
        ]);
        assert_eq!(suite.referenced_structs(), vec!["A_Time".to_string()]);
    }

    #[test]
    fn test_output_named_result_gets_distinct_key() {
        let suite = build(vec![
            function("GetTwo", "A_long", &[("args", "ExampleWidgetH"), ("result", "A_long*")]),
            function("GetStatus", "A_Err", &[("result", "A_long*")]),
        ]);

        let two = &suite.functions[0];
        match two.result_shape() {
            ResultShape::Record(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["result", "result_"]);
            }
            other => panic!("unexpected shape {:?}", other),
        }
        assert_eq!(two.params[1].name, "result");
        assert_eq!(two.params[1].key, "result_");

        // no direct value, so the name is free
        assert_eq!(suite.functions[1].params[0].key, "result");
    }

    #[test]
    fn test_pointer_returns() {
        let suite = build(vec![
            function("GetLabel", "const char*", &[]),
            function("GetPtr", "ExampleWidgetH*", &[]),
            function("GetNames", "A_char **", &[]),
        ]);
        let generated: Vec<_> = suite.functions.iter().map(|f| f.native_name.as_str()).collect();
        assert_eq!(generated, vec!["GetLabel"]);
        match &suite.functions[0].convention {
            ReturnConvention::Direct(class) => {
                assert_eq!(class.kind, TypeKind::String(StringRepr::CString))
            }
            other => panic!("unexpected convention {:?}", other),
        }

        let skipped: Vec<_> = suite.skipped.iter().map(|s| (s.name.as_str(), &s.reason)).collect();
        assert_eq!(
            skipped,
            vec![
                ("GetPtr", &SkipReason::UnsupportedReturn("ExampleWidgetH*".into())),
                ("GetNames", &SkipReason::UnsupportedReturn("A_char **".into())),
            ]
        );
    }
}
