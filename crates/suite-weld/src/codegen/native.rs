//! Native wrapper generator
//!
//! Emits, per suite, `<Suite>Bridge.h` and `<Suite>Bridge.cpp`: one marshaling
//! function per generated suite function, taking and returning
//! `nlohmann::ordered_json`, plus a name-based dispatcher.
//!
//! The generated code relies on the runtime header named by
//! `SuiteConventions::runtime_header`, which must provide:
//!
//! - `Handles()`, the handle registry: `Lookup<T>(key, id) -> T`,
//!   `Register(key, T) -> int64_t`, `LookupManaged<T>(key, id) -> T*`,
//!   `AdoptManaged(key, T&&) -> int64_t`
//! - `ToWireString(const T&) -> std::string` for configured string types
//! - `InvalidHandleError(key, id)`, `SuiteCallError(code, suite, function)`,
//!   `MethodNotFoundError(suite, method)`, `SuiteNotFoundError(suite)`
//! - the suite pointer `s<ShortSuiteName>` for every generated suite

use crate::config::SuiteConventions;
use crate::ir::{FieldKind, StringRepr, StructFieldTable, TypeClassification, TypeKind};
use crate::model::{MarshalFunction, MarshalParam, MarshalSuite, ReturnConvention, RESULT_FIELD};

/// Generated declaration and definition files for one suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeWrapper {
    pub header_name: String,
    pub header: String,
    pub source_name: String,
    pub source: String,
}

/// Name of the dispatch function generated for a suite
pub fn dispatch_function_name(suite: &str) -> String {
    format!("Dispatch{}", suite)
}

/// Base name shared by a suite's generated native files
pub fn bridge_file_stem(suite: &str) -> String {
    format!("{}Bridge", suite)
}

/// Generator for native marshaling wrappers
pub struct NativeGenerator<'a> {
    suite: &'a MarshalSuite,
    conventions: &'a SuiteConventions,
    structs: &'a StructFieldTable,
}

impl<'a> NativeGenerator<'a> {
    /// Generator for one suite's wrapper pair
    pub fn new(
        suite: &'a MarshalSuite,
        conventions: &'a SuiteConventions,
        structs: &'a StructFieldTable,
    ) -> Self {
        Self {
            suite,
            conventions,
            structs,
        }
    }

    /// Render the declaration and definition files
    pub fn generate(&self) -> NativeWrapper {
        let stem = bridge_file_stem(&self.suite.name);
        let header_name = format!("{}.h", stem);
        NativeWrapper {
            header: self.generate_header(),
            source: self.generate_source(&header_name),
            source_name: format!("{}.cpp", stem),
            header_name,
        }
    }

    fn wrapper_name(&self, function: &MarshalFunction) -> String {
        format!("{}_{}", self.suite.name, function.export_name)
    }

    fn suite_pointer(&self) -> String {
        format!("s{}", self.suite.short_name)
    }

    fn generate_header(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "// Auto-generated native bridge for {}\n// Generated by suite-weld - do not edit manually\n\n",
            self.suite.name
        ));
        output.push_str("#pragma once\n\n");
        output.push_str("#include <string>\n\n#include <nlohmann/json.hpp>\n\n");
        output.push_str(&format!("namespace {} {{\n\n", self.conventions.namespace));
        output.push_str("using Json = nlohmann::ordered_json;\n\n");

        for function in &self.suite.functions {
            output.push_str(&format!(
                "Json {}(const Json& args);\n",
                self.wrapper_name(function)
            ));
        }
        if !self.suite.functions.is_empty() {
            output.push('\n');
        }

        output.push_str(&format!(
            "Json {}(const std::string& method, const Json& args);\n\n",
            dispatch_function_name(&self.suite.name)
        ));
        output.push_str(&format!("}}  // namespace {}\n", self.conventions.namespace));
        output
    }

    fn generate_source(&self, header_name: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "// Auto-generated native bridge for {}\n// Generated by suite-weld - do not edit manually\n\n",
            self.suite.name
        ));
        output.push_str(&format!("#include \"{}\"\n", header_name));
        output.push_str(&format!("#include \"{}\"\n\n", self.conventions.runtime_header));
        output.push_str("#include <cstdint>\n#include <string>\n#include <utility>\n#include <vector>\n\n");

        if !self.suite.skipped.is_empty() {
            output.push_str("// Skipped functions:\n");
            for skipped in &self.suite.skipped {
                output.push_str(&format!("//   {}: {}\n", skipped.name, skipped.reason));
            }
            output.push('\n');
        }

        output.push_str(&format!("namespace {} {{\n\n", self.conventions.namespace));

        for function in &self.suite.functions {
            output.push_str(&self.generate_function(function));
            output.push('\n');
        }

        output.push_str(&self.generate_dispatch());
        output.push_str(&format!("\n}}  // namespace {}\n", self.conventions.namespace));
        output
    }

    fn generate_function(&self, function: &MarshalFunction) -> String {
        let mut body = String::new();
        let mut call_args = Vec::with_capacity(function.params.len());

        for param in &function.params {
            if param.is_output {
                body.push_str(&self.output_local(param));
                call_args.push(output_arg(param));
            } else {
                body.push_str(&self.input_local(param));
                call_args.push(input_arg(param));
            }
        }

        let call = format!(
            "{}->{}({})",
            self.suite_pointer(),
            function.native_name,
            call_args.join(", ")
        );

        body.push_str("\n    Json response = Json::object();\n");
        match &function.convention {
            ReturnConvention::ErrorCode => {
                body.push_str(&format!(
                    "    const {} status = {};\n",
                    self.conventions.error_type, call
                ));
                body.push_str(&format!(
                    "    if (status != {}) {{\n        throw SuiteCallError(static_cast<int64_t>(status), \"{}\", \"{}\");\n    }}\n",
                    self.conventions.error_none, self.suite.name, function.native_name
                ));
            }
            ReturnConvention::NoValue => {
                body.push_str(&format!("    {};\n", call));
            }
            ReturnConvention::Direct(class) => {
                body.push_str(&format!("    auto {} = {};\n", RESULT_FIELD, call));
                body.push_str(&self.marshal_direct(class));
            }
        }

        for param in function.outputs() {
            body.push_str(&self.marshal_output(param));
        }
        body.push_str("    return response;\n");

        format!(
            "Json {}(const Json& args) {{\n{}}}\n",
            self.wrapper_name(function),
            body
        )
    }

    fn generate_dispatch(&self) -> String {
        let mut output = format!(
            "Json {}(const std::string& method, const Json& args) {{\n",
            dispatch_function_name(&self.suite.name)
        );
        for function in &self.suite.functions {
            output.push_str(&format!(
                "    if (method == \"{}\") {{\n        return {}(args);\n    }}\n",
                function.export_name,
                self.wrapper_name(function)
            ));
        }
        output.push_str(&format!(
            "    throw MethodNotFoundError(\"{}\", method);\n}}\n",
            self.suite.name
        ));
        output
    }

    /// Local declaration filled from the request for one input
    fn input_local(&self, param: &MarshalParam) -> String {
        let key = &param.key;
        let local = local_name(param);
        let class = &param.class;
        let ty = &class.base_type;
        let arg = format!("args.at(\"{}\")", key);

        match &class.kind {
            TypeKind::Handle { registry_key } => {
                let lookup = format!(
                    "Handles().Lookup<{}>(\"{}\", {}.get<int64_t>())",
                    ty, registry_key, arg
                );
                let check = invalid_handle_check(&local, registry_key, &arg);
                if param.is_optional() {
                    optional_handle(key, &local, &format!("{} {} = nullptr;", ty, local), &lookup, &check)
                } else {
                    required_handle(key, registry_key, &format!("{} {} = {};", ty, local, lookup), &check)
                }
            }
            TypeKind::ManagedHandle { registry_key } => {
                let lookup = format!(
                    "Handles().LookupManaged<{}>(\"{}\", {}.get<int64_t>())",
                    ty, registry_key, arg
                );
                let check = invalid_handle_check(&local, registry_key, &arg);
                // a by-value managed argument is dereferenced and cannot be absent
                if param.is_optional() && class.is_pointer() {
                    optional_handle(key, &local, &format!("{}* {} = nullptr;", ty, local), &lookup, &check)
                } else {
                    required_handle(key, registry_key, &format!("{}* {} = {};", ty, local, lookup), &check)
                }
            }
            TypeKind::String(StringRepr::Owned) => {
                format!("    {} {}{{{}.get<std::string>()}};\n", ty, local, arg)
            }
            TypeKind::String(StringRepr::CString) => {
                format!("    const std::string {} = {}.get<std::string>();\n", local, arg)
            }
            TypeKind::Primitive(wire) => format!(
                "    {} {} = static_cast<{}>({}.get<{}>());\n",
                ty,
                local,
                ty,
                arg,
                wire.cpp_wire_type()
            ),
            TypeKind::Enum => format!(
                "    {} {} = static_cast<{}>({}.get<int64_t>());\n",
                ty, local, ty, arg
            ),
            TypeKind::Struct => {
                let layout = self.structs.layout(ty);
                let mut out = format!("    {} {}{{}};\n", ty, local);
                if !layout.known {
                    out.push_str(&format!(
                        "    // WARNING: no field table for {}; `{}` is passed default-initialised\n",
                        ty, key
                    ));
                    return out;
                }
                out.push_str(&format!("    {{\n        const Json& record = {};\n", arg));
                for field in &layout.fields {
                    if let FieldKind::Primitive(wire) = field.kind {
                        out.push_str(&format!(
                            "        {local}.{field} = static_cast<decltype({local}.{field})>(record.at(\"{field}\").get<{wire}>());\n",
                            local = local,
                            field = field.name,
                            wire = wire.cpp_wire_type()
                        ));
                    }
                }
                out.push_str("    }\n");
                out
            }
            TypeKind::Error => format!(
                "    // WARNING: error code passed as an input\n    {} {} = static_cast<{}>({}.get<int64_t>());\n",
                ty, local, ty, arg
            ),
            TypeKind::Void | TypeKind::Unknown => format!(
                "    // WARNING: `{}` has no marshal; passed default-initialised\n    {} {}{{}};\n",
                key, ty, local
            ),
        }
    }

    /// Default-initialised local the callee writes through
    fn output_local(&self, param: &MarshalParam) -> String {
        let local = local_name(param);
        let ty = &param.class.base_type;
        match &param.class.kind {
            TypeKind::Handle { .. } => format!("    {} {} = nullptr;\n", ty, local),
            TypeKind::Error => format!("    {} {} = {};\n", ty, local, self.conventions.error_none),
            TypeKind::String(StringRepr::CString) => format!(
                "    std::vector<char> {}({}, '\\0');\n",
                local, self.conventions.string_buffer_size
            ),
            _ => format!("    {} {}{{}};\n", ty, local),
        }
    }

    fn marshal_output(&self, param: &MarshalParam) -> String {
        let local = local_name(param);
        let value = match &param.class.kind {
            TypeKind::String(StringRepr::CString) => format!("std::string({}.data())", local),
            _ => local,
        };
        self.marshal_value(&param.key, &value, &param.class)
    }

    fn marshal_direct(&self, class: &TypeClassification) -> String {
        let value = match &class.kind {
            TypeKind::String(StringRepr::CString) => format!(
                "std::string({r} != nullptr ? {r} : \"\")",
                r = RESULT_FIELD
            ),
            _ => RESULT_FIELD.to_string(),
        };
        self.marshal_value(RESULT_FIELD, &value, class)
    }

    /// Write one native value into `response[key]`
    fn marshal_value(&self, key: &str, value: &str, class: &TypeClassification) -> String {
        match &class.kind {
            TypeKind::Handle { registry_key } => format!(
                "    response[\"{key}\"] = {v} != nullptr ? Handles().Register(\"{reg}\", {v}) : int64_t{{-1}};\n",
                key = key,
                v = value,
                reg = registry_key
            ),
            TypeKind::ManagedHandle { registry_key } => format!(
                "    response[\"{}\"] = Handles().AdoptManaged(\"{}\", std::move({}));\n",
                key, registry_key, value
            ),
            TypeKind::String(StringRepr::Owned) => {
                format!("    response[\"{}\"] = ToWireString({});\n", key, value)
            }
            TypeKind::String(StringRepr::CString) => {
                format!("    response[\"{}\"] = {};\n", key, value)
            }
            TypeKind::Primitive(wire) => format!(
                "    response[\"{}\"] = static_cast<{}>({});\n",
                key,
                wire.cpp_wire_type(),
                value
            ),
            TypeKind::Enum | TypeKind::Error => {
                format!("    response[\"{}\"] = static_cast<int64_t>({});\n", key, value)
            }
            TypeKind::Struct => {
                let layout = self.structs.layout(&class.base_type);
                let mut out = String::from("    {\n        Json record = Json::object();\n");
                if layout.known {
                    for field in &layout.fields {
                        if let FieldKind::Primitive(wire) = field.kind {
                            out.push_str(&format!(
                                "        record[\"{f}\"] = static_cast<{w}>({v}.{f});\n",
                                f = field.name,
                                w = wire.cpp_wire_type(),
                                v = value
                            ));
                        }
                    }
                } else {
                    out.push_str(&format!(
                        "        // WARNING: no field table for {}; contents are not marshaled\n",
                        class.base_type
                    ));
                    for field in &layout.fields {
                        out.push_str(&format!("        record[\"{}\"] = nullptr;\n", field.name));
                    }
                }
                out.push_str(&format!("        response[\"{}\"] = record;\n    }}\n", key));
                out
            }
            TypeKind::Void | TypeKind::Unknown => {
                format!("    // WARNING: `{}` has no marshal\n", key)
            }
        }
    }
}

/// C++ local holding a parameter. The prefix keeps parameter names clear of
/// the wrapper's own `args`, `response`, `status` and `result`.
fn local_name(param: &MarshalParam) -> String {
    format!("p_{}", param.name)
}

/// Throws when a looked-up handle does not resolve
fn invalid_handle_check(local: &str, registry_key: &str, arg: &str) -> String {
    format!(
        "if ({} == nullptr) {{\n        throw InvalidHandleError(\"{}\", {}.get<int64_t>());\n    }}",
        local, registry_key, arg
    )
}

/// Required handle lookup: an absent key or `null` is an invalid handle
fn required_handle(key: &str, registry_key: &str, declaration: &str, check: &str) -> String {
    format!(
        "    if (!args.contains(\"{k}\") || args.at(\"{k}\").is_null()) {{\n        throw InvalidHandleError(\"{reg}\", int64_t{{-1}});\n    }}\n    {decl}\n    {check}\n",
        k = key,
        reg = registry_key,
        decl = declaration,
        check = check
    )
}

/// Optional handle lookup: absent key, `null` or a negative id leave it null
fn optional_handle(key: &str, local: &str, declaration: &str, lookup: &str, check: &str) -> String {
    format!(
        "    {decl}\n    if (args.contains(\"{k}\") && !args.at(\"{k}\").is_null() && args.at(\"{k}\").get<int64_t>() >= 0) {{\n        {local} = {lookup};\n        {check}\n    }}\n",
        decl = declaration,
        k = key,
        local = local,
        lookup = lookup,
        check = check.replace("\n", "\n    ")
    )
}

/// Expression handed to the native call for an input
fn input_arg(param: &MarshalParam) -> String {
    let class = &param.class;
    let local = local_name(param);
    match &class.kind {
        TypeKind::String(StringRepr::CString) => format!("{}.c_str()", local),
        TypeKind::ManagedHandle { .. } if class.is_pointer() => local,
        TypeKind::ManagedHandle { .. } => format!("*{}", local),
        _ if class.is_pointer() => format!("&{}", local),
        _ => local,
    }
}

/// Expression handed to the native call for an output
fn output_arg(param: &MarshalParam) -> String {
    let local = local_name(param);
    match &param.class.kind {
        TypeKind::String(StringRepr::CString) => format!("{}.data()", local),
        _ => format!("&{}", local),
    }
}
