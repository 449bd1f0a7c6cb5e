//! Cross-suite artifacts: client index, native router, CMake source list

use crate::codegen::native::{bridge_file_stem, dispatch_function_name};
use crate::config::SuiteConventions;
use crate::model::MarshalSuite;
use std::collections::HashMap;

pub const CLIENT_INDEX: &str = "index.ts";
pub const ROUTER_HEADER: &str = "SuiteRouter.h";
pub const ROUTER_SOURCE: &str = "SuiteRouter.cpp";
pub const CMAKE_FRAGMENT: &str = "SuiteBridgeSources.cmake";

/// Generator for artifacts that span every generated suite
pub struct IndexGenerator<'a> {
    suites: Vec<&'a MarshalSuite>,
    conventions: &'a SuiteConventions,
}

impl<'a> IndexGenerator<'a> {
    /// Suites are ordered by name regardless of input order
    pub fn new(suites: &'a [MarshalSuite], conventions: &'a SuiteConventions) -> Self {
        let mut suites: Vec<&MarshalSuite> = suites.iter().collect();
        suites.sort_by(|a, b| a.name.cmp(&b.name));
        Self { suites, conventions }
    }

    /// Namespace alias per suite: the short name, or the full name when
    /// several generated suites share a short name
    fn aliases(&self) -> Vec<(&'a MarshalSuite, String)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for suite in &self.suites {
            *counts.entry(suite.short_name.as_str()).or_default() += 1;
        }
        self.suites
            .iter()
            .map(|suite| {
                let shared = counts.get(suite.short_name.as_str()).copied().unwrap_or(0) > 1;
                let alias = if shared {
                    suite.name.clone()
                } else {
                    suite.short_name.clone()
                };
                (*suite, alias)
            })
            .collect()
    }

    /// `index.ts` re-exporting every client module
    pub fn client_index(&self) -> String {
        let mut output = String::from(
            "// Auto-generated suite client index\n// Generated by suite-weld - do not edit manually\n\n",
        );
        for (suite, alias) in self.aliases() {
            output.push_str(&format!(
                "export * as {} from \"./{}\";\n",
                alias, suite.name
            ));
        }
        output
    }

    /// Declaration of `RouteSuiteCall`
    pub fn router_header(&self) -> String {
        let ns = &self.conventions.namespace;
        format!(
            "// Auto-generated suite router\n// Generated by suite-weld - do not edit manually\n\n\
             #pragma once\n\n#include <string>\n\n#include <nlohmann/json.hpp>\n\n\
             namespace {ns} {{\n\n\
             using Json = nlohmann::ordered_json;\n\n\
             Json RouteSuiteCall(const std::string& suite, const std::string& method, const Json& args);\n\n\
             }}  // namespace {ns}\n",
            ns = ns
        )
    }

    /// `RouteSuiteCall` forwarding to each suite's dispatcher
    pub fn router_source(&self) -> String {
        let ns = &self.conventions.namespace;
        let mut output = String::from(
            "// Auto-generated suite router\n// Generated by suite-weld - do not edit manually\n\n",
        );
        output.push_str(&format!("#include \"{}\"\n", ROUTER_HEADER));
        output.push_str(&format!("#include \"{}\"\n\n", self.conventions.runtime_header));
        for suite in &self.suites {
            output.push_str(&format!("#include \"{}.h\"\n", bridge_file_stem(&suite.name)));
        }
        if !self.suites.is_empty() {
            output.push('\n');
        }

        output.push_str(&format!("namespace {} {{\n\n", ns));
        output.push_str(
            "Json RouteSuiteCall(const std::string& suite, const std::string& method, const Json& args) {\n",
        );
        for suite in &self.suites {
            output.push_str(&format!(
                "    if (suite == \"{}\") {{\n        return {}(method, args);\n    }}\n",
                suite.name,
                dispatch_function_name(&suite.name)
            ));
        }
        output.push_str("    throw SuiteNotFoundError(suite);\n}\n\n");
        output.push_str(&format!("}}  // namespace {}\n", ns));
        output
    }

    /// CMake fragment listing every generated native file
    pub fn cmake_sources(&self) -> String {
        let mut sources = Vec::new();
        let mut headers = Vec::new();
        for suite in &self.suites {
            let stem = bridge_file_stem(&suite.name);
            sources.push(format!("{}.cpp", stem));
            headers.push(format!("{}.h", stem));
        }
        sources.push(ROUTER_SOURCE.to_string());
        headers.push(ROUTER_HEADER.to_string());

        let list = |files: &[String]| {
            files
                .iter()
                .map(|f| format!("    ${{CMAKE_CURRENT_LIST_DIR}}/{}\n", f))
                .collect::<String>()
        };

        format!(
            "# Auto-generated suite bridge source list\n# Generated by suite-weld - do not edit manually\n\n\
             set(SUITE_BRIDGE_SOURCES\n{})\n\nset(SUITE_BRIDGE_HEADERS\n{})\n",
            list(&sources),
            list(&headers)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn suite(name: &str, short: &str) -> MarshalSuite {
        MarshalSuite {
            name: name.into(),
            short_name: short.into(),
            functions: Vec::new(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_client_index_sorted() {
        let suites = vec![suite("AEGP_LayerSuite9", "Layer"), suite("AEGP_CompSuite11", "Comp")];
        let conventions = SuiteConventions::default();
        let index = IndexGenerator::new(&suites, &conventions).client_index();
        let lines: Vec<_> = index.lines().filter(|l| l.starts_with("export")).collect();
        assert_eq!(
            lines,
            vec![
                "export * as Comp from \"./AEGP_CompSuite11\";",
                "export * as Layer from \"./AEGP_LayerSuite9\";",
            ]
        );
    }

    #[test]
    fn test_client_index_disambiguates_versions() {
        let suites = vec![suite("AEGP_LayerSuite8", "Layer"), suite("AEGP_LayerSuite9", "Layer")];
        let conventions = SuiteConventions::default();
        let index = IndexGenerator::new(&suites, &conventions).client_index();
        assert!(index.contains("export * as AEGP_LayerSuite8 from \"./AEGP_LayerSuite8\";"));
        assert!(index.contains("export * as AEGP_LayerSuite9 from \"./AEGP_LayerSuite9\";"));
    }

    #[test]
    fn test_router() {
        let suites = vec![suite("ExampleSuite", "Example")];
        let conventions = SuiteConventions::default();
        let generator = IndexGenerator::new(&suites, &conventions);

        assert!(generator.router_header().contains(
            "Json RouteSuiteCall(const std::string& suite, const std::string& method, const Json& args);"
        ));
        let source = generator.router_source();
        assert!(source.contains("#include \"ExampleSuiteBridge.h\""));
        assert!(source.contains("if (suite == \"ExampleSuite\") {\n        return DispatchExampleSuite(method, args);"));
        assert!(source.contains("throw SuiteNotFoundError(suite);"));
    }

    #[test]
    fn test_cmake_sources() {
        let suites = vec![suite("ExampleSuite", "Example")];
        let conventions = SuiteConventions::default();
        let cmake = IndexGenerator::new(&suites, &conventions).cmake_sources();
        assert_eq!(
            cmake,
            "# Auto-generated suite bridge source list\n# Generated by suite-weld - do not edit manually\n\n\
             set(SUITE_BRIDGE_SOURCES\n    ${CMAKE_CURRENT_LIST_DIR}/ExampleSuiteBridge.cpp\n    ${CMAKE_CURRENT_LIST_DIR}/SuiteRouter.cpp\n)\n\n\
             set(SUITE_BRIDGE_HEADERS\n    ${CMAKE_CURRENT_LIST_DIR}/ExampleSuiteBridge.h\n    ${CMAKE_CURRENT_LIST_DIR}/SuiteRouter.h\n)\n"
        );
    }
}
