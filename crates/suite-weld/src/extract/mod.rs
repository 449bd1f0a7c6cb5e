//! Declaration extractor
//!
//! Finds suites in declaration source with tree-sitter structural queries:
//!
//! 1. `typedef struct { ... } FooSuite2;`
//! 2. `struct FooSuite2 { ... };`
//! 3. within a suite body, every function-pointer field
//!    `RetType (*Name)(params);`, including pointer returns such as
//!    `const char* (*Name)(params);`
//!
//! Anything that does not match is silently left out; most aggregates in a
//! header corpus are not suites.

mod params;

use crate::config::SuiteConventions;
use crate::error::WeldError;
use crate::ir::{FunctionDescriptor, SuiteDescriptor};
use regex::Regex;
use std::collections::HashSet;
use streaming_iterator::StreamingIterator;
use tracing::{debug, trace};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use params::collapse_whitespace;

/// `typedef struct [tag] { fields } Name;`
const TYPEDEF_SUITE_QUERY: &str = r#"
(type_definition
  type: (struct_specifier
    body: (field_declaration_list) @body)
  declarator: (type_identifier) @name)
"#;

/// `struct Name { fields };`
const NAMED_SUITE_QUERY: &str = r#"
(struct_specifier
  name: (type_identifier) @name
  body: (field_declaration_list) @body)
"#;

/// `(*Name)(params)` of a function-pointer field. The owning field
/// declaration is found by walking up from the match, because a pointer
/// return wraps the declarator in `pointer_declarator` nodes.
const FUNCTION_POINTER_QUERY: &str = r#"
(function_declarator
  declarator: (parenthesized_declarator
    (pointer_declarator
      declarator: (field_identifier) @name))
  parameters: (parameter_list) @params) @declarator
"#;

struct SuiteQuery {
    query: Query,
    name: u32,
    body: u32,
}

impl SuiteQuery {
    fn new(language: &Language, source: &str) -> Result<Self, WeldError> {
        let query = Query::new(language, source)?;
        let name = capture_index(&query, "name")?;
        let body = capture_index(&query, "body")?;
        Ok(Self { query, name, body })
    }
}

struct FunctionQuery {
    query: Query,
    declarator: u32,
    name: u32,
    params: u32,
}

impl FunctionQuery {
    fn new(language: &Language) -> Result<Self, WeldError> {
        let query = Query::new(language, FUNCTION_POINTER_QUERY)?;
        Ok(Self {
            declarator: capture_index(&query, "declarator")?,
            name: capture_index(&query, "name")?,
            params: capture_index(&query, "params")?,
            query,
        })
    }
}

fn capture_index(query: &Query, name: &str) -> Result<u32, WeldError> {
    query
        .capture_index_for_name(name)
        .ok_or_else(|| WeldError::MissingCapture(name.to_string()))
}

/// Field declaration whose declarator is `declarator`, through any
/// pointer or reference layers of the return type
fn owning_field(declarator: Node<'_>) -> Option<Node<'_>> {
    let mut node = declarator.parent()?;
    while matches!(node.kind(), "pointer_declarator" | "reference_declarator") {
        node = node.parent()?;
    }
    (node.kind() == "field_declaration").then_some(node)
}

/// Structural extractor for suite declarations
pub struct Extractor {
    parser: Parser,
    conventions: SuiteConventions,
    macros: Option<Regex>,
    typedef_suites: SuiteQuery,
    named_suites: SuiteQuery,
    functions: FunctionQuery,
}

impl Extractor {
    /// Set up the parser and compile the structural queries
    pub fn new(conventions: &SuiteConventions) -> Result<Self, WeldError> {
        let language: Language = tree_sitter_cpp::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language)?;

        let macros = if conventions.strip_macros.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = conventions
                .strip_macros
                .iter()
                .map(|m| regex::escape(m))
                .collect();
            Some(Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|")))?)
        };

        Ok(Self {
            parser,
            conventions: conventions.clone(),
            macros,
            typedef_suites: SuiteQuery::new(&language, TYPEDEF_SUITE_QUERY)?,
            named_suites: SuiteQuery::new(&language, NAMED_SUITE_QUERY)?,
            functions: FunctionQuery::new(&language)?,
        })
    }

    /// Remove macro tokens that break parsing of function-pointer fields
    pub fn preprocess(&self, source: &str) -> String {
        match &self.macros {
            Some(re) => re.replace_all(source, "").into_owned(),
            None => source.to_string(),
        }
    }

    /// Extract every suite declared in `source`, in source order.
    ///
    /// `origin` only labels diagnostics.
    pub fn extract(&mut self, origin: &str, source: &str) -> Result<Vec<SuiteDescriptor>, WeldError> {
        let text = self.preprocess(source);
        let tree = self
            .parser
            .parse(&text, None)
            .ok_or_else(|| WeldError::Parse(origin.to_string()))?;
        let root = tree.root_node();

        let mut candidates = self.match_suites(&self.typedef_suites, root, &text);
        candidates.extend(self.match_suites(&self.named_suites, root, &text));
        candidates.sort_by_key(|(_, body)| body.start_byte());

        let mut seen = HashSet::new();
        let mut suites = Vec::new();
        for (name, body) in candidates {
            if !seen.insert(name.clone()) {
                continue;
            }

            let functions = self.extract_functions(&name, body, &text);
            if functions.is_empty() {
                debug!(origin, suite = %name, "suite has no function slots, dropped");
                continue;
            }

            debug!(origin, suite = %name, functions = functions.len(), "extracted suite");
            suites.push(SuiteDescriptor { name, functions });
        }

        Ok(suites)
    }

    fn match_suites<'tree>(
        &self,
        suite_query: &SuiteQuery,
        root: Node<'tree>,
        text: &str,
    ) -> Vec<(String, Node<'tree>)> {
        let mut found = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&suite_query.query, root, text.as_bytes());

        while let Some(m) = matches.next() {
            let name = m.nodes_for_capture_index(suite_query.name).next();
            let body = m.nodes_for_capture_index(suite_query.body).next();
            if let (Some(name), Some(body)) = (name, body) {
                let name = text[name.byte_range()].to_string();
                if self.conventions.is_suite_name(&name) {
                    found.push((name, body));
                } else {
                    trace!(aggregate = %name, "not a suite");
                }
            }
        }

        found
    }

    fn extract_functions(&self, suite: &str, body: Node<'_>, text: &str) -> Vec<FunctionDescriptor> {
        let query = &self.functions;
        let mut functions = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query.query, body, text.as_bytes());

        while let Some(m) = matches.next() {
            let declarator = m.nodes_for_capture_index(query.declarator).next();
            let name = m.nodes_for_capture_index(query.name).next();
            let params = m.nodes_for_capture_index(query.params).next();
            let (Some(declarator), Some(name), Some(params)) = (declarator, name, params) else {
                continue;
            };
            let Some(field) = owning_field(declarator) else {
                continue;
            };

            // fields of aggregates nested inside the suite body belong to them
            if field.parent() != Some(body) {
                continue;
            }

            let name = text[name.byte_range()].to_string();
            if self.conventions.is_reserved(&name) {
                trace!(suite, function = %name, "reserved slot skipped");
                continue;
            }

            // pointer sigils of a pointer return sit between the two
            let mut return_type =
                collapse_whitespace(&text[field.start_byte()..declarator.start_byte()]);
            if return_type.is_empty() {
                return_type = self.conventions.error_type.clone();
            }

            functions.push(
                FunctionDescriptor::new(suite, name, return_type)
                    .with_params(params::parse_parameters(params, text)),
            );
        }

        functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::DeclaratorShape;
    use pretty_assertions::assert_eq;

    const HEADER: &str = r#"
#include "A.h"

typedef struct {
    A_long value;
    A_u_long scale;
} A_Time;

typedef struct {
    SPAPI A_Err (*AEGP_GetWidgetCount)(ExampleWidgetH widget, A_long *count);
    SPAPI A_Err (*AEGP_GetWidgetName)(
        ExampleWidgetH  widget,       /* >> */
        A_char          *nameZ);      /* << */
    SPAPI A_Err (*reserved0)(void);
    SPAPI A_Err (*AEGP_SetWidgetTime)(ExampleWidgetH widget, const A_Time *timeP);
    SPAPI A_Err (*AEGP_Ping)(void);
} ExampleSuite1;

struct AEGP_OtherSuite2 {
    SPAPI ExampleWidgetH (*AEGP_GetDefaultWidget)();
    SPAPI A_Err (*AEGP_Visit)(A_long counts[4], void (*cb)(void *refcon), ...);
    SPAPI A_Err (*AEGP_Lookup)(const std::string &key, AEGP_WidgetQuality quality);
};

typedef struct {
    SPAPI A_Err (*AEGP_Nothing)(void);
} NotASuiteTable;

typedef struct {
    A_long only_data;
} AEGP_EmptySuite1;
"#;

    fn extract(source: &str) -> Vec<SuiteDescriptor> {
        let mut extractor = Extractor::new(&SuiteConventions::default()).unwrap();
        extractor.extract("test.h", source).unwrap()
    }

    #[test]
    fn test_finds_suites_in_source_order() {
        let suites = extract(HEADER);
        let names: Vec<_> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ExampleSuite1", "AEGP_OtherSuite2"]);
    }

    #[test]
    fn test_function_slots() {
        let suites = extract(HEADER);
        let example = &suites[0];
        let names: Vec<_> = example.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "AEGP_GetWidgetCount",
                "AEGP_GetWidgetName",
                "AEGP_SetWidgetTime",
                "AEGP_Ping"
            ]
        );

        let count = &example.functions[0];
        assert_eq!(count.return_type, "A_Err");
        assert_eq!(count.suite_name, "ExampleSuite1");
        assert_eq!(count.params.len(), 2);
        assert_eq!(count.params[0].name, "widget");
        assert_eq!(count.params[0].ty, "ExampleWidgetH");
        assert!(!count.params[0].is_output());
        assert_eq!(count.params[1].name, "count");
        assert_eq!(count.params[1].ty, "A_long*");
        assert!(count.params[1].is_output());

        assert!(example.functions[3].params.is_empty());
    }

    #[test]
    fn test_const_and_comments() {
        let suites = extract(HEADER);
        let name = &suites[0].functions[1];
        assert_eq!(name.params.len(), 2);
        assert_eq!(name.params[1].name, "nameZ");
        assert_eq!(name.params[1].ty, "A_char*");

        let set_time = &suites[0].functions[2];
        assert_eq!(set_time.params[1].ty, "const A_Time*");
        assert!(set_time.params[1].is_const);
        assert!(!set_time.params[1].is_output());
    }

    #[test]
    fn test_direct_return_and_qualified_names() {
        let suites = extract(HEADER);
        let other = &suites[1];

        let default_widget = &other.functions[0];
        assert_eq!(default_widget.name, "AEGP_GetDefaultWidget");
        assert_eq!(default_widget.return_type, "ExampleWidgetH");
        assert!(default_widget.params.is_empty());

        let lookup = &other.functions[2];
        assert_eq!(lookup.params[0].name, "key");
        assert_eq!(lookup.params[0].ty, "const std::string&");
        assert!(lookup.params[0].is_reference);
        assert_eq!(lookup.params[1].ty, "AEGP_WidgetQuality");
    }

    #[test]
    fn test_unsupported_shapes_are_flagged() {
        let suites = extract(HEADER);
        let visit = &suites[1].functions[1];
        let shapes: Vec<_> = visit.params.iter().map(|p| p.shape).collect();
        assert_eq!(
            shapes,
            vec![
                DeclaratorShape::Array,
                DeclaratorShape::FunctionPointer,
                DeclaratorShape::Variadic
            ]
        );
        assert_eq!(visit.params[0].name, "counts");
        assert_eq!(visit.params[1].name, "cb");
    }

    #[test]
    fn test_duplicate_spellings_are_deduplicated() {
        let source = r#"
typedef struct AEGP_DupSuite1 {
    A_Err (*AEGP_One)(A_long x);
} AEGP_DupSuite1;
"#;
        let suites = extract(source);
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].functions.len(), 1);
    }

    #[test]
    fn test_macro_stripping() {
        let extractor = Extractor::new(&SuiteConventions::default()).unwrap();
        assert_eq!(
            extractor.preprocess("SPAPI A_Err (*F)(SPAPI_LIKE x);"),
            " A_Err (*F)(SPAPI_LIKE x);"
        );
    }

    #[test]
    fn test_pointer_returning_slots() {
        let source = r#"
typedef struct {
    SPAPI const char* (*GetLabel)(ExampleWidgetH widget);
    SPAPI ExampleWidgetH* (*GetPtr)(void);
    SPAPI A_char ** (*GetNames)(void);
    SPAPI A_Err (*Ping)(void);
} ExampleSuite;
"#;
        let suites = extract(source);
        let functions = &suites[0].functions;
        let slots: Vec<_> = functions
            .iter()
            .map(|f| (f.name.as_str(), f.return_type.as_str()))
            .collect();
        assert_eq!(
            slots,
            vec![
                ("GetLabel", "const char*"),
                ("GetPtr", "ExampleWidgetH*"),
                ("GetNames", "A_char **"),
                ("Ping", "A_Err"),
            ]
        );
        assert_eq!(functions[0].params[0].name, "widget");
    }

    #[test]
    fn test_query_without_capture_is_rejected() {
        let language: Language = tree_sitter_cpp::LANGUAGE.into();
        let err = SuiteQuery::new(
            &language,
            "(struct_specifier name: (type_identifier) @name)",
        )
        .err()
        .unwrap();
        assert!(matches!(err, WeldError::MissingCapture(ref c) if c == "body"));
    }
}
