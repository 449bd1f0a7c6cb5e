//! Parameter reconstruction from `parameter_list` nodes
//!
//! The declarator is taken from the parameter node's `declarator` field (its
//! last named child); everything in front of it is the type text, kept in
//! source order with whitespace collapsed. Pointer and reference sigils are
//! moved from the declarator onto the type.
//!
//! This is exact only for simple declarators. Array, function-pointer and
//! variadic parameters are recorded with their [`DeclaratorShape`] so they can
//! be excluded downstream rather than mis-extracted.

use crate::ir::{DeclaratorShape, ParameterDescriptor};
use tree_sitter::Node;

#[derive(Debug, Default)]
struct DeclaratorInfo {
    name: Option<String>,
    pointer_depth: usize,
    is_reference: bool,
    shape: DeclaratorShape,
}

impl DeclaratorInfo {
    fn mark(&mut self, shape: DeclaratorShape) {
        if self.shape == DeclaratorShape::Simple {
            self.shape = shape;
        }
    }
}

/// Reconstruct the parameters of a `parameter_list` node, in order.
///
/// A lone unnamed `void` parameter means "no parameters".
pub(crate) fn parse_parameters(list: Node<'_>, source: &str) -> Vec<ParameterDescriptor> {
    let mut params = Vec::new();
    let mut walker = list.walk();

    for child in list.children(&mut walker) {
        match child.kind() {
            "parameter_declaration" | "optional_parameter_declaration" => {
                params.push(parse_parameter(child, params.len(), source));
            }
            "variadic_parameter" | "variadic_parameter_declaration" | "..." => {
                params.push(
                    ParameterDescriptor::new(format!("arg{}", params.len()), "...")
                        .with_shape(DeclaratorShape::Variadic),
                );
            }
            _ => {}
        }
    }

    if params.len() == 1 && params[0].ty == "void" && params[0].name == "arg0" {
        params.clear();
    }
    params
}

fn parse_parameter(node: Node<'_>, index: usize, source: &str) -> ParameterDescriptor {
    let declarator = node.child_by_field_name("declarator");
    let type_end = declarator.map_or(node.end_byte(), |d| d.start_byte());
    let mut type_text = collapse_whitespace(&source[node.start_byte()..type_end]);

    // optional_parameter_declaration without a declarator still carries `= value`
    if let Some(eq) = type_text.find('=') {
        type_text = type_text[..eq].trim_end().to_string();
    }

    let mut info = DeclaratorInfo::default();
    if let Some(d) = declarator {
        walk_declarator(d, source, &mut info);
    }

    let mut ty = type_text;
    ty.push_str(&"*".repeat(info.pointer_depth));
    if info.is_reference {
        ty.push('&');
    }

    let name = info.name.unwrap_or_else(|| format!("arg{}", index));
    ParameterDescriptor::new(name, ty).with_shape(info.shape)
}

fn walk_declarator(node: Node<'_>, source: &str, info: &mut DeclaratorInfo) {
    match node.kind() {
        "identifier" | "field_identifier" => {
            if info.name.is_none() {
                info.name = Some(source[node.byte_range()].to_string());
            }
        }
        "pointer_declarator" | "abstract_pointer_declarator" => {
            info.pointer_depth += 1;
            if let Some(inner) = node.child_by_field_name("declarator") {
                walk_declarator(inner, source, info);
            }
        }
        "reference_declarator" | "abstract_reference_declarator" => {
            info.is_reference = true;
            if let Some(inner) = last_named_child(node) {
                walk_declarator(inner, source, info);
            }
        }
        "array_declarator" | "abstract_array_declarator" => {
            info.mark(DeclaratorShape::Array);
            if let Some(inner) = node.child_by_field_name("declarator") {
                walk_declarator(inner, source, info);
            }
        }
        "function_declarator"
        | "abstract_function_declarator"
        | "parenthesized_declarator"
        | "abstract_parenthesized_declarator" => {
            info.mark(DeclaratorShape::FunctionPointer);
            let inner = node
                .child_by_field_name("declarator")
                .or_else(|| first_named_child(node));
            if let Some(inner) = inner {
                walk_declarator(inner, source, info);
            }
        }
        "type_qualifier" | "comment" => {}
        _ => {
            if let Some(inner) = last_named_child(node) {
                walk_declarator(inner, source, info);
            }
        }
    }
}

fn last_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut walker = node.walk();
    let last = node.named_children(&mut walker).last();
    last
}

fn first_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut walker = node.walk();
    let first = node.named_children(&mut walker).next();
    first
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
