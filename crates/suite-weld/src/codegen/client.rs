//! TypeScript client module generator
//!
//! Emits one `<Suite>.ts` module per suite: an async stub per generated
//! function that forwards its arguments through the transport function and
//! unwraps the typed result, plus an interface for every struct the suite
//! references.

use crate::config::SuiteConventions;
use crate::ir::{ts_ident, StructFieldTable, TS_REPLY_VAR};
use crate::model::{MarshalFunction, MarshalSuite, ResultField, ResultShape};

/// Generator for TypeScript client modules
pub struct ClientGenerator<'a> {
    suite: &'a MarshalSuite,
    conventions: &'a SuiteConventions,
    structs: &'a StructFieldTable,
}

impl<'a> ClientGenerator<'a> {
    /// Generator for one suite's client module
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

    /// File name of the generated module
    pub fn file_name(&self) -> String {
        format!("{}.ts", self.suite.name)
    }

    /// Render the module text
    pub fn generate(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "// Auto-generated client for {}\n// Generated by suite-weld - do not edit manually\n\n",
            self.suite.name
        ));
        output.push_str(&format!(
            "import {{ {} }} from \"{}\";\n\n",
            self.conventions.transport_function, self.conventions.transport_module
        ));
        output.push_str(&format!(
            "export const SUITE_NAME = \"{}\";\n\n",
            self.suite.name
        ));

        for name in self.suite.referenced_structs() {
            output.push_str(&self.generate_interface(&name));
            output.push('\n');
        }

        for function in &self.suite.functions {
            output.push_str(&self.generate_stub(function));
            output.push('\n');
        }

        output
    }

    fn generate_interface(&self, name: &str) -> String {
        let layout = self.structs.layout(name);
        let mut output = String::new();
        if !layout.known {
            output.push_str(&format!("/** Layout of {} is not known; carried opaquely */\n", name));
        }
        output.push_str(&format!("export interface {} {{\n", name));
        for field in &layout.fields {
            output.push_str(&format!(
                "  {}: {};\n",
                field.name,
                field.kind.to_typescript()
            ));
        }
        output.push_str("}\n");
        output
    }

    fn generate_stub(&self, function: &MarshalFunction) -> String {
        let params: Vec<String> = function
            .inputs()
            .map(|p| {
                let ty = p.class.to_typescript();
                if p.is_optional() {
                    format!("{}: {} | null", ts_ident(&p.name), ty)
                } else {
                    format!("{}: {}", ts_ident(&p.name), ty)
                }
            })
            .collect();

        let record: Vec<String> = function
            .inputs()
            .map(|p| {
                let ident = ts_ident(&p.name);
                if ident == p.name {
                    ident
                } else {
                    format!("{}: {}", p.name, ident)
                }
            })
            .collect();
        let record = if record.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", record.join(", "))
        };

        let call = format!(
            "{}(SUITE_NAME, \"{}\", {})",
            self.conventions.transport_function, function.export_name, record
        );

        let shape = function.result_shape();
        let (return_type, body) = match &shape {
            ResultShape::Void => ("void".to_string(), format!("  await {};\n", call)),
            ResultShape::Single(field) => (
                field.class.to_typescript(),
                format!(
                    "  const {} = await {};\n  return {};\n",
                    TS_REPLY_VAR,
                    call,
                    unwrap_field(field)
                ),
            ),
            ResultShape::Record(fields) => {
                let ty = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.class.to_typescript()))
                    .collect::<Vec<_>>()
                    .join("; ");
                let value = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, unwrap_field(f)))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("{{ {} }}", ty),
                    format!(
                        "  const {} = await {};\n  return {{ {} }};\n",
                        TS_REPLY_VAR, call, value
                    ),
                )
            }
        };

        format!(
            "/** {}::{} */\nexport async function {}({}): Promise<{}> {{\n{}}}\n",
            self.suite.name,
            function.native_name,
            function.export_name,
            params.join(", "),
            return_type,
            body
        )
    }
}

fn unwrap_field(field: &ResultField) -> String {
    format!(
        "{}[\"{}\"] as {}",
        TS_REPLY_VAR,
        field.name,
        field.class.to_typescript()
    )
}
