//! Suite-Weld: binding generator for native function-pointer suites
//!
//! Reads C/C++ declarations of plugin API suites (structs of function
//! pointers returning an error code) and generates a JSON marshaling layer
//! for the native side plus TypeScript client stubs that call it over a
//! generic transport.
//!
//! # Architecture
//!
//! - `extract`: tree-sitter extraction of suites, functions and parameters
//! - `classify`: type classification against the type map
//! - `model`: input/output partition, return conventions, exclusions
//! - `codegen`: native wrapper, client module and cross-suite generators
//! - `build`: the `BindingBuilder` generation run
//!
//! # Usage
//!
//! ```rust,ignore
//! use suite_weld::{BindingBuilder, TypeMapConfig};
//!
//! fn main() -> Result<(), suite_weld::WeldError> {
//!     let config = TypeMapConfig::load("types.json")?;
//!     BindingBuilder::new(config)
//!         .input("sdk/Headers")
//!         .native_out("bridge/generated")
//!         .client_out("client/src/suites")
//!         .build()?;
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod classify;
pub mod codegen;
pub mod config;
pub mod error;
pub mod extract;
pub mod ir;
pub mod model;

// Re-export commonly used types
pub use build::{
    BindingBuilder, BuildOutput, BuildReport, FailedSource, GeneratedFile, OutputTarget, SuiteReport,
};
pub use classify::Classifier;
pub use codegen::{ClientGenerator, IndexGenerator, NativeGenerator, NativeWrapper};
pub use config::{OptionalHandlePolicy, SuiteConventions, TypeMapConfig};
pub use error::WeldError;
pub use extract::Extractor;
pub use ir::{
    Category, FunctionDescriptor, Optionality, ParameterDescriptor, StructFieldTable,
    SuiteDescriptor, TypeClassification, TypeKind, WirePrimitive,
};
pub use model::{MarshalFunction, MarshalSuite, ModelBuilder, ResultShape, ReturnConvention, SkipReason};
