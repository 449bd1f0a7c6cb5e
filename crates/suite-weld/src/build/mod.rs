//! Generation runs
//!
//! [`BindingBuilder`] drives the whole pipeline: discovery, extraction,
//! filtering, modelling, generation and writing.

pub mod bindings;

pub use bindings::{
    BindingBuilder, BuildOutput, BuildReport, FailedSource, GeneratedFile, OutputTarget,
    SuiteReport,
};
