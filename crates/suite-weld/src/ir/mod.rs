//! Intermediate representation shared by the extractor, the model builder
//! and both generators.

pub mod structs;
pub mod symbol;
pub mod types;

pub use structs::*;
pub use symbol::*;
pub use types::*;
