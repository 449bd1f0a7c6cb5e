//! Code generation for suite bindings
//!
//! This module provides generators for:
//! - native marshaling wrappers (`<Suite>Bridge.h` / `.cpp`)
//! - TypeScript client modules (`<Suite>.ts`)
//! - cross-suite artifacts (client index, router, CMake source list)

pub mod client;
pub mod index;
pub mod native;

pub use client::ClientGenerator;
pub use index::{IndexGenerator, CLIENT_INDEX, CMAKE_FRAGMENT, ROUTER_HEADER, ROUTER_SOURCE};
pub use native::{NativeGenerator, NativeWrapper};
