//! Errors that abort a generation run
//!
//! Per-suite and per-function problems are not errors: they are recorded as
//! skip reasons in the model and the run continues. What remains here is
//! fatal: I/O on a named path, an unreadable type map, or a parser that
//! cannot be set up.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeldError {
    /// Reading an input file failed
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing a generated file failed
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Creating an output directory failed
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Walking an input directory failed
    #[error("failed to scan {}: {message}", .path.display())]
    Scan { path: PathBuf, message: String },

    /// The type map could not be parsed
    #[error("invalid type map {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// The C++ grammar could not be loaded into the parser
    #[error("failed to load declaration grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// A built-in structural query failed to compile
    #[error("invalid structural query: {0}")]
    Query(#[from] tree_sitter::QueryError),

    /// A built-in structural query lacks a capture the extractor reads
    #[error("structural query has no @{0} capture")]
    MissingCapture(String),

    /// A macro-stripping pattern failed to compile
    #[error("invalid macro pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The parser returned no tree
    #[error("parser produced no syntax tree for {0}")]
    Parse(String),
}
