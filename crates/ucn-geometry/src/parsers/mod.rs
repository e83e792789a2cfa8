//! File format parsers for importing solid geometries.
//!
//! Supported formats:
//! - [`.obj`](obj) — Wavefront OBJ mesh files, one solid per `o` group

pub mod obj;

use thiserror::Error;

/// Errors during geometry file parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}
