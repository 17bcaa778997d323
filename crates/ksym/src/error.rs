//! Error types for the ksym crate.

use thiserror::Error;

/// Symbol-file parsing and kernel-structure reading errors.
#[derive(Debug, Error)]
pub enum KsymError {
    #[error("symbol file not found: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("XZ/LZMA decompression error: {0}")]
    Decompression(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("unsupported pointer size {0} (expected 4 or 8)")]
    UnsupportedPointerSize(usize),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("type not found: {0}")]
    TypeNotFound(String),

    #[error("field not found: {field} in type {type_name}")]
    FieldNotFound { type_name: String, field: String },

    #[error("memory read error at {offset:#x}: {msg}")]
    MemoryRead { offset: u64, msg: String },

    #[error("null pointer in {type_name}.{field}")]
    NullPointer { type_name: String, field: String },

    #[error("list revisits node {0:#x} before reaching its head")]
    ListCycle(u64),

    #[error("list longer than {0} nodes")]
    ListTooLong(usize),
}

pub type KsymResult<T> = Result<T, KsymError>;
