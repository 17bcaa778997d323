//! Error types for memory layers.

use thiserror::Error;

/// Errors raised while reading a memory layer.
#[derive(Error, Debug)]
pub enum MemError {
    /// An address range is not backed by the layer.
    #[error("Invalid address {invalid_address:#x} in layer '{layer_name}': {message}")]
    InvalidAddress {
        layer_name: String,
        invalid_address: u64,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl MemError {
    pub fn invalid_address(layer_name: impl Into<String>, addr: u64, msg: impl Into<String>) -> Self {
        MemError::InvalidAddress {
            layer_name: layer_name.into(),
            invalid_address: addr,
            message: msg.into(),
        }
    }
}

pub type MemResult<T> = Result<T, MemError>;
