//! Error type for every export/import operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("unknown algorithm id: {0}")]
    UnknownAlgorithm(u8),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("length mismatch: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("malformed export data: {0}")]
    Decode(String),

    #[error("invalid UTF-8 text")]
    Encoding,

    #[error("invalid password or corrupted data")]
    Integrity,

    #[error("OS random generator unavailable")]
    Random,

    #[error("payload too large: {0} bytes")]
    TooLarge(usize),
}

pub type Result<T> = std::result::Result<T, ExportError>;
