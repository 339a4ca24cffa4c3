//! Error types shared by the shim crates.

use thiserror::Error;

/// A startup configuration value that could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: value is not valid UTF-8")]
    NotUtf8 { var: &'static str },
    #[error("{var}: expected a 16-bit tag (0x-prefixed hex or decimal)")]
    InvalidTag { var: &'static str },
    #[error("{var}: tag must be non-zero")]
    ZeroTag { var: &'static str },
    #[error("{var}: expected a decimal byte count")]
    InvalidThreshold { var: &'static str },
    #[error("{var}: expected one of 1/0, true/false, on/off, yes/no")]
    InvalidFlag { var: &'static str },
    #[error("{var}: expected `inherit` or `size`")]
    InvalidReallocPolicy { var: &'static str },
}

/// Failure to obtain the real implementation of an allocator entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("could not resolve next `{symbol}`")]
    Unresolved { symbol: &'static str },
    #[error("`{symbol}` is not bound; refusing to call through a null slot")]
    Unbound { symbol: &'static str },
}
