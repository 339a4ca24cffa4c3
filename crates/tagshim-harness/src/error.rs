//! Harness error type.

use std::path::PathBuf;

use tagshim_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid address `{input}`: expected 0x-prefixed hex or decimal")]
    InvalidAddress { input: String },
    #[error("preload library not found: {}", path.display())]
    MissingLibrary { path: PathBuf },
    #[error("no program given to run")]
    EmptyCommand,
}
