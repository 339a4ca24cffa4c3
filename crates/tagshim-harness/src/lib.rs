//! Tooling around the tagshim preload library.
//!
//! This crate provides:
//! - Configuration report: what the shim would resolve from an environment
//! - Address classification: both tag predicates over raw addresses
//! - Launcher: run a program with the shim preloaded and configured

#![forbid(unsafe_code)]

pub mod error;
pub mod launcher;
pub mod report;

pub use error::HarnessError;
pub use launcher::PreloadLaunch;
pub use report::{AddressReport, ConfigReport};
