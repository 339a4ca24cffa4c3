//! # tagshim-core
//!
//! Safe building blocks for the tagging allocator shim.
//!
//! This crate owns everything about the tagging scheme that does not touch
//! memory: the real/presented address value types, the tag predicates, the
//! startup configuration and the per-call tagging policy. No `unsafe` code is
//! permitted at the crate level; the C boundary lives in `tagshim-abi`.
//!
//! ```text
//! C caller -> tagshim-abi export -> policy (this crate) -> real allocator
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod policy;
pub mod predicate;
pub mod symbol;
pub mod tag;

pub use config::{ReallocPolicy, TagConfig};
pub use error::{ConfigError, SymbolError};
pub use policy::Protection;
pub use symbol::AllocSymbol;
pub use tag::{PresentedAddr, RealAddr, TagMask};
