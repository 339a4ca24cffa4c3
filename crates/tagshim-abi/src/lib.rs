// All extern "C" exports take raw pointers from C callers; the allocator
// contract is the C one, so per-function safety docs live on the engine.
#![allow(clippy::missing_safety_doc)]
//! # tagshim-abi
//!
//! C ABI boundary of the tagging allocator shim.
//!
//! Built as a `cdylib`, this crate is loaded with `LD_PRELOAD` ahead of the C
//! library. It interposes `malloc`, `calloc`, `realloc`, `free` and
//! `malloc_usable_size`, forwards every request to the next definition of the
//! symbol, and hands small objects back to the application with a tag in the
//! high address bits. Tags are removed before any pointer reaches the real
//! allocator.
//!
//! # Architecture
//!
//! ```text
//! C caller -> malloc_abi export -> Interposer (policy from tagshim-core)
//!          -> NextSymbolAllocator -> SymbolCache -> dlsym(RTLD_NEXT) target
//!                                 \-> BootstrapArena (loader reentry only)
//! ```

#[macro_use]
pub mod diag;

pub mod bootstrap;
pub mod interposer;
pub mod memory;
pub mod next_symbol;
pub mod real;
pub mod runtime_config;
pub mod symbol_cache;

// Release builds export these unmangled, replacing the allocator of whatever
// binary links this crate. Only the preload library turns them on.
#[cfg(all(not(test), feature = "preload"))]
pub mod malloc_abi;

pub use interposer::Interposer;
pub use memory::{Hardware, PresentedMemory, TagIgnoring};
pub use next_symbol::NextSymbolAllocator;
pub use real::{DirectAllocator, RealAllocator};
pub use symbol_cache::{Lookup, SymbolCache};
