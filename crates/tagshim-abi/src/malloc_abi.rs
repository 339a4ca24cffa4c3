//! Exported allocator entry points (`malloc`, `calloc`, `realloc`, `free`,
//! `malloc_usable_size`).
//!
//! Symbols are only exported unmangled in release builds; debug builds keep
//! them as ordinary Rust-callable functions so tests can drive them without
//! replacing their own allocator.
//!
//! Compiled only with the `preload` feature and never into the crate's own
//! unit-test binary. Build the preload library with
//! `cargo build --release -p tagshim-abi --features preload`.

use std::ffi::c_void;

use tagshim_core::PresentedAddr;

use crate::bootstrap::BOOTSTRAP_ARENA_SIZE;
use crate::interposer::Interposer;
use crate::memory::Hardware;
use crate::next_symbol::{NEXT, NextSymbolAllocator};
use crate::runtime_config;

type Engine = Interposer<'static, NextSymbolAllocator<'static, BOOTSTRAP_ARENA_SIZE>, Hardware>;

#[inline]
fn engine() -> Engine {
    Interposer::new(&NEXT, Hardware, runtime_config::active())
}

// ---------------------------------------------------------------------------
// malloc
// ---------------------------------------------------------------------------

/// C `malloc`. Results smaller than the small-object threshold come back
/// tagged.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    // SAFETY: C malloc contract, forwarded.
    unsafe { engine().malloc(size) }.as_ptr()
}

// ---------------------------------------------------------------------------
// calloc
// ---------------------------------------------------------------------------

/// C `calloc`. Tagging follows the element size; the whole region is zeroed
/// through the returned pointer.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    // SAFETY: C calloc contract, forwarded.
    unsafe { engine().calloc(nmemb, size) }.as_ptr()
}

// ---------------------------------------------------------------------------
// realloc
// ---------------------------------------------------------------------------

/// C `realloc`. A tagged pointer is untagged before forwarding, and the result
/// is classified by the configured realloc policy.
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by this allocator.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    // SAFETY: C realloc contract, forwarded.
    unsafe { engine().realloc(PresentedAddr::from_ptr(ptr), size) }.as_ptr()
}

// ---------------------------------------------------------------------------
// free
// ---------------------------------------------------------------------------

/// C `free`. Null is a no-op that binds nothing.
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by this allocator, not
/// freed already.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: C free contract, forwarded.
    unsafe { engine().free(PresentedAddr::from_ptr(ptr)) }
}

// ---------------------------------------------------------------------------
// malloc_usable_size
// ---------------------------------------------------------------------------

/// glibc `malloc_usable_size`. Null reports 0.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by this allocator.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
    if ptr.is_null() {
        return 0;
    }
    // SAFETY: live allocation, forwarded.
    unsafe { engine().usable_size(PresentedAddr::from_ptr(ptr)) }
}
