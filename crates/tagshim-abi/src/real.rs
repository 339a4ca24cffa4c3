//! The allocator the shim forwards to.
//!
//! Implementations only ever see [`RealAddr`]s; a tagged address cannot reach
//! them without an explicit `untag`/`resolve` by the caller.

use std::ffi::c_void;

use tagshim_core::RealAddr;

/// A C-style allocator.
///
/// All methods follow the C contracts of the functions they are named after.
pub trait RealAllocator {
    /// # Safety
    ///
    /// Same contract as C `malloc`.
    unsafe fn malloc(&self, size: usize) -> RealAddr;

    /// # Safety
    ///
    /// Same contract as C `calloc`.
    unsafe fn calloc(&self, count: usize, size: usize) -> RealAddr;

    /// # Safety
    ///
    /// `addr` must be null or a live allocation of this allocator.
    unsafe fn realloc(&self, addr: RealAddr, size: usize) -> RealAddr;

    /// # Safety
    ///
    /// `addr` must be null or a live allocation of this allocator, not freed
    /// before.
    unsafe fn free(&self, addr: RealAddr);

    /// # Safety
    ///
    /// `addr` must be null or a live allocation of this allocator.
    unsafe fn usable_size(&self, addr: RealAddr) -> usize;
}

/// The C library allocator, called through the normal link-time bindings.
///
/// Used where the allocator is statically composed (tests, benches); inside an
/// interposing library these calls would resolve back to the shim.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectAllocator;

impl RealAllocator for DirectAllocator {
    unsafe fn malloc(&self, size: usize) -> RealAddr {
        // SAFETY: plain libc call.
        RealAddr::from_ptr(unsafe { libc::malloc(size) })
    }

    unsafe fn calloc(&self, count: usize, size: usize) -> RealAddr {
        // SAFETY: plain libc call.
        RealAddr::from_ptr(unsafe { libc::calloc(count, size) })
    }

    unsafe fn realloc(&self, addr: RealAddr, size: usize) -> RealAddr {
        // SAFETY: caller guarantees `addr` came from this allocator.
        RealAddr::from_ptr(unsafe { libc::realloc(addr.as_ptr::<c_void>(), size) })
    }

    unsafe fn free(&self, addr: RealAddr) {
        // SAFETY: caller guarantees `addr` came from this allocator.
        unsafe { libc::free(addr.as_ptr::<c_void>()) }
    }

    unsafe fn usable_size(&self, addr: RealAddr) -> usize {
        // SAFETY: caller guarantees `addr` came from this allocator.
        unsafe { libc::malloc_usable_size(addr.as_ptr::<c_void>()) }
    }
}
