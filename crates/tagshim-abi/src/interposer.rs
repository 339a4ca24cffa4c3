//! The tagging engine behind the exported entry points.
//!
//! Each call forwards the request verbatim to the real allocator and applies
//! the tagging policy to the way pointers cross the boundary:
//! - fresh allocations are tagged iff their single-object size is small;
//! - pointers coming back are untagged iff they carry exactly this tag;
//! - a null pointer is never tagged.

use tagshim_core::policy::{classify_allocation, classify_incoming, classify_realloc_result};
use tagshim_core::{PresentedAddr, TagConfig};

use crate::memory::{Hardware, PresentedMemory};
use crate::real::RealAllocator;

/// Interposer over a real allocator `A`, touching presented memory through `M`.
pub struct Interposer<'a, A: ?Sized, M = Hardware> {
    real: &'a A,
    memory: M,
    config: TagConfig,
}

impl<'a, A, M> Interposer<'a, A, M>
where
    A: RealAllocator + ?Sized,
    M: PresentedMemory,
{
    #[must_use]
    pub const fn new(real: &'a A, memory: M, config: TagConfig) -> Self {
        Self {
            real,
            memory,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    /// `malloc`: tag the result iff `size` is below the threshold.
    ///
    /// # Safety
    ///
    /// Same contract as C `malloc`.
    pub unsafe fn malloc(&self, size: usize) -> PresentedAddr {
        // SAFETY: forwarded verbatim.
        let real = unsafe { self.real.malloc(size) };
        let presented = classify_allocation(&self.config, size).present(real, &self.config);
        if self.config.trace {
            diag!("malloc({size}) = {:#x}", presented.addr());
        }
        presented
    }

    /// `calloc`: classify by the element size, then zero the whole region
    /// through the presented address.
    ///
    /// # Safety
    ///
    /// Same contract as C `calloc`; `M` must be able to write through the
    /// presented address.
    pub unsafe fn calloc(&self, count: usize, size: usize) -> PresentedAddr {
        // SAFETY: forwarded verbatim.
        let real = unsafe { self.real.calloc(count, size) };
        let presented = classify_allocation(&self.config, size).present(real, &self.config);
        if !presented.is_null() {
            // A non-null calloc result means the product did not overflow.
            // SAFETY: the real allocation spans `count * size` bytes.
            unsafe {
                self.memory
                    .zero(presented, self.config.mask, count.wrapping_mul(size));
            }
        }
        if self.config.trace {
            diag!("calloc({count}, {size}) = {:#x}", presented.addr());
        }
        presented
    }

    /// `realloc`: untag the incoming pointer if this layer tagged it, and
    /// classify the result under the configured realloc policy.
    ///
    /// # Safety
    ///
    /// `addr` must be null or a live pointer returned by this interposer.
    pub unsafe fn realloc(&self, addr: PresentedAddr, size: usize) -> PresentedAddr {
        let incoming = classify_incoming(&self.config, addr);
        // SAFETY: `resolve` yields the address the real allocator handed out.
        let real = unsafe { self.real.realloc(addr.resolve(self.config.mask), size) };
        let presented =
            classify_realloc_result(&self.config, incoming, size).present(real, &self.config);
        if self.config.trace {
            diag!(
                "realloc({:#x}, {size}) = {:#x}",
                addr.addr(),
                presented.addr()
            );
        }
        presented
    }

    /// `free`: null returns at once; otherwise the real address is freed.
    ///
    /// # Safety
    ///
    /// `addr` must be null or a live pointer returned by this interposer.
    pub unsafe fn free(&self, addr: PresentedAddr) {
        if addr.is_null() {
            return;
        }
        if self.config.trace {
            diag!("free({:#x})", addr.addr());
        }
        // SAFETY: `resolve` yields the address the real allocator handed out.
        unsafe { self.real.free(addr.resolve(self.config.mask)) }
    }

    /// `malloc_usable_size`: null reports 0 without reaching the allocator.
    ///
    /// # Safety
    ///
    /// `addr` must be null or a live pointer returned by this interposer.
    pub unsafe fn usable_size(&self, addr: PresentedAddr) -> usize {
        if addr.is_null() {
            return 0;
        }
        // SAFETY: `resolve` yields the address the real allocator handed out.
        unsafe { self.real.usable_size(addr.resolve(self.config.mask)) }
    }
}
