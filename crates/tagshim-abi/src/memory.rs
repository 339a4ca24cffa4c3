//! How the shim touches memory through a presented address.
//!
//! Only `calloc` writes through a presented pointer. On tag-aware hardware (or
//! a simulator) the tagged address is usable as is; stock CPUs fault on it, so
//! code that must run there strips the tag first.

use tagshim_core::{PresentedAddr, TagMask};

/// Access strategy for memory named by a presented address.
pub trait PresentedMemory {
    /// Zero `len` bytes starting at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must name `len` writable bytes of a live allocation once
    /// interpreted by this strategy.
    unsafe fn zero(&self, addr: PresentedAddr, mask: TagMask, len: usize);
}

/// Write through the presented address unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hardware;

impl PresentedMemory for Hardware {
    unsafe fn zero(&self, addr: PresentedAddr, _mask: TagMask, len: usize) {
        // SAFETY: upheld by the caller.
        unsafe { core::ptr::write_bytes(addr.as_ptr::<u8>(), 0, len) }
    }
}

/// Strip this layer's tag before touching memory, as address-masking
/// hardware would.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagIgnoring;

impl TagIgnoring {
    /// The address the hardware would actually access.
    #[must_use]
    pub fn effective<T>(addr: PresentedAddr, mask: TagMask) -> *mut T {
        addr.resolve(mask).as_ptr()
    }
}

impl PresentedMemory for TagIgnoring {
    unsafe fn zero(&self, addr: PresentedAddr, mask: TagMask, len: usize) {
        // SAFETY: upheld by the caller.
        unsafe { core::ptr::write_bytes(Self::effective::<u8>(addr, mask), 0, len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagshim_core::RealAddr;

    #[test]
    fn tag_ignoring_zeroes_the_real_bytes() {
        let mask = TagMask::DEFAULT;
        let mut buf = [0xAAu8; 8];
        let presented = RealAddr::from_ptr(buf.as_mut_ptr()).tag(mask);
        unsafe { TagIgnoring.zero(presented, mask, 5) };
        assert_eq!(buf, [0, 0, 0, 0, 0, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn hardware_writes_through_an_untagged_address() {
        let mut buf = [0x55u8; 4];
        let presented = RealAddr::from_ptr(buf.as_mut_ptr()).plain();
        unsafe { Hardware.zero(presented, TagMask::DEFAULT, 4) };
        assert_eq!(buf, [0; 4]);
    }
}
