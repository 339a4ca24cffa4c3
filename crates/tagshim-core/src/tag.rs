//! Real and presented addresses.
//!
//! The real allocator only ever sees a [`RealAddr`]; the application only ever
//! sees a [`PresentedAddr`]. The two are related by XOR with a [`TagMask`],
//! which is self-inverse, and there is no implicit conversion between them.

use crate::predicate;

/// Bit position of the lowest tag bit.
pub const TAG_SHIFT: u32 = 48;

/// Bits 48..=63 of a 64-bit address.
pub const HIGH_BITS_MASK: u64 = 0xFFFF_0000_0000_0000;

/// Tag value used when nothing else is configured.
pub const DEFAULT_TAG: u16 = 0x0001;

/// A 16-bit tag placed in the high address bits.
///
/// The tag is never zero: a zero tag would make tagging the identity and the
/// null pointer would satisfy the strict predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagMask(u64);

impl TagMask {
    pub const DEFAULT: Self = Self((DEFAULT_TAG as u64) << TAG_SHIFT);

    /// Build a mask from a 16-bit tag. Returns `None` for a zero tag.
    #[must_use]
    pub const fn from_tag(tag: u16) -> Option<Self> {
        if tag == 0 {
            None
        } else {
            Some(Self((tag as u64) << TAG_SHIFT))
        }
    }

    /// The 16-bit tag value.
    #[must_use]
    pub const fn tag(self) -> u16 {
        (self.0 >> TAG_SHIFT) as u16
    }

    /// The mask as a full 64-bit pattern.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl Default for TagMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An address as returned by (and handed back to) the real allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RealAddr(usize);

impl RealAddr {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[must_use]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Tagged view of this address. Null stays null so callers keep their
    /// null-check contract.
    #[must_use]
    pub const fn tag(self, mask: TagMask) -> PresentedAddr {
        if self.is_null() {
            PresentedAddr::NULL
        } else {
            PresentedAddr(xor(self.0, mask))
        }
    }

    /// Untagged view of this address.
    #[must_use]
    pub const fn plain(self) -> PresentedAddr {
        PresentedAddr(self.0)
    }
}

/// An address as returned to (and accepted from) the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresentedAddr(usize);

impl PresentedAddr {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[must_use]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// True iff the high bits carry exactly `mask`.
    #[must_use]
    pub const fn is_tagged(self, mask: TagMask) -> bool {
        predicate::matches_tag(self.0 as u64, mask)
    }

    /// Remove the tag. Only meaningful when [`Self::is_tagged`] holds; use
    /// [`Self::resolve`] when the tag state is unknown.
    #[must_use]
    pub const fn untag(self, mask: TagMask) -> RealAddr {
        RealAddr(xor(self.0, mask))
    }

    /// Recover the real address, untagging only if this layer tagged it.
    #[must_use]
    pub const fn resolve(self, mask: TagMask) -> RealAddr {
        if self.is_tagged(mask) {
            self.untag(mask)
        } else {
            RealAddr(self.0)
        }
    }
}

#[inline]
const fn xor(addr: usize, mask: TagMask) -> usize {
    ((addr as u64) ^ mask.bits()) as usize
}
