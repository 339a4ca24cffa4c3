//! Tag predicates.
//!
//! Two strictness levels:
//! - [`is_encoded_pointer`] treats any non-zero high-bit pattern as encoded.
//!   External consumers use it; it does not depend on the configured tag.
//! - [`matches_tag`] checks for one exact tag. The interposer uses it to decide
//!   whether it produced a tag and must therefore remove it.
//!
//! All functions are pure and total over 64-bit values.

use crate::tag::{HIGH_BITS_MASK, TagMask};

/// Canonical-address value mask (bits 0..=47).
pub const ADDRESS_BITS_MASK: u64 = !HIGH_BITS_MASK;

/// Width of a stack-pointer offset: 22 offset bits plus 3 alignment bits.
pub const STACK_OFFSET_BITS: u32 = 22 + 3;

/// True iff any of bits 48..=63 is set.
#[inline]
#[must_use]
pub const fn is_encoded_pointer(addr: u64) -> bool {
    addr & HIGH_BITS_MASK != 0
}

/// True iff bits 48..=63 equal `mask` exactly.
#[inline]
#[must_use]
pub const fn matches_tag(addr: u64, mask: TagMask) -> bool {
    addr & HIGH_BITS_MASK == mask.bits()
}

/// True iff a return address carries an encoding, i.e. its top 16 bits are
/// neither all-zero (user half) nor all-one (kernel half).
#[inline]
#[must_use]
pub const fn is_encoded_return_address(addr: u64) -> bool {
    let top = addr >> 48;
    top != 0xFFFF && top != 0x0000
}

/// Strip the encoding from a return address. Canonical addresses pass through.
#[inline]
#[must_use]
pub const fn clean_return_address(addr: u64) -> u64 {
    if is_encoded_return_address(addr) {
        addr & ADDRESS_BITS_MASK
    } else {
        addr
    }
}

/// Low [`STACK_OFFSET_BITS`] bits of a stack pointer.
#[inline]
#[must_use]
pub const fn stack_pointer_offset(sp: u64) -> u64 {
    sp & !(u64::MAX << STACK_OFFSET_BITS)
}
