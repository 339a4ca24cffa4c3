//! Static arena for allocations made while an allocator symbol is being
//! resolved.
//!
//! `dlsym` may itself call `malloc`/`calloc` on the resolving thread. Those
//! requests cannot wait for the symbol they are part of resolving, so they are
//! carved out of a fixed static buffer instead. Chunks are never reused:
//! `free` of a chunk is a no-op, and the memory is zero until first handed out.
//!
//! Layout of a chunk: a 16-byte header holding the requested size, followed by
//! the payload, rounded up to 16 bytes.

use core::cell::UnsafeCell;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Alignment of every payload, and the size of the chunk header.
pub const CHUNK_ALIGN: usize = 16;

/// Size of the process-wide arena.
pub const BOOTSTRAP_ARENA_SIZE: usize = 64 * 1024;

#[repr(C, align(16))]
struct Storage<const N: usize>([u8; N]);

/// Lock-free bump arena over `N` static bytes.
pub struct BootstrapArena<const N: usize> {
    storage: UnsafeCell<Storage<N>>,
    next: AtomicUsize,
}

// SAFETY: chunks are handed out by a CAS bump on `next`, so no two callers
// ever receive overlapping ranges; header writes happen before the chunk is
// published to its only owner.
unsafe impl<const N: usize> Sync for BootstrapArena<N> {}

/// The arena behind the exported entry points.
pub static ARENA: BootstrapArena<BOOTSTRAP_ARENA_SIZE> = BootstrapArena::new();

impl<const N: usize> BootstrapArena<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: UnsafeCell::new(Storage([0; N])),
            next: AtomicUsize::new(0),
        }
    }

    fn base(&self) -> usize {
        self.storage.get() as usize
    }

    /// Allocate `size` bytes, or `None` once the arena is exhausted.
    pub fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        let payload = size.checked_add(CHUNK_ALIGN - 1)? & !(CHUNK_ALIGN - 1);
        let chunk = payload.checked_add(CHUNK_ALIGN)?;

        let mut offset = self.next.load(Ordering::Relaxed);
        loop {
            let end = offset.checked_add(chunk)?;
            if end > N {
                return None;
            }
            match self
                .next
                .compare_exchange_weak(offset, end, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => offset = current,
            }
        }

        let header = (self.base() + offset) as *mut usize;
        // SAFETY: [offset, offset + chunk) lies inside the storage, was
        // claimed exclusively above, and is 16-byte aligned.
        unsafe {
            header.write(size);
            NonNull::new(header.cast::<u8>().add(CHUNK_ALIGN))
        }
    }

    /// True if `addr` is a payload address inside this arena.
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base();
        addr >= base + CHUNK_ALIGN && addr < base + N
    }

    /// Requested size of the chunk at `addr`, if it belongs to this arena.
    #[must_use]
    pub fn usable_size(&self, addr: usize) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        // SAFETY: every payload handed out is preceded by its header, and the
        // header slot is aligned for `usize`.
        Some(unsafe { ((addr - CHUNK_ALIGN) as *const usize).read() })
    }

    /// Bytes handed out so far, headers included.
    #[must_use]
    pub fn used(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for BootstrapArena<N> {
    fn default() -> Self {
        Self::new()
    }
}
