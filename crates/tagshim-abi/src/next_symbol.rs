//! Real allocator reached through the next definition of each symbol.

use std::ffi::c_void;
use std::mem;

use tagshim_core::{AllocSymbol, RealAddr, SymbolError};

use crate::bootstrap::{ARENA, BOOTSTRAP_ARENA_SIZE, BootstrapArena};
use crate::diag;
use crate::real::RealAllocator;
use crate::symbol_cache::{Lookup, SYMBOLS, SymbolCache};

type MallocFn = unsafe extern "C" fn(usize) -> *mut c_void;
type CallocFn = unsafe extern "C" fn(usize, usize) -> *mut c_void;
type ReallocFn = unsafe extern "C" fn(*mut c_void, usize) -> *mut c_void;
type FreeFn = unsafe extern "C" fn(*mut c_void);
type UsableSizeFn = unsafe extern "C" fn(*mut c_void) -> usize;

/// Forwards to the addresses bound in a [`SymbolCache`], falling back to a
/// [`BootstrapArena`] while a symbol is still being resolved on this thread.
pub struct NextSymbolAllocator<'a, const N: usize> {
    symbols: &'a SymbolCache,
    arena: &'a BootstrapArena<N>,
}

/// The allocator behind the exported entry points.
pub static NEXT: NextSymbolAllocator<'static, BOOTSTRAP_ARENA_SIZE> =
    NextSymbolAllocator::new(&SYMBOLS, &ARENA);

impl<'a, const N: usize> NextSymbolAllocator<'a, N> {
    #[must_use]
    pub const fn new(symbols: &'a SymbolCache, arena: &'a BootstrapArena<N>) -> Self {
        Self { symbols, arena }
    }

    #[must_use]
    pub fn symbols(&self) -> &'a SymbolCache {
        self.symbols
    }

    #[must_use]
    pub fn arena(&self) -> &'a BootstrapArena<N> {
        self.arena
    }

    /// Bound address, `None` while bootstrapping. A failed slot is fatal.
    fn bound(&self, symbol: AllocSymbol) -> Option<usize> {
        match self.symbols.lookup(symbol) {
            Lookup::Ready(addr) => Some(addr),
            Lookup::Bootstrapping => None,
            Lookup::Failed => diag::fatal(format_args!(
                "{}",
                SymbolError::Unbound {
                    symbol: symbol.name()
                }
            )),
        }
    }

    fn arena_alloc(&self, size: usize) -> RealAddr {
        self.arena
            .alloc(size)
            .map_or(RealAddr::NULL, |p| RealAddr::from_ptr(p.as_ptr()))
    }

    /// Move an arena chunk to a new allocation. The old chunk is abandoned.
    unsafe fn arena_realloc(&self, addr: RealAddr, size: usize) -> RealAddr {
        let old = self.arena.usable_size(addr.addr()).unwrap_or(0);
        // SAFETY: forwarding a C-contract malloc.
        let new = unsafe { self.malloc(size) };
        if !new.is_null() {
            // SAFETY: both ranges are live and distinct; the copy is bounded by
            // the smaller of the two sizes.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    addr.as_ptr::<u8>(),
                    new.as_ptr::<u8>(),
                    old.min(size),
                );
            }
        }
        new
    }
}

impl<const N: usize> RealAllocator for NextSymbolAllocator<'_, N> {
    unsafe fn malloc(&self, size: usize) -> RealAddr {
        match self.bound(AllocSymbol::Malloc) {
            Some(addr) => {
                // SAFETY: the slot holds the address of a C `malloc`.
                let real = unsafe { mem::transmute::<usize, MallocFn>(addr) };
                RealAddr::from_ptr(unsafe { real(size) })
            }
            None => self.arena_alloc(size),
        }
    }

    unsafe fn calloc(&self, count: usize, size: usize) -> RealAddr {
        match self.bound(AllocSymbol::Calloc) {
            Some(addr) => {
                // SAFETY: the slot holds the address of a C `calloc`.
                let real = unsafe { mem::transmute::<usize, CallocFn>(addr) };
                RealAddr::from_ptr(unsafe { real(count, size) })
            }
            None => match count.checked_mul(size) {
                Some(total) => {
                    let chunk = self.arena_alloc(total);
                    if !chunk.is_null() {
                        // SAFETY: fresh arena chunk of `total` bytes.
                        unsafe { core::ptr::write_bytes(chunk.as_ptr::<u8>(), 0, total) };
                    }
                    chunk
                }
                None => RealAddr::NULL,
            },
        }
    }

    unsafe fn realloc(&self, addr: RealAddr, size: usize) -> RealAddr {
        if self.arena.contains(addr.addr()) {
            // SAFETY: `addr` is a live arena chunk.
            return unsafe { self.arena_realloc(addr, size) };
        }
        match self.bound(AllocSymbol::Realloc) {
            Some(sym) => {
                // SAFETY: the slot holds the address of a C `realloc`.
                let real = unsafe { mem::transmute::<usize, ReallocFn>(sym) };
                RealAddr::from_ptr(unsafe { real(addr.as_ptr(), size) })
            }
            // A real chunk of unknown size cannot be moved into the arena.
            None if addr.is_null() => self.arena_alloc(size),
            None => RealAddr::NULL,
        }
    }

    unsafe fn free(&self, addr: RealAddr) {
        if addr.is_null() || self.arena.contains(addr.addr()) {
            return;
        }
        if let Some(sym) = self.bound(AllocSymbol::Free) {
            // SAFETY: the slot holds the address of a C `free`.
            let real = unsafe { mem::transmute::<usize, FreeFn>(sym) };
            unsafe { real(addr.as_ptr()) }
        }
    }

    unsafe fn usable_size(&self, addr: RealAddr) -> usize {
        if let Some(size) = self.arena.usable_size(addr.addr()) {
            return size;
        }
        match self.bound(AllocSymbol::MallocUsableSize) {
            Some(sym) => {
                // SAFETY: the slot holds the address of a C `malloc_usable_size`.
                let real = unsafe { mem::transmute::<usize, UsableSizeFn>(sym) };
                unsafe { real(addr.as_ptr()) }
            }
            None => 0,
        }
    }
}
