//! Lazily bound addresses of the real allocator entry points.
//!
//! One slot per [`AllocSymbol`]. Each slot moves through
//! UNRESOLVED -> RESOLVING -> READY (or FAILED) exactly once:
//! - the first caller claims the slot by CAS and runs the resolver;
//! - other threads spin until the claimant publishes;
//! - a request from the claimant's own thread (the loader allocating while it
//!   resolves) gets [`Lookup::Bootstrapping`] instead of waiting on itself.
//!
//! `OnceLock` is not used: its futex wait would deadlock on that same-thread
//! reentry.

use core::cell::Cell;
use core::sync::atomic::{AtomicU8, AtomicU32, AtomicUsize, Ordering};
use std::ffi::CStr;

use tagshim_core::{AllocSymbol, SymbolError};

const STATE_UNRESOLVED: u8 = 0;
const STATE_RESOLVING: u8 = 1;
const STATE_READY: u8 = 2;
const STATE_FAILED: u8 = 3;

/// Produces the non-null address of a symbol's real implementation.
pub type Resolver = fn(AllocSymbol) -> Result<usize, SymbolError>;

/// Outcome of a slot lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Ready(usize),
    /// This thread is resolving the symbol right now.
    Bootstrapping,
    Failed,
}

struct Slot {
    state: AtomicU8,
    addr: AtomicUsize,
    binds: AtomicU32,
}

impl Slot {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_UNRESOLVED),
            addr: AtomicUsize::new(0),
            binds: AtomicU32::new(0),
        }
    }
}

thread_local! {
    // Bit per AllocSymbol index: set while this thread runs that resolver.
    static RESOLVING_HERE: Cell<u8> = const { Cell::new(0) };
}

struct ResolvingGuard {
    bit: u8,
}

impl ResolvingGuard {
    fn enter(symbol: AllocSymbol) -> Self {
        let bit = 1 << symbol.index();
        let _ = RESOLVING_HERE.try_with(|mask| mask.set(mask.get() | bit));
        Self { bit }
    }
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        let _ = RESOLVING_HERE.try_with(|mask| mask.set(mask.get() & !self.bit));
    }
}

fn resolving_on_this_thread(symbol: AllocSymbol) -> bool {
    RESOLVING_HERE
        .try_with(|mask| mask.get() & (1 << symbol.index()) != 0)
        .unwrap_or(false)
}

/// Per-process table of real allocator entry points.
pub struct SymbolCache {
    slots: [Slot; AllocSymbol::COUNT],
    resolver: Resolver,
}

/// The table behind the exported entry points.
pub static SYMBOLS: SymbolCache = SymbolCache::new(resolve_next);

impl SymbolCache {
    #[must_use]
    pub const fn new(resolver: Resolver) -> Self {
        Self {
            slots: [const { Slot::new() }; AllocSymbol::COUNT],
            resolver,
        }
    }

    /// Address of `symbol`, binding it on first use.
    pub fn lookup(&self, symbol: AllocSymbol) -> Lookup {
        let slot = &self.slots[symbol.index()];
        loop {
            match slot.state.load(Ordering::Acquire) {
                STATE_READY => return Lookup::Ready(slot.addr.load(Ordering::Acquire)),
                STATE_FAILED => return Lookup::Failed,
                STATE_RESOLVING => {
                    if resolving_on_this_thread(symbol) {
                        return Lookup::Bootstrapping;
                    }
                    core::hint::spin_loop();
                }
                _ => {
                    if slot
                        .state
                        .compare_exchange(
                            STATE_UNRESOLVED,
                            STATE_RESOLVING,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return self.bind(slot, symbol);
                    }
                }
            }
        }
    }

    fn bind(&self, slot: &Slot, symbol: AllocSymbol) -> Lookup {
        let result = {
            let _guard = ResolvingGuard::enter(symbol);
            (self.resolver)(symbol)
        };
        match result {
            Ok(addr) if addr != 0 => {
                slot.addr.store(addr, Ordering::Release);
                slot.binds.fetch_add(1, Ordering::Relaxed);
                slot.state.store(STATE_READY, Ordering::Release);
                Lookup::Ready(addr)
            }
            Ok(_) => {
                diag!(
                    "{}",
                    SymbolError::Unresolved {
                        symbol: symbol.name()
                    }
                );
                slot.state.store(STATE_FAILED, Ordering::Release);
                Lookup::Failed
            }
            Err(err) => {
                diag!("{err}");
                slot.state.store(STATE_FAILED, Ordering::Release);
                Lookup::Failed
            }
        }
    }

    /// How many times `symbol` has been bound. At most one.
    #[must_use]
    pub fn bind_count(&self, symbol: AllocSymbol) -> u32 {
        self.slots[symbol.index()].binds.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_bound(&self, symbol: AllocSymbol) -> bool {
        self.slots[symbol.index()].state.load(Ordering::Acquire) == STATE_READY
    }
}

/// Resolve the next definition of `symbol` after this object, the way an
/// interposer must.
pub fn resolve_next(symbol: AllocSymbol) -> Result<usize, SymbolError> {
    // SAFETY: clears any stale error; dlerror has no preconditions.
    unsafe {
        libc::dlerror();
    }
    // SAFETY: the name is a valid NUL-terminated string with static lifetime.
    let addr = unsafe { libc::dlsym(libc::RTLD_NEXT, symbol.c_name().as_ptr()) };
    if !addr.is_null() {
        return Ok(addr as usize);
    }

    // SAFETY: dlerror returns null or a NUL-terminated string owned by the
    // loader, valid until the next dl* call on this thread.
    let reason = unsafe {
        let msg = libc::dlerror();
        if msg.is_null() {
            b"symbol not found".as_slice()
        } else {
            CStr::from_ptr(msg).to_bytes()
        }
    };
    diag!(
        "dlsym(RTLD_NEXT, {}) failed: {}",
        symbol.name(),
        core::str::from_utf8(reason).unwrap_or("<non-UTF-8 loader message>")
    );
    Err(SymbolError::Unresolved {
        symbol: symbol.name(),
    })
}
