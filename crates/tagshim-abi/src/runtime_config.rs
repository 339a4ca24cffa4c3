//! Process-wide tagging configuration.
//!
//! Read from the environment on the first entry-point call and frozen from
//! then on, so every allocation in the process uses the same tag. Uses a
//! manual UNINIT -> RESOLVING -> READY state machine rather than `OnceLock`;
//! resolution only calls `getenv` and `write`, neither of which allocates.

use core::sync::atomic::{AtomicU8, AtomicU16, AtomicUsize, Ordering};
use std::ffi::CStr;

use tagshim_core::{ReallocPolicy, TagConfig, TagMask};

const STATE_UNINIT: u8 = 0;
const STATE_RESOLVING: u8 = 1;
const STATE_READY: u8 = 2;

const FLAG_TRACE: u8 = 1 << 0;
const FLAG_REALLOC_BY_SIZE: u8 = 1 << 1;

/// Longest variable name `getenv_bytes` can look up.
const ENV_NAME_CAPACITY: usize = 64;

/// A [`TagConfig`] published once through atomics.
pub struct AtomicConfig {
    state: AtomicU8,
    tag: AtomicU16,
    threshold: AtomicUsize,
    flags: AtomicU8,
}

static ACTIVE: AtomicConfig = AtomicConfig::new();

impl AtomicConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_UNINIT),
            tag: AtomicU16::new(0),
            threshold: AtomicUsize::new(0),
            flags: AtomicU8::new(0),
        }
    }

    /// The published configuration, running `init` if nobody has yet.
    /// Threads that arrive while another thread runs `init` spin.
    pub fn get_or_init(&self, init: impl FnOnce() -> TagConfig) -> TagConfig {
        loop {
            match self.state.load(Ordering::Acquire) {
                STATE_READY => return self.load(),
                STATE_RESOLVING => core::hint::spin_loop(),
                _ => {
                    if self
                        .state
                        .compare_exchange(
                            STATE_UNINIT,
                            STATE_RESOLVING,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        let config = init();
                        self.store(&config);
                        self.state.store(STATE_READY, Ordering::Release);
                        return config;
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_READY
    }

    fn store(&self, config: &TagConfig) {
        let mut flags = 0;
        if config.trace {
            flags |= FLAG_TRACE;
        }
        if config.realloc_policy == ReallocPolicy::BySize {
            flags |= FLAG_REALLOC_BY_SIZE;
        }
        self.tag.store(config.mask.tag(), Ordering::Relaxed);
        self.threshold
            .store(config.small_object_threshold, Ordering::Relaxed);
        self.flags.store(flags, Ordering::Relaxed);
    }

    fn load(&self) -> TagConfig {
        let flags = self.flags.load(Ordering::Relaxed);
        TagConfig {
            mask: TagMask::from_tag(self.tag.load(Ordering::Relaxed)).unwrap_or_default(),
            small_object_threshold: self.threshold.load(Ordering::Relaxed),
            trace: flags & FLAG_TRACE != 0,
            realloc_policy: if flags & FLAG_REALLOC_BY_SIZE != 0 {
                ReallocPolicy::BySize
            } else {
                ReallocPolicy::Inherit
            },
        }
    }
}

impl Default for AtomicConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The process configuration, resolved from the environment on first use.
pub fn active() -> TagConfig {
    ACTIVE.get_or_init(from_environment)
}

/// Resolve a configuration from the process environment. Invalid values are
/// reported on stderr and fall back to their defaults.
pub fn from_environment() -> TagConfig {
    TagConfig::resolve(getenv_bytes, |err| diag!("{err}; using default"))
}

/// `getenv` without allocating: the name is NUL-terminated in a stack buffer.
fn getenv_bytes(name: &'static str) -> Option<&'static [u8]> {
    let mut buf = [0u8; ENV_NAME_CAPACITY];
    if name.len() >= buf.len() {
        return None;
    }
    buf[..name.len()].copy_from_slice(name.as_bytes());
    // SAFETY: `buf` is NUL-terminated.
    let value = unsafe { libc::getenv(buf.as_ptr().cast()) };
    if value.is_null() {
        return None;
    }
    // SAFETY: getenv returned a NUL-terminated string owned by the
    // environment; it is parsed before this call's caller returns.
    Some(unsafe { CStr::from_ptr(value) }.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    #[test]
    fn published_config_round_trips() {
        let config = TagConfig {
            mask: TagMask::from_tag(0xBEEF).unwrap(),
            small_object_threshold: 64,
            trace: true,
            realloc_policy: ReallocPolicy::BySize,
        };
        let cell = AtomicConfig::new();
        assert!(!cell.is_ready());
        assert_eq!(cell.get_or_init(|| config), config);
        assert!(cell.is_ready());
        assert_eq!(cell.get_or_init(|| TagConfig::DEFAULT), config);
    }

    #[test]
    fn concurrent_first_use_initializes_once() {
        const THREADS: usize = 8;
        let calls = AtomicU32::new(0);
        let cell = AtomicConfig::new();
        let barrier = Barrier::new(THREADS);
        let seen: Vec<TagConfig> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cell.get_or_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            TagConfig {
                                small_object_threshold: 32,
                                ..TagConfig::DEFAULT
                            }
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.iter().all(|c| c.small_object_threshold == 32));
    }

    #[test]
    fn unset_variables_are_absent() {
        assert_eq!(getenv_bytes("TAGSHIM_TEST_SURELY_UNSET_VARIABLE"), None);
    }

    #[test]
    fn overlong_names_are_not_looked_up() {
        let name = "TAGSHIM_THIS_NAME_IS_LONGER_THAN_THE_STACK_BUFFER_USED_FOR_GETENV_X";
        assert!(name.len() >= ENV_NAME_CAPACITY);
        assert_eq!(getenv_bytes(name), None);
    }

    #[test]
    fn active_config_is_stable() {
        assert_eq!(active(), active());
        assert!(ACTIVE.is_ready());
    }
}
