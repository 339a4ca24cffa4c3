//! The exported entry points against the real C allocator.
//!
//! Debug builds export nothing unmangled, so these calls go through the shim
//! while the test binary keeps its normal allocator. Tagged pointers are never
//! dereferenced here: stock CPUs fault on them.
//!
//! Release builds export these symbols unmangled, which would hand tagged
//! pointers to the test runner itself, so the file only runs in debug builds.
#![cfg(debug_assertions)]

use std::ffi::c_void;

use tagshim_abi::malloc_abi::{calloc, free, malloc, malloc_usable_size, realloc};
use tagshim_abi::symbol_cache::SYMBOLS;
use tagshim_core::predicate::is_encoded_pointer;
use tagshim_core::{AllocSymbol, PresentedAddr, TagMask};

fn is_tagged(ptr: *mut c_void) -> bool {
    PresentedAddr::from_ptr(ptr).is_tagged(TagMask::DEFAULT)
}

#[test]
fn test_small_malloc_is_tagged() {
    unsafe {
        let p = malloc(8);
        assert!(!p.is_null());
        assert!(is_tagged(p));
        assert!(malloc_usable_size(p) >= 8);
        free(p);
    }
    assert!(SYMBOLS.is_bound(AllocSymbol::Malloc));
}

#[test]
fn test_large_malloc_is_usable_memory() {
    unsafe {
        let p = malloc(64).cast::<u8>();
        assert!(!is_encoded_pointer(p as u64));
        for i in 0..64 {
            p.add(i).write(i as u8);
        }
        let q = realloc(p.cast(), 4096).cast::<u8>();
        assert!(!is_encoded_pointer(q as u64));
        for i in 0..64 {
            assert_eq!(q.add(i).read(), i as u8);
        }
        free(q.cast());
    }
}

#[test]
fn test_tagged_object_grows_through_realloc() {
    unsafe {
        let p = malloc(4);
        assert!(is_tagged(p));
        let q = realloc(p, 1 << 16);
        assert!(!q.is_null());
        assert!(is_tagged(q));
        assert!(malloc_usable_size(q) >= 1 << 16);
        free(q);
    }
}

#[test]
fn test_calloc_with_large_elements_is_zeroed() {
    unsafe {
        let p = calloc(8, 16).cast::<u8>();
        assert!(!p.is_null());
        assert!(!is_tagged(p.cast()));
        let bytes = std::slice::from_raw_parts(p, 128);
        assert!(bytes.iter().all(|&b| b == 0));
        free(p.cast());
    }
}

#[test]
fn test_realloc_null_allocates_and_null_is_harmless() {
    unsafe {
        let p = realloc(std::ptr::null_mut(), 32);
        assert!(!p.is_null());
        assert!(!is_tagged(p));
        free(p);
        free(std::ptr::null_mut());
        assert_eq!(malloc_usable_size(std::ptr::null_mut()), 0);
    }
}

#[test]
fn test_calloc_overflow_returns_null() {
    unsafe {
        assert!(calloc(usize::MAX, 16).is_null());
    }
}
