//! Allocator entry points the shim interposes.

use std::ffi::CStr;

/// One interposed allocator entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AllocSymbol {
    Malloc = 0,
    Calloc = 1,
    Realloc = 2,
    Free = 3,
    MallocUsableSize = 4,
}

impl AllocSymbol {
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Malloc,
        Self::Calloc,
        Self::Realloc,
        Self::Free,
        Self::MallocUsableSize,
    ];

    /// Symbol name as passed to the loader.
    #[must_use]
    pub const fn c_name(self) -> &'static CStr {
        match self {
            Self::Malloc => c"malloc",
            Self::Calloc => c"calloc",
            Self::Realloc => c"realloc",
            Self::Free => c"free",
            Self::MallocUsableSize => c"malloc_usable_size",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Malloc => "malloc",
            Self::Calloc => "calloc",
            Self::Realloc => "realloc",
            Self::Free => "free",
            Self::MallocUsableSize => "malloc_usable_size",
        }
    }

    /// Dense index, usable for per-symbol tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}
