#![warn(missing_docs)]

//! Page-granular memory provider for the vcad ray tracing kernels.
//!
//! Large acceleration-structure buffers are mapped directly from the
//! operating system. Requests that look like they benefit from 2 MiB pages
//! are rounded to that granularity and first tried with explicit huge pages;
//! everything else is rounded to 4 KiB.
//!
//! # Example
//!
//! ```
//! use vcad_kernel_alloc::{AllocFlags, OsMemory, PageBuffer};
//!
//! let memory = OsMemory::new();
//! let mut buf = PageBuffer::new(&memory, 10_000, AllocFlags::default()).unwrap();
//! buf.as_mut_slice()[0] = 7;
//! assert_eq!(buf.len(), 10_000);
//! ```

mod buffer;
mod error;
mod os;

pub use buffer::PageBuffer;
pub use error::{AllocError, Result};
pub use os::OsMemory;

use std::ptr::NonNull;

/// Small page granularity.
pub const PAGE_SIZE_4K: usize = 4 * 1024;

/// Huge page granularity.
pub const PAGE_SIZE_2M: usize = 2 * 1024 * 1024;

/// Round `value` up to a multiple of the power-of-two `align`.
///
/// Returns `None` when the rounded value does not fit in `usize`.
#[inline]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Whether a request of `bytes` should be served from 2 MiB pages.
///
/// Exact multiples of 2 MiB qualify, as do requests of at least 128 MiB
/// where rounding wastes at most a few percent.
pub fn is_huge_page_candidate(bytes: usize) -> bool {
    if bytes < PAGE_SIZE_2M {
        return false;
    }
    bytes % PAGE_SIZE_2M == 0 || bytes >= 64 * PAGE_SIZE_2M
}

/// Page granularity used for a request of `bytes`.
pub fn page_size_for(bytes: usize) -> usize {
    if is_huge_page_candidate(bytes) {
        PAGE_SIZE_2M
    } else {
        PAGE_SIZE_4K
    }
}

/// Options for [`MemoryProvider::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocFlags {
    /// Allow huge pages for candidate sizes.
    pub huge_pages: bool,
}

impl Default for AllocFlags {
    fn default() -> Self {
        Self { huge_pages: true }
    }
}

/// Raw page-granular memory source.
///
/// Sizes passed in are the caller's logical sizes; implementations round
/// them to the page class chosen by [`page_size_for`] before any OS call,
/// so the same logical size must be passed back to [`shrink`](Self::shrink)
/// and [`free`](Self::free).
pub trait MemoryProvider {
    /// Reserve address space for `bytes`.
    fn reserve(&self, bytes: usize) -> Result<NonNull<u8>>;

    /// Make a reserved range usable.
    ///
    /// # Safety
    /// `ptr..ptr + bytes` must lie inside a range returned by `reserve`.
    unsafe fn commit(&self, ptr: NonNull<u8>, bytes: usize) -> Result<()>;

    /// Allocate `bytes` of zeroed, readable and writable memory.
    fn allocate(&self, bytes: usize, flags: AllocFlags) -> Result<NonNull<u8>>;

    /// Release the tail of an allocation, returning the size now backing it.
    ///
    /// # Safety
    /// `ptr` must come from this provider with logical size `old`, and no
    /// reference into the released tail may outlive the call.
    unsafe fn shrink(&self, ptr: NonNull<u8>, new: usize, old: usize) -> Result<usize>;

    /// Return an allocation to the system.
    ///
    /// # Safety
    /// `ptr` must come from this provider with logical size `bytes` and must
    /// not be used afterwards.
    unsafe fn free(&self, ptr: NonNull<u8>, bytes: usize) -> Result<()>;
}
