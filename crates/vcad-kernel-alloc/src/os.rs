//! Operating system backed [`MemoryProvider`].

use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    align_up, is_huge_page_candidate, page_size_for, AllocError, AllocFlags, MemoryProvider,
    Result,
};

/// Memory provider mapping anonymous pages from the operating system.
///
/// The first failed explicit huge page mapping disables further attempts
/// for the lifetime of the provider; later candidates go straight to the
/// regular mapping with a transparent huge page hint.
#[derive(Debug)]
pub struct OsMemory {
    try_direct_huge_pages: AtomicBool,
}

impl OsMemory {
    /// Create a provider that will attempt explicit huge pages.
    pub const fn new() -> Self {
        Self {
            try_direct_huge_pages: AtomicBool::new(true),
        }
    }

    /// Whether explicit huge page mappings are still attempted.
    pub fn direct_huge_pages_enabled(&self) -> bool {
        self.try_direct_huge_pages.load(Ordering::Relaxed)
    }

    fn map(&self, bytes: usize, flags: AllocFlags) -> Result<NonNull<u8>> {
        if bytes == 0 {
            return Ok(NonNull::dangling());
        }

        // rounding follows the size class even without huge pages so that
        // `free` and `shrink` recompute the same mapped length
        let huge = flags.huge_pages && is_huge_page_candidate(bytes);
        let bytes = align_up(bytes, page_size_for(bytes)).ok_or(AllocError::OutOfMemory { bytes })?;

        if huge && sys::HAS_DIRECT_HUGE_PAGES && self.direct_huge_pages_enabled() {
            // SAFETY: fresh anonymous mapping, no existing memory is touched
            match unsafe { sys::map(bytes, true) } {
                Some(ptr) => return Ok(ptr),
                None => {
                    self.try_direct_huge_pages.store(false, Ordering::Relaxed);
                    log::warn!(
                        "explicit huge page mapping of {} bytes failed, disabling direct huge pages",
                        bytes
                    );
                }
            }
        }

        // SAFETY: as above
        let ptr = unsafe { sys::map(bytes, false) }.ok_or(AllocError::OutOfMemory { bytes })?;
        if flags.huge_pages {
            // SAFETY: `ptr..ptr + bytes` was just mapped
            unsafe { sys::advise_huge_pages(ptr, bytes) };
        }
        Ok(ptr)
    }
}

impl Default for OsMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider for OsMemory {
    fn reserve(&self, bytes: usize) -> Result<NonNull<u8>> {
        // pages are populated on first touch, so reserving is allocating
        self.map(bytes, AllocFlags::default())
    }

    unsafe fn commit(&self, _ptr: NonNull<u8>, _bytes: usize) -> Result<()> {
        Ok(())
    }

    fn allocate(&self, bytes: usize, flags: AllocFlags) -> Result<NonNull<u8>> {
        self.map(bytes, flags)
    }

    unsafe fn shrink(&self, ptr: NonNull<u8>, new: usize, old: usize) -> Result<usize> {
        assert!(new <= old, "shrink cannot grow an allocation ({new} > {old})");
        let page = page_size_for(old);
        let mapped = align_up(old, page).ok_or(AllocError::OutOfMemory { bytes: old })?;
        let new = align_up(new, page).ok_or(AllocError::OutOfMemory { bytes: new })?;
        if new >= old || !sys::CAN_RELEASE_TAIL {
            return Ok(old);
        }
        let tail = mapped - new;
        // SAFETY: the tail lies inside the original mapping per the caller contract
        if sys::unmap(NonNull::new_unchecked(ptr.as_ptr().add(new)), tail) {
            Ok(new)
        } else {
            Err(AllocError::OutOfMemory { bytes: tail })
        }
    }

    unsafe fn free(&self, ptr: NonNull<u8>, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        let bytes = align_up(bytes, page_size_for(bytes)).ok_or(AllocError::OutOfMemory { bytes })?;
        // SAFETY: caller contract
        if sys::unmap(ptr, bytes) {
            Ok(())
        } else {
            Err(AllocError::OutOfMemory { bytes })
        }
    }
}

#[cfg(unix)]
mod sys {
    use std::ptr::NonNull;

    pub const HAS_DIRECT_HUGE_PAGES: bool = cfg!(any(target_os = "linux", target_os = "android"));
    pub const CAN_RELEASE_TAIL: bool = true;

    pub unsafe fn map(bytes: usize, huge: bool) -> Option<NonNull<u8>> {
        let mut flags = libc::MAP_PRIVATE | libc::MAP_ANON;
        #[cfg(any(target_os = "linux", target_os = "android"))]
        if huge {
            flags |= libc::MAP_HUGETLB;
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let _ = huge;

        let ptr = libc::mmap(
            std::ptr::null_mut(),
            bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            flags,
            -1,
            0,
        );
        if ptr == libc::MAP_FAILED {
            return None;
        }
        NonNull::new(ptr.cast())
    }

    pub unsafe fn advise_huge_pages(ptr: NonNull<u8>, bytes: usize) {
        #[cfg(target_os = "linux")]
        {
            // a refused hint leaves regular pages in place
            let _ = libc::madvise(ptr.as_ptr().cast(), bytes, libc::MADV_HUGEPAGE);
        }
        #[cfg(not(target_os = "linux"))]
        let _ = (ptr, bytes);
    }

    pub unsafe fn unmap(ptr: NonNull<u8>, bytes: usize) -> bool {
        libc::munmap(ptr.as_ptr().cast(), bytes) == 0
    }
}

#[cfg(not(unix))]
mod sys {
    use std::alloc::{alloc_zeroed, dealloc, Layout};
    use std::ptr::NonNull;

    use crate::page_size_for;

    pub const HAS_DIRECT_HUGE_PAGES: bool = false;
    // the global allocator cannot release a tail, the region stays whole
    pub const CAN_RELEASE_TAIL: bool = false;

    fn layout(bytes: usize) -> Option<Layout> {
        Layout::from_size_align(bytes, page_size_for(bytes)).ok()
    }

    pub unsafe fn map(bytes: usize, _huge: bool) -> Option<NonNull<u8>> {
        NonNull::new(alloc_zeroed(layout(bytes)?))
    }

    pub unsafe fn advise_huge_pages(_ptr: NonNull<u8>, _bytes: usize) {}

    pub unsafe fn unmap(ptr: NonNull<u8>, bytes: usize) -> bool {
        match layout(bytes) {
            Some(layout) => {
                dealloc(ptr.as_ptr(), layout);
                true
            }
            None => false,
        }
    }
}
