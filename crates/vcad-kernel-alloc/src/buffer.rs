//! Owned byte buffer backed by a [`MemoryProvider`].

use std::ptr::NonNull;

use crate::{AllocFlags, MemoryProvider, Result};

/// Zero-initialized bytes returned to their provider on drop.
pub struct PageBuffer<'p, P: MemoryProvider + ?Sized> {
    provider: &'p P,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'p, P: MemoryProvider + ?Sized> PageBuffer<'p, P> {
    /// Allocate `len` zeroed bytes from `provider`.
    pub fn new(provider: &'p P, len: usize, flags: AllocFlags) -> Result<Self> {
        let ptr = provider.allocate(len, flags)?;
        Ok(Self { provider, ptr, len })
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the buffer as bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` covers `len` initialized bytes for the buffer's lifetime
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the buffer as mutable bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Release pages past `new_len`, returning the length now backed.
    ///
    /// The logical length becomes the page-rounded size reported by the
    /// provider, which is never smaller than `new_len`.
    pub fn shrink(&mut self, new_len: usize) -> Result<usize> {
        // SAFETY: the buffer owns the allocation and no borrow outlives `&mut self`
        let kept = unsafe { self.provider.shrink(self.ptr, new_len, self.len)? };
        self.len = kept;
        Ok(kept)
    }
}

impl<P: MemoryProvider + ?Sized> Drop for PageBuffer<'_, P> {
    fn drop(&mut self) {
        // SAFETY: allocated by `provider` with logical size `len`
        if let Err(err) = unsafe { self.provider.free(self.ptr, self.len) } {
            log::warn!("failed to release page buffer: {}", err);
        }
    }
}
