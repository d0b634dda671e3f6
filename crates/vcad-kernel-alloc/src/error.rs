//! Error types for the memory provider.

use thiserror::Error;

/// Errors that can occur while mapping or unmapping pages.
#[derive(Error, Debug)]
pub enum AllocError {
    /// The operating system refused to map, unmap or resize a region.
    #[error("out of memory: failed to provide {bytes} bytes")]
    OutOfMemory {
        /// Size of the failed request after page rounding, or the requested
        /// size when rounding it would overflow.
        bytes: usize,
    },
}

/// Result type for memory provider operations.
pub type Result<T> = std::result::Result<T, AllocError>;
