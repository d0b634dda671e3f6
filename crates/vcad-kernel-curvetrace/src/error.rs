//! Error types for curve tracing.

use thiserror::Error;

/// Errors that can occur while configuring traversal or intersection.
///
/// Traversal itself never fails: misses and numeric degeneracies are
/// reported as "no hit", and malformed trees are precondition panics.
#[derive(Error, Debug)]
pub enum CurveTraceError {
    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Tree is deeper than the configured stack bound.
    #[error("tree depth {depth} exceeds configured maximum {max_depth}")]
    TreeTooDeep {
        /// Depth of the node store.
        depth: usize,
        /// Configured bound.
        max_depth: usize,
    },
}

/// Result type for curve tracing operations.
pub type Result<T> = std::result::Result<T, CurveTraceError>;
