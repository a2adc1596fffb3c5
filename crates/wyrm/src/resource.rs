//! Resource limits enforced by the heap and the frame stack.
//!
//! The runtime meters heap allocation (bytes and allocation count) and frame
//! recursion depth. Limits are configured per runtime; the defaults are
//! generous enough for tests and embedding while still guaranteeing that a
//! runaway program fails with a Language exception instead of aborting the
//! host process.

use std::fmt;

/// Default maximum frame depth before `RecursionError` is raised.
///
/// Chosen well below the host stack budget so the error is raised as a
/// catchable Language exception rather than a native stack overflow.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Maximum length of a computed MRO.
pub const MAX_MRO_LENGTH: usize = 2600;

/// Maximum inheritance chain depth accepted when linearising bases.
pub const MAX_INHERITANCE_DEPTH: usize = 1000;

/// Limits applied to a single runtime.
///
/// `None` disables the corresponding check. Recursion depth is always
/// enforced because unbounded native recursion would crash the host.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum total bytes of live heap data.
    pub max_memory: Option<usize>,
    /// Maximum number of heap allocations over the runtime's lifetime.
    pub max_allocations: Option<usize>,
    /// Maximum frame / native call depth.
    pub max_recursion_depth: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory: None,
            max_allocations: None,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ResourceLimits {
    /// Limits suitable for sandboxed execution of untrusted input.
    #[must_use]
    pub fn sandboxed() -> Self {
        Self {
            max_memory: Some(64 * 1024 * 1024),
            max_allocations: Some(10_000_000),
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

/// Error raised when a resource limit is exceeded.
///
/// Converted into the matching Language exception (`MemoryError` or
/// `RecursionError`) at the error-channel boundary in `exceptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// Live heap bytes would exceed `max_memory`.
    Memory { limit: usize },
    /// Allocation count would exceed `max_allocations`.
    Allocations { limit: usize },
    /// Frame depth would exceed `max_recursion_depth`.
    Recursion { limit: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory { limit } => write!(f, "heap memory limit of {limit} bytes exceeded"),
            Self::Allocations { limit } => write!(f, "allocation limit of {limit} exceeded"),
            Self::Recursion { limit } => {
                write!(f, "maximum recursion depth exceeded (limit {limit})")
            }
        }
    }
}

impl std::error::Error for ResourceError {}
