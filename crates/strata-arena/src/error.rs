//! Error types for arena operations.
//!
//! Zero-sized requests are not errors: they return empty results. Everything
//! that can actually go wrong while carving, growing or resolving a handle is
//! listed here.

use std::fmt;

/// Errors that can occur while using an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The arena was released and can no longer allocate, grow, reset or
    /// resolve handles.
    UseAfterRelease,

    /// The host allocator could not supply a chunk of the given size.
    OutOfMemory {
        /// The requested chunk size in bytes.
        size: usize,
    },

    /// The requested size or alignment cannot be represented as a layout
    /// (for example `n * size_of::<T>()` overflowed).
    CapacityOverflow,

    /// A handle was resolved after the arena it came from was reset.
    StaleHandle {
        /// Epoch recorded in the handle.
        handle_epoch: u64,
        /// Current epoch of the arena.
        arena_epoch: u64,
    },

    /// A handle was presented to an arena that did not create it.
    ForeignHandle,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UseAfterRelease => write!(f, "arena used after release"),
            Error::OutOfMemory { size } => {
                write!(f, "out of memory: failed to allocate a chunk of {size} bytes")
            }
            Error::CapacityOverflow => {
                write!(f, "requested allocation size overflows the address space")
            }
            Error::StaleHandle {
                handle_epoch,
                arena_epoch,
            } => write!(
                f,
                "stale handle: allocated in epoch {handle_epoch}, arena is at epoch {arena_epoch}"
            ),
            Error::ForeignHandle => write!(f, "handle belongs to a different arena"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for arena operations.
pub type Result<T> = std::result::Result<T, Error>;
