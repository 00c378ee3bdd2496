//! Configured constructor for arenas.
//!
//! `ArenaFactory` stores a chunk size and creates a fresh arena with it on
//! every call. It does not pool or recycle arenas: each one is dropped (or
//! released) by whoever owns it.
//!
//! # Examples
//!
//! ```
//! use strata_arena::ArenaFactory;
//!
//! let factory = ArenaFactory::new(16 * 1024);
//!
//! // One arena per request; dropping it returns every chunk.
//! for request in 0..3u32 {
//!     let arena = factory.create_arena();
//!     let id = arena.alloc_value(request).unwrap();
//!     assert_eq!(*id, request);
//!     assert_eq!(arena.chunk_size(), 16 * 1024);
//! }
//! ```

use crate::arena::{Arena, resolve_chunk_size};
use crate::error::Result;
#[cfg(feature = "sync")]
use crate::safe::SafeArena;

/// Creates arenas that share one chunk size.
///
/// The factory is `Copy` and holds a single `usize`, so it can be stored in
/// statics, thread-locals or configuration structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFactory {
    /// Resolved chunk size for new arenas (0 already mapped to the default).
    chunk_size: usize,
}

impl ArenaFactory {
    /// Creates a factory. A `chunk_size` of 0 selects the default.
    #[must_use]
    pub const fn new(chunk_size: usize) -> Self {
        ArenaFactory {
            chunk_size: resolve_chunk_size(chunk_size),
        }
    }

    /// Chunk size given to every arena this factory creates.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Creates a new arena.
    ///
    /// # Panics
    ///
    /// Panics if the first chunk cannot be allocated; see [`Arena::new`].
    #[must_use]
    pub fn create_arena(&self) -> Arena {
        Arena::new(self.chunk_size)
    }

    /// Creates a new arena, reporting allocation failure.
    ///
    /// # Errors
    ///
    /// See [`Arena::try_new`].
    pub fn try_create_arena(&self) -> Result<Arena> {
        Arena::try_new(self.chunk_size)
    }

    /// Creates a new mutex-guarded arena.
    ///
    /// # Panics
    ///
    /// Panics if the first chunk cannot be allocated; see [`Arena::new`].
    #[cfg(feature = "sync")]
    #[must_use]
    pub fn create_safe_arena(&self) -> SafeArena {
        SafeArena::new(self.chunk_size)
    }
}

impl Default for ArenaFactory {
    fn default() -> Self {
        ArenaFactory::new(0)
    }
}
