//! Chunked bump-allocation arena.
//!
//! This crate provides region-based memory management for workloads that
//! allocate many short-lived objects and free them all at once:
//!
//! - **[`Arena`]**: carves word-aligned regions from large chunks, growing by
//!   whole chunks and reclaiming everything at once with [`Arena::reset`] or
//!   [`Arena::release`]
//! - **Typed allocation**: zero-initialized values and slices for
//!   [`Zeroable`] types, uninitialized slots, copies of values, slices and
//!   strings
//! - **[`SafeArena`]**: one arena behind a mutex, handing out checked
//!   [`Handle`]s (requires the `sync` feature, on by default)
//! - **Metrics**: usage, capacity and chunk counts via [`ArenaMetrics`]
//! - **[`ArenaFactory`]**: a copyable constructor carrying a chunk size
//!
//! Diagnostics go through `strata-log`; set `STRATA_LOG=debug` and call
//! [`strata_log::init_from_env`] to see chunk growth and release.
//!
//! # Example
//!
//! ```
//! use strata_arena::{Arena, Error};
//!
//! let mut arena = Arena::new(1024);
//!
//! let header = arena.alloc::<[u32; 4]>()?;
//! header[0] = 0xCAFE;
//! let body = arena.alloc_slice_copy(b"payload")?;
//! assert_eq!(body, b"payload");
//!
//! arena.reset()?;
//! assert_eq!(arena.size_in_use(), 0);
//!
//! arena.release();
//! assert_eq!(arena.alloc_bytes(1).unwrap_err(), Error::UseAfterRelease);
//! # Ok::<(), Error>(())
//! ```

pub mod arena;
mod chunk;
pub mod error;
pub mod factory;
pub mod metrics;
#[cfg(feature = "sync")]
pub mod safe;
pub mod typed;

pub use arena::{Arena, DEFAULT_CHUNK_SIZE};
pub use chunk::WORD_SIZE;
pub use error::{Error, Result};
pub use factory::ArenaFactory;
pub use metrics::ArenaMetrics;
#[cfg(feature = "sync")]
pub use safe::{Handle, SafeArena};
pub use typed::Zeroable;
