//! Arena introspection.
//!
//! All figures are computed on demand by walking the chunk list. None of the
//! accessors fail: a released arena reports zero usage, zero capacity and no
//! chunks, but keeps reporting its configured chunk size.

use std::fmt;

use crate::arena::Arena;
use crate::chunk::Chunk;

/// Point-in-time snapshot of an arena's memory usage.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArenaMetrics {
    /// Bytes consumed across all chunks, alignment padding included.
    pub size_in_use: usize,
    /// Bytes reserved across all chunks.
    pub capacity: usize,
    /// Number of chunks currently held.
    pub num_chunks: usize,
    /// Configured size of new chunks.
    pub chunk_size: usize,
    /// `size_in_use / capacity`, or `0.0` without capacity.
    pub utilization: f64,
}

impl ArenaMetrics {
    /// Bytes reserved but not yet handed out.
    ///
    /// Space left at the tail of non-current chunks is counted too, even
    /// though the bump pointer will not return to it before a reset.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.size_in_use
    }
}

impl fmt::Display for ArenaMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} bytes in use ({:.1}%) across {} chunk(s) of {} bytes",
            self.size_in_use,
            self.capacity,
            self.utilization * 100.0,
            self.num_chunks,
            self.chunk_size
        )
    }
}

impl Arena {
    /// Sum of chunk offsets: bytes handed out plus alignment padding.
    #[must_use]
    pub fn size_in_use(&self) -> usize {
        self.chunks().iter().map(Chunk::used).sum()
    }

    /// Sum of chunk capacities.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks().iter().map(Chunk::capacity).sum()
    }

    /// Number of chunks held. Never decreases except on release.
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.chunks().len()
    }

    /// Size given to new chunks (already resolved, so never 0).
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fraction of capacity in use, in `[0.0, 1.0]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        utilization(self.size_in_use(), self.capacity())
    }

    /// Collects every metric in one pass over the chunks.
    ///
    /// ```
    /// use strata_arena::Arena;
    ///
    /// let arena = Arena::new(1024);
    /// arena.alloc_bytes(512).unwrap();
    ///
    /// let metrics = arena.metrics();
    /// assert_eq!(metrics.size_in_use, 512);
    /// assert_eq!(metrics.utilization, 0.5);
    /// assert_eq!(metrics.remaining(), 512);
    /// ```
    #[must_use]
    pub fn metrics(&self) -> ArenaMetrics {
        let (size_in_use, capacity) = self
            .chunks()
            .iter()
            .fold((0, 0), |(used, cap), chunk| {
                (used + chunk.used(), cap + chunk.capacity())
            });

        ArenaMetrics {
            size_in_use,
            capacity,
            num_chunks: self.num_chunks(),
            chunk_size: self.chunk_size(),
            utilization: utilization(size_in_use, capacity),
        }
    }
}

#[inline]
fn utilization(size_in_use: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        size_in_use as f64 / capacity as f64
    }
}
