//! Chunked bump allocator.
//!
//! [`Arena`] owns an ordered list of [`Chunk`]s and carves word-aligned
//! regions from the current one, appending a new chunk when it runs out.
//! Individual regions are never freed; [`Arena::reset`] rewinds every chunk
//! in O(chunks) and [`Arena::release`] hands all storage back to the host
//! allocator.
//!
//! # Ownership
//!
//! Allocation takes `&self` and returns references tied to that borrow, so
//! many allocations can be alive at once. `reset` and `release` take
//! `&mut self`, which means the borrow checker rejects any program that keeps
//! an allocation across either of them:
//!
//! ```compile_fail
//! use strata_arena::Arena;
//!
//! let mut arena = Arena::new(1024);
//! let bytes = arena.alloc_bytes(16).unwrap();
//! arena.reset().unwrap();
//! bytes[0].write(1); // error: `arena` is mutably borrowed while `bytes` is alive
//! ```
//!
//! `Arena` is `Send` but not `Sync`: one owner at a time. Use
//! [`SafeArena`](crate::SafeArena) to share an arena between threads.
//!
//! # Example
//!
//! ```
//! use strata_arena::Arena;
//!
//! let mut arena = Arena::new(1024);
//!
//! let small = arena.alloc_bytes(100).unwrap();
//! assert_eq!(small.len(), 100);
//!
//! // Larger than the configured chunk size: lands in its own chunk.
//! let large = arena.alloc_bytes(2000).unwrap();
//! assert_eq!(large.len(), 2000);
//! assert_eq!(arena.num_chunks(), 2);
//!
//! arena.reset().unwrap();
//! assert_eq!(arena.size_in_use(), 0);
//! assert_eq!(arena.num_chunks(), 2);
//! ```

use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use strata_log::{debug, trace};

use crate::chunk::{Chunk, WORD_SIZE};
use crate::error::{Error, Result};

/// Chunk size used when an arena is created with a chunk size of 0 (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Source of process-unique arena ids, used to reject foreign handles.
static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// A chunked bump allocator.
///
/// # Invariants
///
/// - every chunk's offset is at most its capacity
/// - `chunks` is non-empty from construction until [`release`](Self::release)
/// - after `release`, `chunks` is empty and every operation except `release`
///   and the metric accessors fails with [`Error::UseAfterRelease`]
pub struct Arena {
    /// All chunks in creation order. Mutated through `&self` on the
    /// allocation path; never borrowed across calls.
    chunks: UnsafeCell<Vec<Chunk>>,
    /// Index of the chunk receiving allocations.
    current: Cell<usize>,
    /// Configured size of new chunks.
    pub(crate) chunk_size: usize,
    /// Terminal state flag.
    released: bool,
    /// Advanced by every reset and release.
    epoch: u64,
    /// Process-unique identity.
    id: u64,
}

impl Arena {
    /// Creates an arena and eagerly allocates its first chunk.
    ///
    /// A `chunk_size` of 0 selects [`DEFAULT_CHUNK_SIZE`].
    ///
    /// # Panics
    ///
    /// Panics if the first chunk cannot be allocated. Use
    /// [`try_new`](Self::try_new) to handle that case.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        match Self::try_new(chunk_size) {
            Ok(arena) => arena,
            Err(err) => panic!("failed to create arena: {err}"),
        }
    }

    /// Creates an arena, reporting failure to allocate the first chunk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the host allocator cannot supply
    /// the first chunk, or [`Error::CapacityOverflow`] if `chunk_size` is
    /// not a valid allocation size.
    pub fn try_new(chunk_size: usize) -> Result<Self> {
        let chunk_size = resolve_chunk_size(chunk_size);
        let first = Chunk::new(chunk_size, WORD_SIZE)?;
        let id = NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed);

        debug!("arena {id} created with {chunk_size} byte chunks");

        Ok(Arena {
            chunks: UnsafeCell::new(vec![first]),
            current: Cell::new(0),
            chunk_size,
            released: false,
            epoch: 0,
            id,
        })
    }

    /// Allocates `n` bytes aligned to the platform word size.
    ///
    /// A request for 0 bytes returns an empty slice and changes nothing.
    /// The bytes are not cleared. Fresh chunk memory is uninitialized, and
    /// memory reused after [`reset`](Self::reset) holds whatever an earlier
    /// allocation left there, including uninitialized padding. The region is
    /// therefore handed out as `MaybeUninit<u8>`; write it before reading,
    /// or use [`alloc_slice_zeroed`](Self::alloc_slice_zeroed) for cleared
    /// bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::UseAfterRelease`] if the arena was released
    /// - [`Error::OutOfMemory`] if a new chunk was needed and could not be
    ///   allocated; the arena is left unchanged
    ///
    /// # Example
    ///
    /// ```
    /// use strata_arena::Arena;
    ///
    /// let arena = Arena::new(0);
    /// let buf = arena.alloc_bytes(24).unwrap();
    /// for byte in buf.iter_mut() {
    ///     byte.write(7);
    /// }
    /// assert_eq!(buf.as_ptr() as usize % std::mem::size_of::<usize>(), 0);
    /// assert!(arena.alloc_bytes(0).unwrap().is_empty());
    /// ```
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_bytes(&self, n: usize) -> Result<&mut [MaybeUninit<u8>]> {
        self.check_live()?;
        if n == 0 {
            return Ok(&mut []);
        }

        let ptr = self.alloc_raw(n, WORD_SIZE)?;

        // SAFETY: `alloc_raw` returned `n` bytes inside a live chunk that no
        // other allocation overlaps. `MaybeUninit` places no requirement on
        // their contents. The region stays valid until `reset`/`release`,
        // both of which need `&mut self` and so end this borrow first.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr.cast().as_ptr(), n) })
    }

    /// Makes sure the next `n` bytes can be carved without growing.
    ///
    /// If the current chunk lacks `n` bytes of aligned free space, an
    /// already-allocated later chunk that fits becomes current, otherwise a
    /// new chunk of `max(chunk_size, n)` bytes is appended. Nothing is
    /// allocated from it.
    ///
    /// # Errors
    ///
    /// - [`Error::UseAfterRelease`] if the arena was released
    /// - [`Error::OutOfMemory`] if growing failed
    /// - [`Error::CapacityOverflow`] if `n` is not a valid chunk size
    ///
    /// On error the arena is left unchanged.
    pub fn ensure_capacity(&self, n: usize) -> Result<()> {
        self.check_live()?;
        if n == 0 {
            return Ok(());
        }

        // SAFETY: see `chunks_mut`; no other reference to the list is live.
        let chunks = unsafe { self.chunks_mut() };
        if chunks[self.current.get()].fits(n, WORD_SIZE) {
            return Ok(());
        }
        if let Some(index) = self.find_retained(chunks, n, WORD_SIZE) {
            self.current.set(index);
            return Ok(());
        }

        self.grow(chunks, n, WORD_SIZE).map(|_| ())
    }

    /// Rewinds every chunk to offset 0 while keeping its storage.
    ///
    /// The first chunk becomes current again, so a following allocation
    /// that fits in it reuses its memory. Costs O(number of chunks).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterRelease`] if the arena was released.
    pub fn reset(&mut self) -> Result<()> {
        self.check_live()?;

        let chunks = self.chunks.get_mut();
        for chunk in chunks.iter_mut() {
            chunk.reset();
        }
        self.current.set(0);
        self.epoch += 1;

        trace!("arena {} reset {} chunks (epoch {})", self.id, chunks.len(), self.epoch);
        Ok(())
    }

    /// Returns every chunk to the host allocator. The arena becomes unusable.
    ///
    /// Calling `release` again does nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }

        let chunks = std::mem::take(self.chunks.get_mut());
        let freed: usize = chunks.iter().map(Chunk::capacity).sum();
        drop(chunks);

        self.current.set(0);
        self.released = true;
        self.epoch += 1;

        debug!("arena {} released {freed} bytes", self.id);
    }

    /// Whether [`release`](Self::release) has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Carves `size` bytes aligned to `align`, growing if needed.
    ///
    /// `size` must be non-zero and `align` a power of two no smaller than
    /// the word size. Callers check for release first.
    pub(crate) fn alloc_raw(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        debug_assert!(size > 0);
        debug_assert!(!self.released);

        // SAFETY: see `chunks_mut`; no other reference to the list is live.
        let chunks = unsafe { self.chunks_mut() };

        if let Some(ptr) = chunks[self.current.get()].try_carve(size, align) {
            return Ok(ptr);
        }

        self.alloc_slow(chunks, size, align)
    }

    #[cold]
    fn alloc_slow(&self, chunks: &mut Vec<Chunk>, size: usize, align: usize) -> Result<NonNull<u8>> {
        if let Some(index) = self.find_retained(chunks, size, align) {
            self.current.set(index);
            if let Some(ptr) = chunks[index].try_carve(size, align) {
                return Ok(ptr);
            }
        }

        let index = self.grow(chunks, size, align)?;
        // A fresh chunk holds at least `size` bytes and starts aligned to
        // `align`, so carving from offset 0 cannot fail.
        chunks[index]
            .try_carve(size, align)
            .ok_or(Error::CapacityOverflow)
    }

    /// First chunk after the current one that can take the request.
    ///
    /// Only chunks retained across a reset are ever found here; during
    /// normal growth the current chunk is always the last one.
    fn find_retained(&self, chunks: &[Chunk], size: usize, align: usize) -> Option<usize> {
        let start = self.current.get() + 1;
        chunks
            .get(start..)?
            .iter()
            .position(|chunk| chunk.fits(size, align))
            .map(|offset| start + offset)
    }

    /// Appends a chunk of `max(chunk_size, size)` bytes and makes it current.
    ///
    /// On failure the chunk list and current index are unchanged.
    fn grow(&self, chunks: &mut Vec<Chunk>, size: usize, align: usize) -> Result<usize> {
        let bytes = self.chunk_size.max(size);
        let chunk = Chunk::new(bytes, align)?;

        chunks.push(chunk);
        let index = chunks.len() - 1;
        self.current.set(index);

        debug!(
            "arena {} grew: chunk #{} of {bytes} bytes for a {size} byte request",
            self.id,
            index + 1
        );
        Ok(index)
    }

    /// Fails with [`Error::UseAfterRelease`] once the arena is released.
    #[inline]
    pub(crate) fn check_live(&self) -> Result<()> {
        if self.released {
            debug!("arena {} used after release", self.id);
            return Err(Error::UseAfterRelease);
        }
        Ok(())
    }

    /// Shared view of the chunk list for read-only accessors.
    pub(crate) fn chunks(&self) -> &[Chunk] {
        // SAFETY: the list is only mutated inside `alloc_raw`,
        // `ensure_capacity` (both through a short-lived `&mut` that never
        // escapes the call) or through `&mut self`. `Arena` is not `Sync`,
        // so none of those can run while this shared borrow is in use.
        unsafe { &*self.chunks.get() }
    }

    /// Exclusive view of the chunk list from `&self`.
    ///
    /// # Safety
    ///
    /// The caller must not let the returned reference outlive the current
    /// call, and must not call anything that creates another view of the
    /// list while holding it. Carved regions point into chunk buffers, not
    /// into the `Vec`, so pushing a chunk never invalidates them.
    #[allow(clippy::mut_from_ref)]
    unsafe fn chunks_mut(&self) -> &mut Vec<Chunk> {
        // SAFETY: upheld by the caller, see above.
        unsafe { &mut *self.chunks.get() }
    }

    /// Counter advanced by every reset and release.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Process-unique identity of this arena.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Arena {
    /// An arena with [`DEFAULT_CHUNK_SIZE`] chunks.
    fn default() -> Self {
        Arena::new(DEFAULT_CHUNK_SIZE)
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("chunk_size", &self.chunk_size)
            .field("num_chunks", &self.num_chunks())
            .field("size_in_use", &self.size_in_use())
            .field("epoch", &self.epoch)
            .field("released", &self.released)
            .finish()
    }
}

/// Maps the configured chunk size to the one actually used.
#[inline]
pub(crate) const fn resolve_chunk_size(chunk_size: usize) -> usize {
    if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    }
}
