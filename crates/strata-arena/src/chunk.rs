//! Fixed-size memory chunks with a bump cursor.
//!
//! A [`Chunk`] owns one buffer obtained from the host allocator and an
//! `offset` marking the first free byte. Carving a region only moves the
//! offset forward; the buffer itself never moves or resizes, so pointers into
//! it stay valid until the chunk is dropped.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Platform word size. Every carved region starts on a multiple of this.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Rounds `value` up to the next multiple of `align` (a power of two).
///
/// Returns `None` if the rounded value does not fit in a `usize`.
#[inline]
pub(crate) fn round_up_to_align(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
    let mask = align - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

/// A contiguous buffer plus its allocation cursor.
///
/// # Invariants
///
/// - `offset <= capacity()` at all times
/// - the buffer start is aligned to at least [`WORD_SIZE`]
/// - the buffer is returned to the host allocator exactly once, on drop
pub(crate) struct Chunk {
    /// Start of the buffer.
    start: NonNull<u8>,
    /// Layout the buffer was allocated with; needed again for `dealloc`.
    layout: Layout,
    /// Next free byte, relative to `start`.
    offset: usize,
}

impl Chunk {
    /// Allocates a chunk of `size` bytes whose start is aligned to
    /// `max(align, WORD_SIZE)`.
    ///
    /// # Errors
    ///
    /// - [`Error::CapacityOverflow`] if `size`/`align` do not form a layout
    /// - [`Error::OutOfMemory`] if the host allocator returns null
    pub(crate) fn new(size: usize, align: usize) -> Result<Self> {
        debug_assert!(size > 0, "chunks are never empty");

        let layout = Layout::from_size_align(size, align.max(WORD_SIZE))
            .map_err(|_| Error::CapacityOverflow)?;

        // SAFETY: `layout` has a non-zero size (asserted above, and the arena
        // never requests an empty chunk). A null return is handled below.
        let start = unsafe { alloc::alloc(layout) };
        let start = NonNull::new(start).ok_or(Error::OutOfMemory { size })?;

        Ok(Chunk {
            start,
            layout,
            offset: 0,
        })
    }

    /// Carves `size` bytes starting at the next `align`-aligned address.
    ///
    /// Returns `None`, leaving the offset untouched, if the region does not
    /// fit in the remaining space.
    #[inline]
    pub(crate) fn try_carve(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let aligned = self.aligned_offset(align)?;
        let end = aligned.checked_add(size)?;
        if end > self.capacity() {
            return None;
        }

        self.offset = end;

        // SAFETY: `aligned <= end <= capacity`, so the resulting pointer stays
        // inside (or one past the end of) the buffer this chunk owns, and it
        // is derived from `start`, keeping its provenance.
        Some(unsafe { self.start.add(aligned) })
    }

    /// Whether `size` bytes aligned to `align` would fit without growing.
    #[inline]
    pub(crate) fn fits(&self, size: usize, align: usize) -> bool {
        self.aligned_offset(align)
            .and_then(|aligned| aligned.checked_add(size))
            .is_some_and(|end| end <= self.capacity())
    }

    /// Offset at which the next `align`-aligned region would start.
    ///
    /// Alignment is computed on the address, which for word alignment equals
    /// rounding the offset since the buffer start is word aligned.
    #[inline]
    fn aligned_offset(&self, align: usize) -> Option<usize> {
        let base = self.start.addr().get();
        let current = base.checked_add(self.offset)?;
        round_up_to_align(current, align).map(|addr| addr - base)
    }

    /// Rewinds the cursor to the start. The buffer contents are left as is.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.offset = 0;
    }

    /// Bytes consumed so far, including alignment padding.
    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.offset
    }

    /// Total size of the buffer in bytes.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: `start` came from `alloc(self.layout)` in `Chunk::new`
        // and is deallocated only here, once.
        unsafe {
            alloc::dealloc(self.start.as_ptr(), self.layout);
        }
    }
}

// SAFETY: a chunk exclusively owns its buffer; moving it to another thread
// moves that ownership. It has no shared interior state, so it is not `Sync`.
unsafe impl Send for Chunk {}
