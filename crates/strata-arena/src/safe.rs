//! Thread-safe arena: one [`Arena`] behind one mutex.
//!
//! A plain `Arena` hands out references bound to `&self`, which cannot cross
//! the lock. [`SafeArena`] therefore returns owned [`Handle`]s instead. A
//! handle records where its elements live plus the arena's id and epoch at
//! allocation time; [`SafeArena::read`] and [`SafeArena::write`] re-check both
//! under the lock before exposing the memory, so a handle that outlived a
//! reset or release yields an error rather than a dangling reference.
//!
//! Every operation takes the lock for its whole duration, including the
//! closure passed to `read`/`write`. Calling back into the same `SafeArena`
//! from inside such a closure deadlocks.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use strata_arena::SafeArena;
//!
//! let arena = Arc::new(SafeArena::new(0));
//!
//! let workers: Vec<_> = (0..4u64)
//!     .map(|id| {
//!         let arena = Arc::clone(&arena);
//!         thread::spawn(move || {
//!             let handle = arena.alloc_value(id * 10).unwrap();
//!             arena.read(&handle, |values| values[0]).unwrap()
//!         })
//!     })
//!     .collect();
//!
//! let mut seen: Vec<u64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
//! seen.sort_unstable();
//! assert_eq!(seen, [0, 10, 20, 30]);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::metrics::ArenaMetrics;
use crate::typed::Zeroable;

/// Owned, checked reference to `len` contiguous `T`s inside a [`SafeArena`].
///
/// A handle keeps nothing alive. It is only a key that [`SafeArena::read`]
/// and [`SafeArena::write`] validate against the arena's current state.
/// Handles are deliberately not `Clone`, so each allocation has one owner.
pub struct Handle<T> {
    ptr: NonNull<T>,
    len: usize,
    epoch: u64,
    arena_id: u64,
    _marker: PhantomData<T>,
}

// SAFETY: the elements are only reached through the owning `SafeArena`'s
// mutex, as with `Mutex<T>`: sending or sharing the handle is fine as long
// as the elements themselves may move between threads.
unsafe impl<T: Send> Send for Handle<T> {}
// SAFETY: as above.
unsafe impl<T: Send> Sync for Handle<T> {}

impl<T> Handle<T> {
    fn new(ptr: NonNull<T>, len: usize, arena: &Arena) -> Self {
        Handle {
            ptr,
            len,
            epoch: arena.epoch(),
            arena_id: arena.id(),
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the handle covers no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the covered region in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.len * mem::size_of::<T>()
    }

    /// Address of the first element. Only meaningful for comparing handles.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.ptr.addr().get()
    }

    /// Arena epoch the handle was issued in.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl<T> Handle<MaybeUninit<T>> {
    /// Reinterprets the elements as initialized.
    ///
    /// # Safety
    ///
    /// Every element must have been written, for example through
    /// [`SafeArena::write`], before the returned handle is read.
    #[must_use]
    pub unsafe fn assume_init(self) -> Handle<T> {
        Handle {
            ptr: self.ptr.cast(),
            len: self.len,
            epoch: self.epoch,
            arena_id: self.arena_id,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len)
            .field("epoch", &self.epoch)
            .field("arena_id", &self.arena_id)
            .finish()
    }
}

/// An [`Arena`] shared between threads behind a single mutex.
///
/// `SafeArena` is `Send + Sync`; wrap it in an `Arc` to share it. Each call
/// behaves exactly like the same call on `Arena`, made atomically.
///
/// A panic inside a `read`/`write` closure poisons the mutex. Arena state is
/// never left half-updated by such a panic, so the poison is ignored and the
/// arena keeps working.
pub struct SafeArena {
    inner: Mutex<Arena>,
}

impl SafeArena {
    /// Creates a shared arena. A `chunk_size` of 0 selects the default.
    ///
    /// # Panics
    ///
    /// Panics if the first chunk cannot be allocated; see [`Arena::new`].
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        SafeArena::from(Arena::new(chunk_size))
    }

    /// Creates a shared arena, reporting failure to allocate the first chunk.
    ///
    /// # Errors
    ///
    /// See [`Arena::try_new`].
    pub fn try_new(chunk_size: usize) -> Result<Self> {
        Arena::try_new(chunk_size).map(SafeArena::from)
    }

    /// Unwraps the inner arena.
    #[must_use]
    pub fn into_inner(self) -> Arena {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks that `handle` still refers to live memory of this arena.
    fn validate<T>(arena: &Arena, handle: &Handle<T>) -> Result<()> {
        arena.check_live()?;
        if handle.arena_id != arena.id() {
            return Err(Error::ForeignHandle);
        }
        if handle.epoch != arena.epoch() {
            return Err(Error::StaleHandle {
                handle_epoch: handle.epoch,
                arena_epoch: arena.epoch(),
            });
        }
        Ok(())
    }

    /// Locked [`Arena::alloc_bytes`].
    ///
    /// The bytes are not initialized; write them and then call
    /// [`Handle::assume_init`] to read them back as `u8`.
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc_bytes`].
    pub fn alloc_bytes(&self, n: usize) -> Result<Handle<MaybeUninit<u8>>> {
        let arena = self.lock();
        let bytes = arena.alloc_bytes(n)?;
        Ok(Handle::new(NonNull::from(bytes).cast(), n, &arena))
    }

    /// Locked [`Arena::alloc`].
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc`].
    pub fn alloc<T: Zeroable>(&self) -> Result<Handle<T>> {
        let arena = self.lock();
        let value = arena.alloc::<T>()?;
        Ok(Handle::new(NonNull::from(value), 1, &arena))
    }

    /// Same as [`alloc`](Self::alloc).
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc`].
    pub fn alloc_zeroed<T: Zeroable>(&self) -> Result<Handle<T>> {
        self.alloc::<T>()
    }

    /// Locked [`Arena::alloc_uninit`].
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc_uninit`].
    pub fn alloc_uninit<T>(&self) -> Result<Handle<MaybeUninit<T>>> {
        let arena = self.lock();
        let slot = arena.alloc_uninit::<T>()?;
        Ok(Handle::new(NonNull::from(slot), 1, &arena))
    }

    /// Locked [`Arena::alloc_slice`].
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc_slice`].
    pub fn alloc_slice<T>(&self, n: usize) -> Result<Handle<MaybeUninit<T>>> {
        let arena = self.lock();
        let slots = arena.alloc_slice::<T>(n)?;
        Ok(Handle::new(NonNull::from(slots).cast(), n, &arena))
    }

    /// Locked [`Arena::alloc_slice_zeroed`].
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc_slice_zeroed`].
    pub fn alloc_slice_zeroed<T: Zeroable>(&self, n: usize) -> Result<Handle<T>> {
        let arena = self.lock();
        let values = arena.alloc_slice_zeroed::<T>(n)?;
        Ok(Handle::new(NonNull::from(values).cast(), n, &arena))
    }

    /// Locked [`Arena::alloc_value`].
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc_value`].
    pub fn alloc_value<T>(&self, value: T) -> Result<Handle<T>> {
        let arena = self.lock();
        let value = arena.alloc_value(value)?;
        Ok(Handle::new(NonNull::from(value), 1, &arena))
    }

    /// Locked [`Arena::alloc_slice_copy`].
    ///
    /// # Errors
    ///
    /// See [`Arena::alloc_slice_copy`].
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> Result<Handle<T>> {
        let arena = self.lock();
        let values = arena.alloc_slice_copy(src)?;
        Ok(Handle::new(NonNull::from(values).cast(), src.len(), &arena))
    }

    /// Locked [`Arena::ensure_capacity`].
    ///
    /// # Errors
    ///
    /// See [`Arena::ensure_capacity`].
    pub fn ensure_capacity(&self, n: usize) -> Result<()> {
        self.lock().ensure_capacity(n)
    }

    /// Locked [`Arena::reset`]. Every outstanding handle becomes stale.
    ///
    /// # Errors
    ///
    /// See [`Arena::reset`].
    pub fn reset(&self) -> Result<()> {
        self.lock().reset()
    }

    /// Locked [`Arena::release`]. Idempotent.
    pub fn release(&self) {
        self.lock().release();
    }

    /// Whether the arena has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.lock().is_released()
    }

    /// Asserts that `handle` still refers to live memory of this arena.
    ///
    /// # Errors
    ///
    /// Fails like [`read`](Self::read) would.
    pub fn keep_alive<T>(&self, handle: &Handle<T>) -> Result<()> {
        Self::validate(&self.lock(), handle)
    }

    /// Runs `f` over the handle's elements while holding the lock.
    ///
    /// # Errors
    ///
    /// - [`Error::UseAfterRelease`] if the arena was released
    /// - [`Error::ForeignHandle`] if `handle` came from another arena
    /// - [`Error::StaleHandle`] if the arena was reset since `handle` was
    ///   issued
    pub fn read<T, R>(&self, handle: &Handle<T>, f: impl FnOnce(&[T]) -> R) -> Result<R> {
        let arena = self.lock();
        Self::validate(&arena, handle)?;

        // SAFETY: the handle was issued by this arena in the current epoch,
        // so its region is still carved and holds initialized `T`s. The
        // guard is held until `f` returns, and every other path to these
        // elements also goes through the lock.
        let values = unsafe { std::slice::from_raw_parts(handle.ptr.as_ptr(), handle.len) };
        Ok(f(values))
    }

    /// Runs `f` over the handle's elements mutably while holding the lock.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn write<T, R>(&self, handle: &Handle<T>, f: impl FnOnce(&mut [T]) -> R) -> Result<R> {
        let arena = self.lock();
        Self::validate(&arena, handle)?;

        // SAFETY: as in `read`. Holding the lock rules out any other live
        // reference to the region for the duration of `f`.
        let values = unsafe { std::slice::from_raw_parts_mut(handle.ptr.as_ptr(), handle.len) };
        Ok(f(values))
    }

    /// Locked [`Arena::size_in_use`].
    #[must_use]
    pub fn size_in_use(&self) -> usize {
        self.lock().size_in_use()
    }

    /// Locked [`Arena::capacity`].
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Locked [`Arena::num_chunks`].
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.lock().num_chunks()
    }

    /// Locked [`Arena::chunk_size`].
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.lock().chunk_size()
    }

    /// Locked [`Arena::utilization`].
    #[must_use]
    pub fn utilization(&self) -> f64 {
        self.lock().utilization()
    }

    /// Locked [`Arena::metrics`]: all figures come from one consistent state.
    #[must_use]
    pub fn metrics(&self) -> ArenaMetrics {
        self.lock().metrics()
    }
}

impl From<Arena> for SafeArena {
    fn from(arena: Arena) -> Self {
        SafeArena {
            inner: Mutex::new(arena),
        }
    }
}

impl Default for SafeArena {
    fn default() -> Self {
        SafeArena::from(Arena::default())
    }
}

impl fmt::Debug for SafeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeArena")
            .field("inner", &*self.lock())
            .finish()
    }
}
