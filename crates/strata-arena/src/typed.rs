//! Typed and slice allocation on top of [`Arena`].
//!
//! Every method here turns a type or element count into a size and
//! alignment, carves that through the arena's raw path and hands back a
//! reference bound to the arena borrow. Alignment is
//! `max(WORD_SIZE, align_of::<T>())`, so over-aligned types are placed
//! correctly.
//!
//! Zero-sized requests (a zero-sized `T`, or `n == 0`) never touch chunk
//! memory, but they still fail once the arena is released.
//!
//! Values placed in the arena are never dropped. Types that own heap memory
//! or other resources leak them when the arena is reset or released.

use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

use crate::arena::Arena;
use crate::chunk::WORD_SIZE;
use crate::error::{Error, Result};

/// Types for which the all-zero bit pattern is a valid value.
///
/// [`Arena::alloc`] and [`Arena::alloc_slice_zeroed`] hand out zero-filled
/// memory as `&mut T`, which is only sound for these types.
///
/// # Safety
///
/// Implementors must guarantee that a value whose bytes are all zero is a
/// valid, initialized `Self`.
pub unsafe trait Zeroable: Sized {}

macro_rules! impl_zeroable {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: zero is a valid value of every primitive listed here.
            unsafe impl Zeroable for $ty {}
        )*
    };
}

impl_zeroable!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, (),
);

// SAFETY: the null pointer is a valid raw pointer value.
unsafe impl<T> Zeroable for *const T {}
// SAFETY: as above.
unsafe impl<T> Zeroable for *mut T {}
// SAFETY: `Option<NonNull<T>>` is guaranteed to represent `None` as null.
unsafe impl<T> Zeroable for Option<NonNull<T>> {}
// SAFETY: `MaybeUninit` accepts any bit pattern.
unsafe impl<T> Zeroable for MaybeUninit<T> {}
// SAFETY: an array of zeroable elements is zeroable; arrays have no padding
// of their own.
unsafe impl<T: Zeroable, const N: usize> Zeroable for [T; N] {}

macro_rules! impl_zeroable_tuple {
    ($($name:ident),+) => {
        // SAFETY: every field is zeroable; padding bytes carry no validity
        // requirement.
        unsafe impl<$($name: Zeroable),+> Zeroable for ($($name,)+) {}
    };
}

impl_zeroable_tuple!(A);
impl_zeroable_tuple!(A, B);
impl_zeroable_tuple!(A, B, C);
impl_zeroable_tuple!(A, B, C, D);

/// Size and alignment of `n` contiguous `T`s as placed in an arena.
#[inline]
pub(crate) fn array_layout<T>(n: usize) -> Result<(usize, usize)> {
    let size = mem::size_of::<T>()
        .checked_mul(n)
        .ok_or(Error::CapacityOverflow)?;
    let align = mem::align_of::<T>().max(WORD_SIZE);
    Ok((size, align))
}

impl Arena {
    /// Reserves room for `n` contiguous `T`s without initializing them.
    ///
    /// Zero-byte requests return a dangling, well-aligned pointer.
    fn alloc_array<T>(&self, n: usize) -> Result<NonNull<T>> {
        self.check_live()?;

        let (size, align) = array_layout::<T>(n)?;
        if size == 0 {
            return Ok(NonNull::dangling());
        }

        self.alloc_raw(size, align).map(NonNull::cast)
    }

    /// Allocates a zero-initialized `T`.
    ///
    /// The value is zeroed explicitly, so this also holds for memory reused
    /// after a [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UseAfterRelease`] after release, or
    /// [`Error::OutOfMemory`] if the arena had to grow and could not.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_arena::Arena;
    ///
    /// let arena = Arena::new(0);
    /// let counter = arena.alloc::<u64>().unwrap();
    /// assert_eq!(*counter, 0);
    /// *counter += 1;
    /// ```
    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T: Zeroable>(&self) -> Result<&mut T> {
        let ptr = self.alloc_array::<T>(1)?;

        // SAFETY: `ptr` is aligned and valid for one `T` (or dangling for a
        // zero-sized `T`, where a zero-byte write is fine). All-zero bytes
        // are a valid `T` by the `Zeroable` contract. The region belongs to
        // this borrow of the arena alone.
        unsafe {
            ptr.as_ptr().write_bytes(0, 1);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Same as [`alloc`](Self::alloc).
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub fn alloc_zeroed<T: Zeroable>(&self) -> Result<&mut T> {
        self.alloc::<T>()
    }

    /// Reserves space for a `T` without initializing it.
    ///
    /// The caller writes the value before reading it.
    ///
    /// # Errors
    ///
    /// See [`alloc`](Self::alloc).
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_uninit<T>(&self) -> Result<&mut MaybeUninit<T>> {
        let ptr = self.alloc_array::<T>(1)?;
        // SAFETY: aligned, in bounds and exclusively ours; `MaybeUninit`
        // has no validity requirement.
        Ok(unsafe { &mut *ptr.cast::<MaybeUninit<T>>().as_ptr() })
    }

    /// Reserves `n` contiguous `T`s without initializing them.
    ///
    /// `n == 0` returns an empty slice.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityOverflow`] if `n * size_of::<T>()` overflows, plus
    /// the errors of [`alloc`](Self::alloc).
    ///
    /// # Example
    ///
    /// ```
    /// use strata_arena::Arena;
    ///
    /// let arena = Arena::new(0);
    /// let slots = arena.alloc_slice::<u32>(4).unwrap();
    /// for (i, slot) in slots.iter_mut().enumerate() {
    ///     slot.write(i as u32);
    /// }
    /// assert_eq!(slots.len(), 4);
    /// ```
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice<T>(&self, n: usize) -> Result<&mut [MaybeUninit<T>]> {
        let ptr = self.alloc_array::<T>(n)?;
        // SAFETY: `ptr` is aligned and valid for `n` elements (or dangling
        // with a zero-byte extent), and no other slice covers it.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr.cast().as_ptr(), n) })
    }

    /// Allocates `n` zero-initialized `T`s.
    ///
    /// # Errors
    ///
    /// See [`alloc_slice`](Self::alloc_slice).
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_zeroed<T: Zeroable>(&self, n: usize) -> Result<&mut [T]> {
        let ptr = self.alloc_array::<T>(n)?;

        // SAFETY: as in `alloc_slice`; the zero fill makes every element a
        // valid `T` per `Zeroable`.
        unsafe {
            ptr.as_ptr().write_bytes(0, n);
            Ok(std::slice::from_raw_parts_mut(ptr.as_ptr(), n))
        }
    }

    /// Moves `value` into the arena.
    ///
    /// `value` is never dropped; see the module docs.
    ///
    /// # Errors
    ///
    /// See [`alloc`](Self::alloc). On error `value` is dropped normally.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_value<T>(&self, value: T) -> Result<&mut T> {
        let ptr = self.alloc_array::<T>(1)?;
        // SAFETY: aligned and valid for one `T`; writing initializes it.
        unsafe {
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Copies `src` into a fresh arena slice.
    ///
    /// # Errors
    ///
    /// See [`alloc_slice`](Self::alloc_slice).
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> Result<&mut [T]> {
        let ptr = self.alloc_array::<T>(src.len())?;
        // SAFETY: the destination is freshly carved, so it cannot overlap
        // `src`, and holds exactly `src.len()` elements.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            Ok(std::slice::from_raw_parts_mut(ptr.as_ptr(), src.len()))
        }
    }

    /// Copies a string into the arena.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_arena::Arena;
    ///
    /// let arena = Arena::new(0);
    /// let name = arena.alloc_str("chunk").unwrap();
    /// name.make_ascii_uppercase();
    /// assert_eq!(name, "CHUNK");
    /// ```
    ///
    /// # Errors
    ///
    /// See [`alloc_slice`](Self::alloc_slice).
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_str(&self, s: &str) -> Result<&mut str> {
        let bytes = self.alloc_slice_copy(s.as_bytes())?;
        // SAFETY: the bytes were copied verbatim from a `str`.
        Ok(unsafe { std::str::from_utf8_unchecked_mut(bytes) })
    }

    /// Ties `value` to this arena borrow and returns it unchanged.
    ///
    /// Marks the point up to which an arena-backed reference must stay
    /// valid. Since the arena cannot be reset or released while `&self` is
    /// borrowed, holding the result proves the storage is still live.
    ///
    /// Unlike [`SafeArena::keep_alive`](crate::SafeArena::keep_alive) this
    /// never fails: a reference into a released arena cannot exist, so
    /// there is nothing to check. On a released arena it still just returns
    /// `value`.
    #[inline]
    pub fn keep_alive<'a, T: ?Sized>(&'a self, value: &'a T) -> &'a T {
        value
    }
}
