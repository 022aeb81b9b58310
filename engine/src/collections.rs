// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Collection types backed by bump memory from the [`Hunk`]. Their backing
//! slices follow the hunk's scope discipline: a list allocated during a frame
//! must not be carried into the next frame.

use core::{
    fmt::Debug,
    mem::{needs_drop, transmute, MaybeUninit},
    ops::{Deref, DerefMut},
};

use crate::hunk::Hunk;

/// A fixed-capacity contiguous growable array type.
///
/// Named like Vec since it's used similarly, but this type does *not*
/// allocate more memory as needed: the capacity is reserved up front from the
/// hunk's bump region. Very cheap to create and push to, and the usual
/// carrier for per-frame result lists (entity queries, draw order copies).
pub struct FixedVec<'a, T> {
    uninit_slice: &'a mut [MaybeUninit<T>],
    initialized_len: usize,
}

impl<T> FixedVec<'_, T> {
    /// Creates a new [`FixedVec`] with enough space for `capacity` elements
    /// of type `T`.
    pub fn new(hunk: &Hunk, capacity: usize) -> FixedVec<'_, T> {
        FixedVec {
            uninit_slice: hunk.bump_alloc_uninit_slice::<T>(capacity),
            initialized_len: 0,
        }
    }

    /// Appends the value to the back of the array. If there's no capacity
    /// left, returns the given value back wrapped in a [`Result::Err`].
    pub fn push(&mut self, value: T) -> Result<(), T> {
        let i = self.initialized_len;
        let Some(uninit_at_i) = self.uninit_slice.get_mut(i) else {
            return Err(value);
        };

        // The "existing value" is uninitialized memory (or a previously
        // removed value, which was dropped at removal), so nothing leaks
        // here.
        uninit_at_i.write(value);
        self.initialized_len = i + 1;

        Ok(())
    }

    /// If non-empty, returns the final element and shortens the array by one.
    pub fn pop(&mut self) -> Option<T> {
        if self.initialized_len == 0 {
            return None;
        }
        let i = self.initialized_len - 1;
        // Safety: since i < initialized_len, the MaybeUninit at that index is
        // definitely initialized. Double-reads (thus double-drops) are
        // avoided by decrementing initialized_len right after.
        let value = unsafe { self.uninit_slice[i].assume_init_read() };
        self.initialized_len -= 1;
        Some(value)
    }

    /// Empties out the array, dropping the currently contained values.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Shortens the array to be the given length if it's currently longer.
    /// Any values past the new length are dropped.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len >= self.initialized_len {
            return;
        }
        if needs_drop::<T>() {
            for initialized_value in &mut self.uninit_slice[new_len..self.initialized_len] {
                // Safety: everything up to `initialized_len` is initialized,
                // and these values are not reachable afterwards.
                unsafe { initialized_value.assume_init_drop() };
            }
        }
        self.initialized_len = new_len;
    }

    /// Returns `true` if there's no more capacity for additional elements.
    pub fn is_full(&self) -> bool {
        self.initialized_len == self.uninit_slice.len()
    }
}

impl<T: Copy> FixedVec<'_, T> {
    /// Appends the values from the slice to the back of the array in order.
    /// If there's not enough capacity to extend by the whole slice, no values
    /// are copied over, and this function returns `false`.
    pub fn extend_from_slice(&mut self, slice: &[T]) -> bool {
        if self.initialized_len + slice.len() > self.uninit_slice.len() {
            return false;
        }
        for (src, dst) in (slice.iter()).zip(&mut self.uninit_slice[self.initialized_len..]) {
            dst.write(*src);
            self.initialized_len += 1;
        }
        true
    }
}

impl<T> Drop for FixedVec<'_, T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Deref for FixedVec<'_, T> {
    type Target = [T];

    fn deref<'a>(&'a self) -> &'a [T] {
        let initialized_slice = &self.uninit_slice[..self.initialized_len];
        // Safety: `MaybeUninit<T>` is identical to `T` except that it might
        // be uninitialized, and all values up to `initialized_len` are
        // initialized.
        unsafe { transmute::<&'a [MaybeUninit<T>], &'a [T]>(initialized_slice) }
    }
}

impl<T> DerefMut for FixedVec<'_, T> {
    fn deref_mut<'a>(&'a mut self) -> &'a mut [T] {
        let initialized_slice = &mut self.uninit_slice[..self.initialized_len];
        // Safety: as in Deref.
        unsafe { transmute::<&'a mut [MaybeUninit<T>], &'a mut [T]>(initialized_slice) }
    }
}

impl<T: Debug> Debug for FixedVec<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let slice: &[T] = self;
        f.debug_list().entries(slice).finish()
    }
}

/// An in-place insertion sort.
///
/// Careful: this is O(n²) for unsorted data. It's the right tool for data
/// that is *mostly* sorted already, like the entity order table which is
/// re-sorted every frame and barely changes between frames.
pub fn insertion_sort_by<T: Copy>(list: &mut [T], greater: impl Fn(&T, &T) -> bool) {
    for i in 1..list.len() {
        let tmp = list[i];
        let mut j = i;
        while j > 0 && greater(&list[j - 1], &tmp) {
            list[j] = list[j - 1];
            j -= 1;
        }
        list[j] = tmp;
    }
}

#[cfg(test)]
mod tests {
    use super::{insertion_sort_by, FixedVec};
    use crate::hunk::Hunk;

    #[test]
    fn push_until_full() {
        let hunk = Hunk::new(4096);
        let mut vec: FixedVec<u32> = FixedVec::new(&hunk, 3);
        vec.push(1).unwrap();
        vec.push(2).unwrap();
        vec.push(3).unwrap();
        assert!(vec.is_full());
        assert_eq!(Err(4), vec.push(4));
        assert_eq!(&[1, 2, 3], &*vec);
    }

    #[test]
    fn drops_contained_values() {
        use core::sync::atomic::{AtomicI32, Ordering};
        static LIVE: AtomicI32 = AtomicI32::new(0);

        struct Counted;
        impl Counted {
            fn new() -> Counted {
                LIVE.fetch_add(1, Ordering::Relaxed);
                Counted
            }
        }
        impl Drop for Counted {
            fn drop(&mut self) {
                LIVE.fetch_add(-1, Ordering::Relaxed);
            }
        }

        let hunk = Hunk::new(4096);
        let mut vec: FixedVec<Counted> = FixedVec::new(&hunk, 8);
        for _ in 0..8 {
            vec.push(Counted::new()).ok().unwrap();
        }
        assert_eq!(8, LIVE.load(Ordering::Relaxed));
        vec.truncate(3);
        assert_eq!(3, LIVE.load(Ordering::Relaxed));
        drop(vec);
        assert_eq!(0, LIVE.load(Ordering::Relaxed));
    }

    #[test]
    fn insertion_sort_sorts_nearly_sorted_data() {
        let mut values = [1, 2, 4, 3, 5, 7, 6, 8];
        insertion_sort_by(&mut values, |a, b| a > b);
        assert_eq!([1, 2, 3, 4, 5, 6, 7, 8], values);
    }

    #[test]
    fn insertion_sort_is_stable() {
        let mut values = [(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')];
        insertion_sort_by(&mut values, |a, b| a.0 > b.0);
        assert_eq!([(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')], values);
    }
}
