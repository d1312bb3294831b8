// SPDX-License-Identifier: MIT OR Apache-2.0
//
// The public surface: wraps one bitmap engine with a buffer-derived
// bit capacity and, when the engine is not internally reentrant, a
// mutex. Converts "no room" sentinels into a surfaced `AllocError`.

use crate::bitmap::{BitmapEngine, LockFreeBitmap, SingleThreadedBitmap};
use crate::error::AllocError;
use crate::word::{sizeof_array, BitWord};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;

/// A lock-free bit-range allocator over words of type `W`.
pub type LockFreeAllocator<W> = BitRangeAllocator<W, LockFreeBitmap<W>>;

/// A mutex-guarded bit-range allocator over words of type `W`, for use
/// when lock-free contention overhead isn't warranted.
pub type SerializedAllocator<W> = BitRangeAllocator<W, SingleThreadedBitmap<W>>;

/// Default memory ordering used when a caller doesn't need to reason
/// about a specific one: acquire on allocation commit, release on
/// free.
pub const DEFAULT_ALLOC_ORDERING: Ordering = Ordering::Acquire;
pub const DEFAULT_FREE_ORDERING: Ordering = Ordering::Release;

/// A first-fit bit-range allocator backed by a dense bitmap.
///
/// `E` selects the engine: `LockFreeBitmap<W>` for unsynchronized
/// concurrent use, or `SingleThreadedBitmap<W>` for use behind this
/// facade's own mutex. Construction mirrors
/// `jps::serialized_bit_allocator`: the bit capacity is derived from a
/// byte buffer length, rounded down to whole words.
pub struct BitRangeAllocator<W: BitWord, E: BitmapEngine<W>> {
    end_pos: usize,
    engine: E,
    // `Some` only when `E::is_reentrant()` is false.
    lock: Option<Mutex<()>>,
    _word: std::marker::PhantomData<W>,
}

impl<W: BitWord, E: BitmapEngine<W>> BitRangeAllocator<W, E> {
    /// Build an allocator with exactly `depth` usable bits.
    pub fn new(depth: usize) -> Self {
        let num_words = sizeof_array::<W>(depth);
        log::debug!(
            "BitRangeAllocator::new: depth={depth}, words={num_words}, reentrant={}",
            E::is_reentrant()
        );

        Self {
            end_pos: depth,
            engine: E::with_words(num_words),
            lock: if E::is_reentrant() {
                None
            } else {
                Some(Mutex::new(()))
            },
            _word: std::marker::PhantomData,
        }
    }

    /// Build an allocator whose bit capacity is derived from a raw
    /// buffer length in bytes: the buffer length is rounded down to a
    /// whole number of words of size `W`, then scaled to bits. A
    /// buffer too small to hold even one word yields a zero-capacity
    /// allocator (every `alloc` call fails).
    pub fn from_buffer_len(buffer_len: usize) -> Self {
        let bytes_per_word = (W::BITS / 8) as usize;
        let whole_words = buffer_len / bytes_per_word;
        let depth = whole_words * 8 * bytes_per_word;
        Self::new(depth)
    }

    /// Bit capacity (`end_pos`), immutable after construction.
    pub fn size(&self) -> usize {
        self.end_pos
    }

    /// Count of currently allocated (set) bits. Weakly consistent
    /// under the lock-free engine.
    pub fn usage(&self) -> usize {
        let _guard = self.lock.as_ref().map(|m| m.lock());
        self.engine.usage(Ordering::Acquire)
    }

    /// Allocate the first-fit contiguous run of `len` bits.
    pub fn alloc(&self, len: usize) -> Result<usize, AllocError> {
        self.alloc_with(len, DEFAULT_ALLOC_ORDERING)
    }

    /// Allocate with an explicit memory ordering for the commit step.
    pub fn alloc_with(&self, len: usize, ordering: Ordering) -> Result<usize, AllocError> {
        if len == 0 {
            return Err(AllocError::InvalidArgument);
        }

        let _guard = self.lock.as_ref().map(|m| m.lock());
        let start = self.engine.alloc(len, 0, self.end_pos, ordering);
        if start == self.end_pos {
            return Err(AllocError::OutOfSpace { requested: len });
        }

        Ok(start)
    }

    /// Free a previously allocated `(start, len)` range.
    ///
    /// Undefined behavior (not checked) if `(start, len)` does not
    /// correspond to a live allocation this facade returned.
    pub fn free(&self, start: usize, len: usize) {
        self.free_with(start, len, DEFAULT_FREE_ORDERING);
    }

    /// Free with an explicit memory ordering for the commit step.
    pub fn free_with(&self, start: usize, len: usize, ordering: Ordering) {
        if len == 0 {
            return;
        }

        let _guard = self.lock.as_ref().map(|m| m.lock());
        self.engine.free(start, len, ordering);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::LockFreeBitmap;

    #[test]
    fn s1_s2_s3_sequence() {
        let a: BitRangeAllocator<u8, LockFreeBitmap<u8>> = BitRangeAllocator::new(16);

        assert_eq!(a.alloc(2).unwrap(), 0);
        assert_eq!(a.alloc(1).unwrap(), 2);
        assert_eq!(a.alloc(5).unwrap(), 3);
        assert_eq!(a.usage(), 8);

        a.free(0, 2);
        assert_eq!(a.alloc(2).unwrap(), 0);
        assert_eq!(a.usage(), 8);
    }

    #[test]
    fn s6_alloc_zero_is_invalid_argument() {
        let a: BitRangeAllocator<u8, LockFreeBitmap<u8>> = BitRangeAllocator::new(16);
        assert_eq!(a.alloc(0), Err(AllocError::InvalidArgument));
        assert_eq!(a.usage(), 0);
    }

    #[test]
    fn out_of_space_is_explicit_error() {
        let a: BitRangeAllocator<u8, LockFreeBitmap<u8>> = BitRangeAllocator::new(8);
        a.alloc(8).unwrap();
        assert_eq!(a.alloc(1), Err(AllocError::OutOfSpace { requested: 1 }));
    }

    #[test]
    fn zero_capacity_from_undersized_buffer() {
        let a: BitRangeAllocator<u64, LockFreeBitmap<u64>> = BitRangeAllocator::from_buffer_len(4);
        assert_eq!(a.size(), 0);
        assert_eq!(a.alloc(1), Err(AllocError::OutOfSpace { requested: 1 }));
    }

    #[test]
    fn buffer_len_rounds_down_to_whole_words() {
        // 20 bytes -> 2 whole u64 words (16 bytes) -> 128 bits.
        let a: BitRangeAllocator<u64, LockFreeBitmap<u64>> =
            BitRangeAllocator::from_buffer_len(20);
        assert_eq!(a.size(), 128);
    }

    #[test]
    fn serialized_allocator_matches_lock_free_semantics() {
        use crate::bitmap::SingleThreadedBitmap;

        let a: BitRangeAllocator<u8, SingleThreadedBitmap<u8>> = BitRangeAllocator::new(16);
        assert_eq!(a.alloc(2).unwrap(), 0);
        assert_eq!(a.alloc(1).unwrap(), 2);
        assert_eq!(a.alloc(5).unwrap(), 3);
        a.free(0, 2);
        assert_eq!(a.alloc(2).unwrap(), 0);
    }
}
