// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Bitmap engines: the lock-free search-and-claim protocol and its
// single-threaded twin, sharing one scan routine.

use crate::word::{mask, which_bit_in_word, which_word, AtomicWord, BitWord};
use std::cell::Cell;
use std::sync::atomic::Ordering;

/// Smallest `i` in `[start, end)` with bit `i` observed as 0, or `end`
/// if none exists.
///
/// Mirrors `_atomic_bit_allocator::find_first_unset`: a hardware
/// leading-ones count on the word at `which_word(start)` after
/// shifting out the already-scanned prefix, then a word-at-a-time
/// advance. `start >= end` (including `start` landing exactly on a
/// word boundary one past the last valid word) returns `end` without
/// touching word storage.
fn find_first_unset<W: BitWord>(start: usize, end: usize, load: impl Fn(usize) -> W) -> usize {
    if start >= end {
        return end;
    }

    let start_word = which_word::<W>(start);
    let mut start_bit_in_word = which_bit_in_word::<W>(start);

    let bits = load(start_word) << start_bit_in_word;
    start_bit_in_word += bits.leading_ones();
    if start_bit_in_word < W::BITS {
        return W::BITS as usize * start_word + start_bit_in_word as usize;
    }

    let end_word = which_word::<W>(end);
    for w in (start_word + 1)..end_word {
        let bits = load(w);
        if bits != W::ALL_ONES {
            return W::BITS as usize * w + bits.leading_ones() as usize;
        }
    }

    end
}

/// Dual of `find_first_unset`: smallest `i` in `[start, end)` with bit
/// `i` observed as 1, or `end` if none exists. Same `start >= end`
/// guard as `find_first_unset`, for the same reason: `find_unset_range`
/// routinely calls this with `start == end` when the candidate run
/// reaches exactly to the bitmap's capacity.
fn find_first_set<W: BitWord>(start: usize, end: usize, load: impl Fn(usize) -> W) -> usize {
    if start >= end {
        return end;
    }

    let start_word = which_word::<W>(start);
    let mut start_bit_in_word = which_bit_in_word::<W>(start);

    let bits = load(start_word) << start_bit_in_word;
    start_bit_in_word += bits.leading_zeros();
    if start_bit_in_word < W::BITS {
        return W::BITS as usize * start_word + start_bit_in_word as usize;
    }

    let end_word = which_word::<W>(end);
    for w in (start_word + 1)..end_word {
        let bits = load(w);
        if bits != W::ZERO {
            return W::BITS as usize * w + bits.leading_zeros() as usize;
        }
    }

    end
}

/// First-fit search for `len` contiguous unset bits in `[start, end)`.
///
/// Returns `end` if no such range exists. Advisory only in the
/// lock-free engine: the caller re-verifies via atomic RMW before
/// committing.
fn find_unset_range<W: BitWord>(
    mut start: usize,
    end: usize,
    len: usize,
    load: impl Fn(usize) -> W,
) -> usize {
    loop {
        start = find_first_unset::<W>(start, end, &load);
        if start + len > end {
            return end;
        }

        let range_end = find_first_set::<W>(start + 1, start + len, &load);
        if start + len <= range_end {
            return start;
        }

        start = range_end + 1;
        if start + len > end {
            return end;
        }
    }
}

/// The capability interface a bitmap storage backend must provide:
/// `{ alloc, free, usage, is_reentrant }`, implemented twice (lock-free
/// and single-threaded) so the facade can install a mutex only where
/// needed.
pub trait BitmapEngine<W: BitWord> {
    /// Build an engine backing `num_words` words, all initially free.
    fn with_words(num_words: usize) -> Self;

    /// Search `[start, end)` for `len` free bits, claim them, and
    /// return the start index — or `end` if no claim could be made.
    fn alloc(&self, len: usize, start: usize, end: usize, ordering: Ordering) -> usize;

    /// Clear bits `[start, start + len)`. Assumes they were all set.
    fn free(&self, start: usize, len: usize, ordering: Ordering);

    /// Population count across every word.
    fn usage(&self, ordering: Ordering) -> usize;

    /// Whether this engine is safe to call concurrently from multiple
    /// threads without external synchronization.
    fn is_reentrant() -> bool;
}

/// Lock-free bitmap engine: atomic read-modify-write per word,
/// optimistic claim-and-rollback on contention.
///
/// Mirrors `_reentrant_lock_free_bit_allocator`'s claim/rollback
/// sequence.
pub struct LockFreeBitmap<W: BitWord> {
    words: Vec<W::Atomic>,
}

impl<W: BitWord> LockFreeBitmap<W> {
    #[inline]
    fn load(&self, ordering: Ordering) -> impl Fn(usize) -> W + '_ {
        move |i: usize| self.words[i].load(ordering)
    }

    /// Single-word claim of `mask` in `word[idx]`. On collision, rolls
    /// back exactly the bits this call set (never a bit that was
    /// already 1), then returns `false`.
    fn claim_single(&self, idx: usize, m: W, ordering: Ordering) -> bool {
        let prev = self.words[idx].fetch_or(m, ordering);
        if (prev & m) == W::ZERO {
            return true;
        }

        self.words[idx].fetch_and(!m | (prev & m), Ordering::Relaxed);
        false
    }

    /// Multi-word claim spanning `first_word..=last_word`. Implements
    /// a three-phase claim (first word, then mid words, then last
    /// word) with a full reverse rollback on failure at any phase.
    fn claim_multi(
        &self,
        first_word: usize,
        last_word: usize,
        mask_first: W,
        mask_last: W,
        ordering: Ordering,
    ) -> bool {
        let prev_first = self.words[first_word].fetch_or(mask_first, ordering);
        if (prev_first & mask_first) != W::ZERO {
            return false;
        }

        // Phase B: mid-range words must all have been zero; set to all-ones.
        let mut w = first_word + 1;
        let mut mid_failed = false;
        while w < last_word {
            let prev = self.words[w].fetch_or(W::ALL_ONES, ordering);
            if prev != W::ZERO {
                self.words[w].fetch_and(prev, Ordering::Relaxed);
                mid_failed = true;
                break;
            }
            w += 1;
        }

        if !mid_failed {
            let prev_last = self.words[last_word].fetch_or(mask_last, ordering);
            if (prev_last & mask_last) == W::ZERO {
                return true;
            }

            // rollback_last
            self.words[last_word]
                .fetch_and(!mask_last | (prev_last & mask_last), Ordering::Relaxed);
        }

        // rollback_mid: every word in (first_word, w) was observed as
        // 0 before our fetch_or and set to all-ones by us; no
        // concurrent committed claim can coexist on it (an all-ones
        // word fails every other claim), so a plain store of 0 is
        // safe. `w` itself was already reverted above (either by
        // claim_multi's own mid-loop break, or it never got set).
        for mid in (first_word + 1..w).rev() {
            debug_assert_eq!(
                self.words[mid].load(Ordering::Acquire),
                W::ALL_ONES,
                "rollback_mid: word not observed all-ones before revert"
            );
            self.words[mid].store(W::ZERO, Ordering::Relaxed);
        }

        // rollback_first
        self.words[first_word]
            .fetch_and(!mask_first | (prev_first & mask_first), Ordering::Relaxed);

        false
    }
}

impl<W: BitWord> BitmapEngine<W> for LockFreeBitmap<W> {
    fn with_words(num_words: usize) -> Self {
        Self {
            words: (0..num_words).map(|_| W::Atomic::new(W::ZERO)).collect(),
        }
    }

    fn alloc(&self, len: usize, start: usize, end: usize, ordering: Ordering) -> usize {
        let mut scan_from = start;
        loop {
            let p = find_unset_range::<W>(scan_from, end, len, self.load(ordering));
            if p + len > end {
                return end;
            }

            let first_word = which_word::<W>(p);
            let last_word = which_word::<W>(p + len - 1);

            let claimed = if first_word == last_word {
                let m = mask::<W>(
                    which_bit_in_word::<W>(p),
                    which_bit_in_word::<W>(p + len - 1),
                );
                self.claim_single(first_word, m, ordering)
            } else {
                let mask_first = W::ALL_ONES >> which_bit_in_word::<W>(p);
                let mask_last =
                    W::ALL_ONES << (W::BITS - which_bit_in_word::<W>(p + len - 1) - 1);
                self.claim_multi(first_word, last_word, mask_first, mask_last, ordering)
            };

            if claimed {
                return p;
            }

            log::debug!("lock-free claim of [{p}, {}) lost the race, restarting scan", p + len);
            scan_from = start;
        }
    }

    fn free(&self, start: usize, len: usize, ordering: Ordering) {
        let first_word = which_word::<W>(start);
        let last_word = which_word::<W>(start + len - 1);

        if first_word == last_word {
            let m = mask::<W>(
                which_bit_in_word::<W>(start),
                which_bit_in_word::<W>(start + len - 1),
            );
            self.words[first_word].fetch_and(!m, ordering);
            return;
        }

        let mask_first = W::ALL_ONES >> which_bit_in_word::<W>(start);
        let mask_last = W::ALL_ONES << (W::BITS - which_bit_in_word::<W>(start + len - 1) - 1);

        self.words[first_word].fetch_and(!mask_first, ordering);
        for w in (first_word + 1)..last_word {
            self.words[w].store(W::ZERO, ordering);
        }
        self.words[last_word].fetch_and(!mask_last, ordering);
    }

    fn usage(&self, ordering: Ordering) -> usize {
        self.words
            .iter()
            .map(|w| w.load(ordering).count_ones() as usize)
            .sum()
    }

    fn is_reentrant() -> bool {
        true
    }
}

/// Single-threaded bitmap engine: plain, non-atomic word operations.
/// Not reentrant — must be externally serialized.
///
/// Mirrors `_single_threaded_bit_allocator`'s plain word operations.
/// The claim protocol collapses to "no rollback" because
/// `find_unset_range` already observed the true, uncontended state:
/// once it returns `p < end`, the claim always succeeds.
///
/// # Safety
///
/// `Cell<W>` is `Send` but not `Sync`; this engine is instead made
/// `Sync` under the contract that every caller holds the facade's
/// mutex for the duration of the call (see `BitRangeAllocator`). That
/// external serialization is what makes the interior mutability below
/// sound — callers in languages with stricter aliasing rules must
/// document this same unsafe boundary.
pub struct SingleThreadedBitmap<W: BitWord> {
    words: Vec<Cell<W>>,
}

unsafe impl<W: BitWord> Sync for SingleThreadedBitmap<W> {}

impl<W: BitWord> SingleThreadedBitmap<W> {
    #[inline]
    fn load_plain(&self, i: usize) -> W {
        self.words[i].get()
    }
}

impl<W: BitWord> BitmapEngine<W> for SingleThreadedBitmap<W> {
    fn with_words(num_words: usize) -> Self {
        Self {
            words: (0..num_words).map(|_| Cell::new(W::ZERO)).collect(),
        }
    }

    fn alloc(&self, len: usize, start: usize, end: usize, _ordering: Ordering) -> usize {
        let p = find_unset_range::<W>(start, end, len, |i| self.load_plain(i));
        if p + len > end {
            return end;
        }

        let first_word = which_word::<W>(p);
        let last_word = which_word::<W>(p + len - 1);

        if first_word == last_word {
            let m = mask::<W>(
                which_bit_in_word::<W>(p),
                which_bit_in_word::<W>(p + len - 1),
            );
            let w = &self.words[first_word];
            w.set(w.get() | m);
        } else {
            let mask_first = W::ALL_ONES >> which_bit_in_word::<W>(p);
            let mask_last = W::ALL_ONES << (W::BITS - which_bit_in_word::<W>(p + len - 1) - 1);

            let w = &self.words[first_word];
            w.set(w.get() | mask_first);
            for mid in (first_word + 1)..last_word {
                self.words[mid].set(W::ALL_ONES);
            }
            let w = &self.words[last_word];
            w.set(w.get() | mask_last);
        }

        p
    }

    fn free(&self, start: usize, len: usize, _ordering: Ordering) {
        let first_word = which_word::<W>(start);
        let last_word = which_word::<W>(start + len - 1);

        if first_word == last_word {
            let m = mask::<W>(
                which_bit_in_word::<W>(start),
                which_bit_in_word::<W>(start + len - 1),
            );
            let w = &self.words[first_word];
            w.set(w.get() & !m);
            return;
        }

        let mask_first = W::ALL_ONES >> which_bit_in_word::<W>(start);
        let mask_last = W::ALL_ONES << (W::BITS - which_bit_in_word::<W>(start + len - 1) - 1);

        let w = &self.words[first_word];
        w.set(w.get() & !mask_first);
        for mid in (first_word + 1)..last_word {
            self.words[mid].set(W::ZERO);
        }
        let w = &self.words[last_word];
        w.set(w.get() & !mask_last);
    }

    fn usage(&self, _ordering: Ordering) -> usize {
        self.words.iter().map(|w| w.get().count_ones() as usize).sum()
    }

    fn is_reentrant() -> bool {
        false
    }
}
