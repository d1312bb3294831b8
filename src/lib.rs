// SPDX-License-Identifier: MIT OR Apache-2.0
//
// A concurrent, first-fit bit-range allocator over a dense in-memory
// bitmap. Clients request contiguous runs of bits; the allocator
// returns a starting index (setting those bits) or fails. A later
// `free(start, len)` clears exactly those bits.
//
// Two interchangeable engines share one search-and-claim contract:
// `LockFreeBitmap` uses atomic read-modify-write with optimistic
// rollback on contention, and `SingleThreadedBitmap` uses plain word
// operations under external serialization. `BitRangeAllocator` wraps
// either one behind a single public surface.

pub mod bitmap;
pub mod error;
pub mod facade;
pub mod word;

pub use bitmap::{BitmapEngine, LockFreeBitmap, SingleThreadedBitmap};
pub use error::AllocError;
pub use facade::{
    BitRangeAllocator, LockFreeAllocator, SerializedAllocator, DEFAULT_ALLOC_ORDERING,
    DEFAULT_FREE_ORDERING,
};
pub use word::BitWord;
