// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// Failure modes surfaced by `BitRangeAllocator`.
///
/// The bitmap engines themselves stay infallible (they report failure
/// via the `end` sentinel); only the facade converts that into a
/// typed error for callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    #[error("no contiguous run of {requested} bit(s) available")]
    OutOfSpace { requested: usize },

    #[error("allocation length must be at least 1")]
    InvalidArgument,
}
