//! Error taxonomy of the allocator.

use thiserror::Error;

/// Failure reported by the allocation entry points.
///
/// A failed allocation leaves no partial state behind: no list was
/// modified and the high-water mark did not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// No free block can satisfy the request and the remaining arena
    /// capacity is insufficient to carve a fresh one.
    #[error("out of memory")]
    OutOfMemory,
}

/// Structural defect found by [`check`](crate::debug::check).
///
/// Double frees and frees of foreign pointers are undefined behavior by
/// contract and are not detected at the call site; the damage they cause
/// surfaces here, in debug-build heap walks. Offsets are in words from the
/// arena base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckError {
    /// A block's footer disagrees with its header.
    #[error("header/footer mismatch at word offset {offset}")]
    TagMismatch { offset: usize },

    /// A zero header was found below the high-water mark, so the forward
    /// walk cannot reach every block.
    #[error("zero header below the high-water mark at word offset {offset}")]
    TruncatedWalk { offset: usize },

    /// A block extends past the high-water mark.
    #[error("block at word offset {offset} crosses the high-water mark")]
    Overrun { offset: usize },

    /// The word after the last block is not the zero sentinel.
    #[error("missing end-of-heap sentinel at word offset {offset}")]
    MissingSentinel { offset: usize },

    /// A free-list link points outside the initialized heap.
    #[error("free list {class} links to invalid offset {offset}")]
    BadLink { class: usize, offset: usize },

    /// A free list contains a block whose tags say it is allocated.
    #[error("free list {class} holds an allocated block at word offset {offset}")]
    LinkedButAllocated { class: usize, offset: usize },

    /// A block is linked into a list of the wrong size class.
    #[error("block of {size} words is linked into class {class}")]
    WrongClass { class: usize, size: u32 },

    /// A free list loops back on itself.
    #[error("free list {class} is cyclic")]
    CyclicList { class: usize },

    /// A free block is not reachable from its class's list.
    #[error("free block at word offset {offset} is not in its class list")]
    Orphaned { offset: usize },

    /// The lists collectively hold a different number of blocks than the
    /// walk found free.
    #[error("walk found {free_blocks} free blocks but the lists hold {listed}")]
    ListCountMismatch { free_blocks: usize, listed: usize },

    /// Two adjacent blocks are both free (coalescing missed them).
    #[error("adjacent free blocks at word offsets {first} and {second}")]
    Uncoalesced { first: usize, second: usize },
}
