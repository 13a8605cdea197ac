//! # Heap Walking
//!
//! Diagnostics over the block chain: a logging dump ([`show`]) and a full
//! structural audit ([`check`]). Neither is part of the allocation
//! contract; both are meant for debug builds and tests.
//!
//! The audit wants a quiescent heap, so it takes `&mut Heap`: an exclusive
//! borrow cannot coexist with concurrent users or with a live
//! [`ThreadCache`](crate::thread_cache::ThreadCache) (caches borrow the
//! heap), which is exactly the precondition under which "every free block
//! is in a list" is checkable.

use crate::arena::FIRST_BLOCK_WORD;
use crate::block::{FOOTER_WORDS, HEADER_WORDS};
use crate::config::{NUM_SIZE_CLASSES, WORD_SIZE};
use crate::error::CheckError;
use crate::heap::Heap;
use crate::size_class::class_of;
use heap_sync::RawLock;
use log::debug;

/// Aggregate numbers from a heap walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Blocks visited between the arena base and the high-water mark.
    pub blocks: usize,
    /// How many of them are free.
    pub free_blocks: usize,
    /// Total free payload words.
    pub free_words: usize,
    /// Total allocated payload words.
    pub allocated_words: usize,
    /// Largest single free payload.
    pub largest_free_words: u32,
    /// High-water mark in words.
    pub high_water_words: usize,
}

/// Logs every block from the first header to the zero sentinel.
///
/// Purely observational: reads may interleave with concurrent mutation and
/// then describe a heap that never existed as a whole, but they stay
/// inside the arena. Meaningful output wants a quiescent heap.
pub fn show<R: RawLock>(heap: &Heap<R>) {
    let arena = heap.arena();
    let high_water = arena.high_water_word();
    let mut word = FIRST_BLOCK_WORD;
    let mut index = 0_usize;
    while word < high_water {
        // Safety: `word` stays below the high-water mark, inside the region.
        let block = unsafe { arena.block_at_word(word) };
        let tag = unsafe { block.tag() };
        if tag.is_end() {
            debug!("block {index}: unexpected zero header at word {word}");
            return;
        }
        debug!(
            "block {index}: {} words, {} (word offset {word})",
            tag.size(),
            if tag.allocated() { "allocated" } else { "free" },
        );
        word += HEADER_WORDS + tag.size() as usize + FOOTER_WORDS;
        index += 1;
    }
    debug!("end of heap at word {word} ({index} blocks)");
}

/// Audits heap structure: boundary-tag agreement, gap-free traversal, the
/// sentinel, and the free lists (in-bounds acyclic links, free and
/// correctly classed entries, exact correspondence between listed blocks
/// and free blocks).
///
/// Adjacent free blocks are tolerated here; splits park their remainder
/// without re-merging, so a busy interleaving can legitimately leave two
/// free neighbors behind. Use [`check_coalesced`] after a quiescent
/// deallocation sequence to insist on maximal coalescing.
///
/// # Errors
///
/// The first [`CheckError`] encountered, which on an uncorrupted heap is
/// none.
pub fn check<R: RawLock>(heap: &mut Heap<R>) -> Result<HeapStats, CheckError> {
    verify(heap, false)
}

/// [`check`], plus the maximal-coalescing invariant: no two adjacent
/// blocks may both be free.
///
/// # Errors
///
/// As for [`check`], plus [`CheckError::Uncoalesced`].
pub fn check_coalesced<R: RawLock>(
    heap: &mut Heap<R>,
) -> Result<HeapStats, CheckError> {
    verify(heap, true)
}

fn verify<R: RawLock>(
    heap: &Heap<R>,
    require_coalesced: bool,
) -> Result<HeapStats, CheckError> {
    let arena = heap.arena();
    let high_water = arena.high_water_word();
    let mut stats = HeapStats {
        high_water_words: high_water,
        ..HeapStats::default()
    };

    // Pass 1: structural walk over the block chain.
    let mut word = FIRST_BLOCK_WORD;
    let mut previous_free_at: Option<usize> = None;
    while word < high_water {
        // Safety: `word < high_water <= capacity`; bounds grow only after
        // the end-of-block check below.
        let block = unsafe { arena.block_at_word(word) };
        let tag = unsafe { block.tag() };
        if tag.is_end() {
            return Err(CheckError::TruncatedWalk { offset: word });
        }
        let size = tag.size() as usize;
        let end = word + HEADER_WORDS + size + FOOTER_WORDS;
        if end > high_water {
            return Err(CheckError::Overrun { offset: word });
        }
        if unsafe { block.footer_tag() } != tag {
            return Err(CheckError::TagMismatch { offset: word });
        }
        stats.blocks += 1;
        if tag.allocated() {
            stats.allocated_words += size;
            previous_free_at = None;
        } else {
            if let Some(first) = previous_free_at {
                if require_coalesced {
                    return Err(CheckError::Uncoalesced {
                        first,
                        second: word,
                    });
                }
            }
            stats.free_blocks += 1;
            stats.free_words += size;
            stats.largest_free_words = stats.largest_free_words.max(tag.size());
            previous_free_at = Some(word);
        }
        word = end;
    }
    // Safety: the sentinel margin keeps this read inside the region.
    let sentinel = unsafe { arena.block_at_word(high_water).tag() };
    if !sentinel.is_end() {
        return Err(CheckError::MissingSentinel { offset: high_water });
    }

    // Pass 2: free lists are in-bounds, acyclic, free, and correctly
    // classed.
    let mut listed = 0_usize;
    for class in 0..NUM_SIZE_CLASSES {
        // Safety: exclusive heap access stands in for the bank slot.
        let mut cursor = unsafe { heap.list(class).head() };
        let mut steps = 0_usize;
        while cursor != 0 {
            steps += 1;
            if steps > stats.free_blocks {
                return Err(CheckError::CyclicList { class });
            }
            let offset = cursor as usize;
            if offset % WORD_SIZE != 0
                || offset < FIRST_BLOCK_WORD * WORD_SIZE
                || offset / WORD_SIZE >= high_water
            {
                return Err(CheckError::BadLink { class, offset });
            }
            let block = unsafe { arena.block_at(cursor) };
            let tag = unsafe { block.tag() };
            if tag.allocated() || tag.is_end() {
                return Err(CheckError::LinkedButAllocated {
                    class,
                    offset: offset / WORD_SIZE,
                });
            }
            if class_of(tag.size()) != class {
                return Err(CheckError::WrongClass {
                    class,
                    size: tag.size(),
                });
            }
            listed += 1;
            cursor = unsafe { block.next_offset() };
        }
    }

    // Pass 3: every free block is reachable from its class's list. With
    // the counts matching, listed blocks and free blocks correspond
    // one-to-one.
    let mut word = FIRST_BLOCK_WORD;
    while word < high_water {
        let block = unsafe { arena.block_at_word(word) };
        let tag = unsafe { block.tag() };
        let size = tag.size() as usize;
        if !tag.allocated() {
            #[allow(clippy::cast_possible_truncation)]
            let offset = (word * WORD_SIZE) as u32;
            if !list_contains(heap, class_of(tag.size()), offset) {
                return Err(CheckError::Orphaned { offset: word });
            }
        }
        word += HEADER_WORDS + size + FOOTER_WORDS;
    }
    if listed != stats.free_blocks {
        return Err(CheckError::ListCountMismatch {
            free_blocks: stats.free_blocks,
            listed,
        });
    }

    Ok(stats)
}

/// Whether `offset` appears in class `class`'s list (already known
/// acyclic).
fn list_contains<R: RawLock>(heap: &Heap<R>, class: usize, offset: u32) -> bool {
    // Safety: exclusive heap access stands in for the bank slot.
    let mut cursor = unsafe { heap.list(class).head() };
    while cursor != 0 {
        if cursor == offset {
            return true;
        }
        cursor = unsafe { heap.arena().block_at(cursor).next_offset() };
    }
    false
}
