//! # Allocation Core
//!
//! [`Heap`] ties the arena, the block layout and the segregated lists
//! together and implements the allocate/deallocate protocol:
//!
//! * `allocate`: first-fit over the free lists from the request's class
//!   upward, splitting oversized blocks, falling back to carving fresh
//!   space off the arena tail.
//! * `deallocate`: mark the block free, merge it with free neighbors in
//!   both directions (immediate coalescing via the boundary tags), and
//!   file the survivor under its new class.
//!
//! ## Locking
//!
//! The size-class locks live in a [`LockBank`] indexed by class; the
//! arena tail has its own lock, never held together with a class lock.
//! Coalescing is the only place a thread holds two class locks at once,
//! and it takes the second through the bank's ascending-index discipline:
//! holding `c` and needing `c' < c` releases `c`, takes `c'`, retakes
//! `c`, and rereads the neighbor, whose state may have moved on in the
//! window.
//!
//! The merge-once discipline rides on list membership: a freed block is
//! *unlinked* while its owner works on it, so a concurrent neighbor that
//! speculatively observes it free will fail the checked removal and skip
//! the merge rather than fight over it. The owner keeps the freed
//! block's class lock from the moment it is marked free until it is
//! pushed into its (possibly larger, merge-grown) home list, taking the
//! home lock alongside, so a non-cached free block is never unreachable
//! from every list while no lock covers it.

use crate::arena::Arena;
use crate::block::{Block, OVERHEAD_WORDS};
use crate::config::{NUM_SIZE_CLASSES, WORD_SIZE};
use crate::error::AllocError;
use crate::free_list::FreeList;
use crate::size_class::class_of;
use core::ptr::NonNull;
use heap_sync::{LockBank, RawLock, RawSpin};
use log::{debug, trace};

/// Rounds a request in bytes up to whole payload words (at least one).
pub(crate) const fn words_for(bytes: u32) -> u32 {
    let words = bytes.div_ceil(WORD_SIZE as u32);
    if words == 0 { 1 } else { words }
}

/// Block overhead as a word count, for size arithmetic on `u32` tags.
#[allow(clippy::cast_possible_truncation)]
const OVERHEAD: u32 = OVERHEAD_WORDS as u32;

/// A concurrent boundary-tag heap over one contiguous arena.
///
/// Generic over the raw lock type so fairness is the caller's choice:
/// [`RawSpin`] (the default) for throughput, [`heap_sync::RawTicket`] for
/// FIFO ordering under heavy contention. Several independent heaps over
/// disjoint regions may coexist.
pub struct Heap<R: RawLock = RawSpin> {
    arena: Arena<R>,
    locks: LockBank<R, NUM_SIZE_CLASSES>,
    lists: [FreeList; NUM_SIZE_CLASSES],
}

// Safety: all interior state is reached through the class lock bank and
// the arena's tail lock; the raw base pointer carries no thread affinity.
unsafe impl<R: RawLock + Send> Send for Heap<R> {}
unsafe impl<R: RawLock + Send + Sync> Sync for Heap<R> {}

impl<R: RawLock + Default> Heap<R> {
    /// Builds a heap over the byte region at `base`.
    ///
    /// The region becomes one uninitialized tail; blocks are carved from
    /// it on demand.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `bytes` bytes, aligned
    /// to at least a word, **zero-filled**, exclusive to this heap, and
    /// must outlive it. (Freshly mapped or `.bss` memory is already
    /// zeroed; anything else must be cleared first, since the zero tail is
    /// what terminates heap walks.)
    ///
    /// # Panics
    ///
    /// Panics if `base` is unaligned or `bytes` cannot hold a single block.
    #[must_use]
    pub unsafe fn new(base: *mut u8, bytes: usize) -> Self {
        let arena = unsafe { Arena::new(base, bytes) };
        debug!("heap over {} words", arena.capacity_words());
        Self {
            arena,
            locks: LockBank::new(),
            lists: core::array::from_fn(|_| FreeList::default()),
        }
    }
}

impl<R: RawLock> Heap<R> {
    pub(crate) fn arena(&self) -> &Arena<R> {
        &self.arena
    }

    pub(crate) fn locks(&self) -> &LockBank<R, NUM_SIZE_CLASSES> {
        &self.locks
    }

    pub(crate) fn list(&self, class: usize) -> &FreeList {
        &self.lists[class]
    }

    /// Whether `p` points into memory this heap has initialized.
    pub fn contains(&self, p: *const u8) -> bool {
        self.arena.contains(p)
    }

    /// Allocates at least `bytes` writable bytes, word-aligned.
    ///
    /// A request of zero bytes still yields a one-word payload. On
    /// failure no free list nor the high-water mark has been touched.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] when no free block fits and the arena
    /// tail is exhausted.
    pub fn allocate(&self, bytes: u32) -> Result<NonNull<u8>, AllocError> {
        let words = words_for(bytes);
        self.allocate_words(words, class_of(words))
    }

    /// Allocation body: scan classes `first_class..`, then carve fresh.
    pub(crate) fn allocate_words(
        &self,
        words: u32,
        first_class: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        for class in first_class..NUM_SIZE_CLASSES {
            let found = {
                let _slot = self.locks.guard(class);
                // Safety: the guard holds this class's bank slot; the
                // popped block is ours.
                unsafe { self.lists[class].pop_first_fit(&self.arena, words) }
            };
            if let Some(block) = found {
                trace!(
                    "class {class}: reusing {} words for a {words}-word request",
                    unsafe { block.size_words() },
                );
                // Safety: `block` was just unlinked and belongs to us.
                return Ok(unsafe { self.place(block, words) });
            }
        }
        let block = self.arena.reserve_fresh(words)?;
        // Safety: a freshly carved block is live and exclusively ours.
        Ok(unsafe { block.payload() })
    }

    /// Marks an owned free block allocated for `words` payload words,
    /// splitting off the tail when the remainder keeps at least one
    /// payload word of its own.
    ///
    /// # Safety
    ///
    /// `block` is free, unlinked, and owned by the caller; no lock held.
    unsafe fn place(&self, block: Block, words: u32) -> NonNull<u8> {
        let have = unsafe { block.size_words() };
        if have >= words + OVERHEAD + 1 {
            // Allocated prefix of the exact request, free remainder after.
            unsafe { block.set_tags(words, true) };
            let rest = unsafe { block.next() };
            let rest_words = have - words - OVERHEAD;
            unsafe {
                rest.set_next_offset(0);
                rest.set_tags(rest_words, false);
            }
            let rest_class = class_of(rest_words);
            {
                let _slot = self.locks.guard(rest_class);
                // Safety: slot held; the remainder is free, owned,
                // unlinked.
                unsafe { self.lists[rest_class].push(&self.arena, rest) };
            }
            trace!("split: kept {words} words, {rest_words}-word remainder to class {rest_class}");
        } else {
            unsafe { block.set_tags(have, true) };
        }
        unsafe { block.payload() }
    }

    /// Releases a block previously returned by [`allocate`](Self::allocate).
    ///
    /// A null `ptr` is a no-op. The freed block is merged with any free
    /// neighbors before being filed.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer obtained from this heap's
    /// `allocate` (directly or through a cache) that has not been freed
    /// since. Freeing foreign pointers or freeing twice corrupts the heap.
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };
        let block = unsafe { Block::from_payload(payload.as_ptr()) };
        debug_assert!(self.contains(ptr.cast_const()), "foreign pointer freed");
        unsafe { self.release(block) };
    }

    /// Frees an owned block: mark, coalesce both ways, file the survivor.
    ///
    /// Also the back end of thread-cache flushing, where the incoming
    /// block is already tagged free; re-tagging is idempotent.
    ///
    /// # Safety
    ///
    /// `block` is a live block owned by the caller and linked in no list.
    pub(crate) unsafe fn release(&self, block: Block) {
        let words = unsafe { block.size_words() };
        let held = class_of(words);
        trace!("free {words} words (class {held})");

        self.locks.lock(held);
        // Safety: class slot held; the block is ours until it is filed.
        unsafe { block.set_tags(words, false) };
        let block = unsafe { self.coalesce_forward(held, block) };
        let block = unsafe { self.coalesce_backward(held, block) };

        // Merging only grows the block, so its home class sits at or
        // above `held` and the ascending rule allows taking it directly.
        // The push happens with both slots held: the freed block is never
        // outside every list while no lock covers it.
        let home = class_of(unsafe { block.size_words() });
        debug_assert!(home >= held, "coalescing shrank a block");
        if home != held {
            self.locks.lock(home);
        }
        // Safety: home slot held.
        unsafe { self.lists[home].push(&self.arena, block) };
        unsafe {
            if home != held {
                self.locks.unlock(home);
            }
            self.locks.unlock(held);
        }
    }

    /// Tries to absorb the next block in address order.
    ///
    /// The neighbor's size is read speculatively to learn which lock to
    /// take; once the bank grants it the neighbor is reread and must
    /// still be free, classified where we locked, and present in its
    /// list. Any mismatch means a concurrent operation got there first: a
    /// changed class retries against the fresh size, anything else skips.
    ///
    /// # Safety
    ///
    /// Caller holds bank slot `held` and owns `block` (free, unlinked).
    unsafe fn coalesce_forward(&self, held: usize, block: Block) -> Block {
        loop {
            let next = unsafe { block.next() };
            let peek = unsafe { next.tag() };
            if peek.is_end() || peek.allocated() {
                return block;
            }
            let class = class_of(peek.size());
            let second = self.locks.lock_second(held, class);

            // Reread under the lock; the peek was speculative, and a
            // reacquire detour invalidates it outright.
            let tag = unsafe { next.tag() };
            let mergeable = !tag.is_end() && !tag.allocated();
            if mergeable && class_of(tag.size()) == class {
                // Safety: `second` holds the neighbor's slot.
                if unsafe { self.lists[class].remove_checked(&self.arena, next) } {
                    // The neighbor is ours; in-list blocks are immutable,
                    // so `tag` is its true extent.
                    let grown = unsafe { block.size_words() } + OVERHEAD + tag.size();
                    unsafe { block.set_tags(grown, false) };
                    drop(second);
                    trace!("forward merge -> {grown} words");
                    return block;
                }
                // Free by its tags but in no list: mid-free by its owner,
                // or parked in a thread cache. Not ours to take.
                return block;
            }
            drop(second);
            if mergeable {
                // Classified under a stale size; retry with the fresh one.
                continue;
            }
            return block;
        }
    }

    /// Tries to absorb the previous block in address order; the merged
    /// block is rooted at the predecessor. Same protocol as
    /// [`coalesce_forward`](Self::coalesce_forward), navigating through
    /// the predecessor's footer.
    ///
    /// # Safety
    ///
    /// Caller holds bank slot `held` and owns `block` (free, unlinked).
    unsafe fn coalesce_backward(&self, held: usize, block: Block) -> Block {
        if self.arena.is_first(block) {
            return block;
        }
        loop {
            let peek = unsafe { block.prev_footer_tag() };
            if peek.is_end() || peek.allocated() {
                return block;
            }
            let class = class_of(peek.size());
            let second = self.locks.lock_second(held, class);

            let footer = unsafe { block.prev_footer_tag() };
            let mergeable = !footer.is_end() && !footer.allocated();
            if mergeable && class_of(footer.size()) == class {
                let prev = unsafe { block.prev(footer.size()) };
                // Safety: `second` holds the neighbor's slot;
                // `remove_checked` compares offsets only, so a stale
                // `prev` address merely misses.
                if unsafe { self.lists[class].remove_checked(&self.arena, prev) } {
                    debug_assert_eq!(unsafe { prev.size_words() }, footer.size());
                    let grown = footer.size() + OVERHEAD + unsafe { block.size_words() };
                    unsafe { prev.set_tags(grown, false) };
                    drop(second);
                    trace!("backward merge -> {grown} words");
                    return prev;
                }
                return block;
            }
            drop(second);
            if mergeable {
                continue;
            }
            return block;
        }
    }
}
