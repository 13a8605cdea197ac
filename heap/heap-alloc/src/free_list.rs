//! # Segregated Free Lists
//!
//! One singly-linked, unordered LIFO per size class, rooted in a head
//! offset. The lock protecting each list lives in the heap's class lock
//! bank, not here: coalescing needs to juggle several class locks at
//! once, so the list itself is just the data and every operation states
//! "the class's bank slot is held" as its precondition. Links live
//! inside the free blocks themselves (the header's link word), stored as
//! arena-relative byte offsets so the whole structure survives a
//! relocation of the arena.
//!
//! Insertion and head removal are O(1); the common pattern of freeing and
//! promptly reallocating in the same class touches only the head.
//! [`remove_checked`](FreeList::remove_checked) is a linear scan, paid
//! only during coalescing, and doubles as the merge-once discipline: a
//! block that some other thread already unlinked is simply not found, and
//! the caller skips the merge.

use crate::arena::Arena;
use crate::block::Block;
use core::cell::UnsafeCell;

/// A single class's list head.
///
/// Only read or written while the class's slot in the heap's lock bank is
/// held (or while the owning heap is borrowed exclusively, which proves
/// no other user exists).
pub(crate) struct FreeList {
    /// Byte offset of the first free block's header; 0 = empty list.
    head: UnsafeCell<u32>,
}

impl Default for FreeList {
    fn default() -> Self {
        Self {
            head: UnsafeCell::new(0),
        }
    }
}

impl FreeList {
    /// Reads the head offset.
    ///
    /// # Safety
    ///
    /// The caller must hold this class's bank slot or have exclusive
    /// access to the heap.
    pub(crate) unsafe fn head(&self) -> u32 {
        unsafe { *self.head.get() }
    }

    unsafe fn set_head(&self, offset: u32) {
        unsafe { *self.head.get() = offset }
    }

    /// Links `block` in at the head.
    ///
    /// # Safety
    ///
    /// Bank slot held; `block` is an owned free block of this class, not
    /// currently in any list.
    pub(crate) unsafe fn push<R>(&self, arena: &Arena<R>, block: Block) {
        unsafe {
            block.set_next_offset(self.head());
            self.set_head(arena.offset_of(block));
        }
    }

    /// Unlinks and returns the head block, if any.
    ///
    /// # Safety
    ///
    /// Bank slot held.
    pub(crate) unsafe fn pop_head<R>(&self, arena: &Arena<R>) -> Option<Block> {
        let offset = unsafe { self.head() };
        if offset == 0 {
            return None;
        }
        let block = unsafe { arena.block_at(offset) };
        unsafe {
            self.set_head(block.next_offset());
            block.set_next_offset(0);
        }
        Some(block)
    }

    /// Unlinks and returns the first block with at least `words` payload
    /// words. First fit; the list carries no ordering invariant.
    ///
    /// # Safety
    ///
    /// Bank slot held.
    pub(crate) unsafe fn pop_first_fit<R>(&self, arena: &Arena<R>, words: u32) -> Option<Block> {
        let mut prev: Option<Block> = None;
        let mut cursor = unsafe { self.head() };
        while cursor != 0 {
            let block = unsafe { arena.block_at(cursor) };
            if unsafe { block.size_words() } >= words {
                let next = unsafe { block.next_offset() };
                match prev {
                    None => unsafe { self.set_head(next) },
                    Some(p) => unsafe { p.set_next_offset(next) },
                }
                unsafe { block.set_next_offset(0) };
                return Some(block);
            }
            prev = Some(block);
            cursor = unsafe { block.next_offset() };
        }
        None
    }

    /// Unlinks `target` if it is in this list; returns whether it was.
    ///
    /// Matches purely by offset and never dereferences `target` before a
    /// match is found, so callers may pass an address computed from a
    /// speculative neighbor read: if the neighbor changed meanwhile, the
    /// scan just fails.
    ///
    /// # Safety
    ///
    /// Bank slot held.
    pub(crate) unsafe fn remove_checked<R>(&self, arena: &Arena<R>, target: Block) -> bool {
        let wanted = arena.offset_of(target);
        let mut cursor = unsafe { self.head() };
        if cursor == wanted {
            unsafe {
                self.set_head(target.next_offset());
                target.set_next_offset(0);
            }
            return true;
        }
        while cursor != 0 {
            let block = unsafe { arena.block_at(cursor) };
            let next = unsafe { block.next_offset() };
            if next == wanted {
                unsafe {
                    block.set_next_offset(target.next_offset());
                    target.set_next_offset(0);
                }
                return true;
            }
            cursor = next;
        }
        false
    }
}
