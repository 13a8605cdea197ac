//! # Block Layout
//!
//! Every block is a header, a payload and a footer, laid out back to back:
//!
//! ```text
//! +----------+----------+------------------------+----------+
//! | tag word | link word|    payload (size * 4)  | tag word |
//! +----------+----------+------------------------+----------+
//! ^ header (2 words)                             ^ footer (1 word)
//! ```
//!
//! Header and footer carry the same [`TagWord`]; the duplicate in the
//! footer is what lets a block find its *predecessor* in O(1) (read the
//! word just before your header, and it tells you how far back the
//! predecessor starts). The link word holds the arena-relative byte offset
//! of the next block in the same free list, `0` meaning "not linked".
//!
//! A raw tag word of zero is the end-of-heap sentinel: the uninitialized
//! tail of the arena reads as zero, so a forward walk stops at the
//! high-water mark without any extra bookkeeping.
//!
//! All metadata accesses go through `AtomicU32`. Coalescing peeks at a
//! neighbor's tags *before* taking the neighbor's class lock to learn which
//! lock that is; those speculative reads race with the neighbor's owner and
//! must not tear.

use crate::config::WORD_SIZE;
use bitfield_struct::bitfield;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

/// Words occupied by a block header (tag word plus link word).
pub const HEADER_WORDS: usize = 2;

/// Words occupied by a block footer (tag word).
pub const FOOTER_WORDS: usize = 1;

/// Metadata words per block.
pub const OVERHEAD_WORDS: usize = HEADER_WORDS + FOOTER_WORDS;

/// Packed boundary-tag word shared by header and footer.
///
/// Bit 31 is the allocation flag; the remaining 31 bits hold the payload
/// length in words, which comfortably covers a 1 GiB arena.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TagWord {
    /// Payload length in words, excluding header and footer.
    #[bits(31)]
    pub size: u32,
    /// Whether the block is currently handed out.
    pub allocated: bool,
}

impl TagWord {
    /// A zero tag marks the uninitialized tail; real blocks always have a
    /// payload of at least one word.
    #[must_use]
    pub const fn is_end(self) -> bool {
        self.into_bits() == 0
    }
}

/// Handle to a block, addressed by its header.
///
/// This is a bare pointer with navigation arithmetic attached; it carries
/// no ownership or validity of its own. Every method is unsafe: the handle
/// must point at a header inside the owning arena, and writes additionally
/// require the caller to own the block under the locking discipline (the
/// block is unlinked and being operated on, or its class lock is held).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    hdr: *mut u32,
}

impl Block {
    pub(crate) const fn from_header_ptr(hdr: *mut u32) -> Self {
        Self { hdr }
    }

    /// Address of the header.
    #[must_use]
    pub const fn addr(self) -> *mut u32 {
        self.hdr
    }

    /// Recovers the block from a payload pointer handed out by `allocate`.
    ///
    /// # Safety
    ///
    /// `payload` must be a payload pointer previously produced by this
    /// layout (i.e. it sits exactly one header past a live block header).
    #[must_use]
    pub unsafe fn from_payload(payload: *mut u8) -> Self {
        Self {
            hdr: unsafe { payload.cast::<u32>().sub(HEADER_WORDS) },
        }
    }

    /// Atomic load of the word at `index` words past the header.
    ///
    /// # Safety
    ///
    /// The addressed word must lie inside the arena.
    unsafe fn load(self, index: isize) -> u32 {
        unsafe { (*self.hdr.offset(index).cast::<AtomicU32>()).load(Ordering::Acquire) }
    }

    /// Atomic store to the word at `index` words past the header.
    ///
    /// # Safety
    ///
    /// The addressed word must lie inside the arena and be owned by the
    /// caller per the locking discipline.
    unsafe fn store(self, index: isize, value: u32) {
        unsafe { (*self.hdr.offset(index).cast::<AtomicU32>()).store(value, Ordering::Release) }
    }

    /// Reads the header tag.
    ///
    /// # Safety
    ///
    /// The header word must lie inside the arena. The value is only stable
    /// if the caller owns the block or holds its class lock; otherwise it
    /// is a speculative snapshot.
    #[must_use]
    pub unsafe fn tag(self) -> TagWord {
        TagWord::from_bits(unsafe { self.load(0) })
    }

    /// Payload length in words.
    ///
    /// # Safety
    ///
    /// As for [`tag`](Self::tag).
    #[must_use]
    pub unsafe fn size_words(self) -> u32 {
        unsafe { self.tag() }.size()
    }

    /// Whether the block is marked allocated.
    ///
    /// # Safety
    ///
    /// As for [`tag`](Self::tag).
    #[must_use]
    pub unsafe fn is_allocated(self) -> bool {
        unsafe { self.tag() }.allocated()
    }

    /// Writes matching header and footer tags for a payload of `size`
    /// words.
    ///
    /// The footer goes first: concurrent walkers key on the header word,
    /// so the footer is already consistent by the time the header makes
    /// the block visible at its new size.
    ///
    /// # Safety
    ///
    /// The caller must own the block, and `size` must describe memory the
    /// caller owns through to the footer position.
    pub unsafe fn set_tags(self, size: u32, allocated: bool) {
        let tag = TagWord::new()
            .with_size(size)
            .with_allocated(allocated)
            .into_bits();
        #[allow(clippy::cast_possible_wrap)]
        let footer = (HEADER_WORDS + size as usize) as isize;
        unsafe {
            self.store(footer, tag);
            self.store(0, tag);
        }
    }

    /// Reads the free-list link (arena-relative byte offset; 0 = unlinked).
    ///
    /// # Safety
    ///
    /// The caller must hold the class lock of the list this block is (or
    /// may be) linked into, or own the block.
    #[must_use]
    pub unsafe fn next_offset(self) -> u32 {
        unsafe { self.load(1) }
    }

    /// Writes the free-list link.
    ///
    /// # Safety
    ///
    /// As for [`next_offset`](Self::next_offset), but exclusive.
    pub unsafe fn set_next_offset(self, offset: u32) {
        unsafe { self.store(1, offset) };
    }

    /// Reads the footer tag of this block.
    ///
    /// # Safety
    ///
    /// As for [`tag`](Self::tag).
    #[must_use]
    pub unsafe fn footer_tag(self) -> TagWord {
        let size = unsafe { self.size_words() } as usize;
        #[allow(clippy::cast_possible_wrap)]
        let footer = (HEADER_WORDS + size) as isize;
        TagWord::from_bits(unsafe { self.load(footer) })
    }

    /// Reads the footer tag of the block immediately before this one.
    ///
    /// # Safety
    ///
    /// There must be a block before this one (this block must not be the
    /// first in the arena). The read is speculative unless the caller holds
    /// the predecessor's class lock.
    #[must_use]
    pub unsafe fn prev_footer_tag(self) -> TagWord {
        TagWord::from_bits(unsafe { self.load(-1) })
    }

    /// The block immediately after this one in address order.
    ///
    /// # Safety
    ///
    /// This block's size must be current (caller owns it or holds its
    /// lock); the successor position must lie inside the arena, which the
    /// sentinel margin guarantees for any live block.
    #[must_use]
    pub unsafe fn next(self) -> Self {
        let size = unsafe { self.size_words() } as usize;
        Self {
            hdr: unsafe { self.hdr.add(HEADER_WORDS + size + FOOTER_WORDS) },
        }
    }

    /// The block immediately before this one, whose payload length is
    /// `prev_size` words (as read from its footer).
    ///
    /// # Safety
    ///
    /// `prev_size` must be the true size of the predecessor, and a
    /// predecessor must exist.
    #[must_use]
    pub unsafe fn prev(self, prev_size: u32) -> Self {
        Self {
            hdr: unsafe {
                self.hdr
                    .sub(FOOTER_WORDS + prev_size as usize + HEADER_WORDS)
            },
        }
    }

    /// Pointer to the first payload byte.
    ///
    /// # Safety
    ///
    /// The block must be live inside the arena.
    #[must_use]
    pub unsafe fn payload(self) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(self.hdr.add(HEADER_WORDS).cast::<u8>()) }
    }
}

/// Bytes of overhead per block; payload pointers of consecutive blocks
/// differ by the payload size plus this.
#[must_use]
pub const fn overhead_bytes() -> usize {
    OVERHEAD_WORDS * WORD_SIZE
}
