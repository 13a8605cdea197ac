//! # Allocator Configuration
//!
//! Every knob is a compile-time constant; there is no runtime or
//! environment configuration. Sizes and offsets throughout the crate are
//! measured in machine words of [`WORD_SIZE`] bytes.

/// Machine word size in bytes. Payload sizes, class limits and block
/// overheads are all counted in these units, and returned payloads are
/// aligned to this.
pub const WORD_SIZE: usize = 4;

/// Capacity of the process-wide arena in bytes.
pub const ARENA_BYTES: usize = 1 << 30; // 1 GiB

/// Words kept clear between the high-water mark and the end of the arena so
/// the zero header that terminates a forward walk is always readable.
pub const SENTINEL_MARGIN_WORDS: usize = 2;

/// Number of segregated size classes.
pub const NUM_SIZE_CLASSES: usize = 8;

/// Inclusive upper bound, in payload words, of each size class. The last
/// entry is effectively unbounded and catches everything else.
pub const SIZE_CLASS_LIMITS: [u32; NUM_SIZE_CLASSES] = [8, 16, 32, 64, 128, 256, 512, u32::MAX];

/// Blocks a thread cache may hold per size class. Refill and flush move
/// half of this per batch.
pub const THREAD_CACHE_CAPACITY: usize = 64;

const _: () = {
    assert!(WORD_SIZE == size_of::<u32>());
    assert!(ARENA_BYTES % WORD_SIZE == 0);
    assert!(ARENA_BYTES / WORD_SIZE > SENTINEL_MARGIN_WORDS);
    assert!(THREAD_CACHE_CAPACITY % 2 == 0);
    // Class limits must be strictly increasing for `class_of` to be total.
    let mut i = 1;
    while i < NUM_SIZE_CLASSES {
        assert!(SIZE_CLASS_LIMITS[i - 1] < SIZE_CLASS_LIMITS[i]);
        i += 1;
    }
};
