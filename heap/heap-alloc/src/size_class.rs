//! Size classes partition free blocks by payload size; each class owns one
//! free list and one lock.

use crate::config::{NUM_SIZE_CLASSES, SIZE_CLASS_LIMITS};

/// Index of the smallest class whose upper bound admits `words`.
#[must_use]
pub const fn class_of(words: u32) -> usize {
    let mut class = 0;
    while class + 1 < NUM_SIZE_CLASSES && words > SIZE_CLASS_LIMITS[class] {
        class += 1;
    }
    class
}
