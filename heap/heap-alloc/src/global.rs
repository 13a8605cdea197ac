//! # Process-Wide Heap
//!
//! One [`Heap`] over a statically reserved arena, set up once and shared
//! by every thread. The backing storage is a zeroed static, so untouched
//! pages cost nothing until first use and the zero-tail contract of
//! [`Heap::new`] holds for free.

use crate::config::ARENA_BYTES;
use crate::debug;
use crate::error::AllocError;
use crate::heap::Heap;
use core::ptr::NonNull;
use heap_sync::SyncOnceCell;

/// Backing storage, aligned generously for the header words and common
/// payload types.
#[repr(align(16))]
struct ArenaMem([u8; ARENA_BYTES]);

static mut ARENA: ArenaMem = ArenaMem([0; ARENA_BYTES]);

static HEAP: SyncOnceCell<Heap> = SyncOnceCell::new();

/// Installs the process-wide heap.
///
/// Must run before [`allocate`]/[`deallocate`]. Concurrent and repeated
/// calls are fine; exactly one arena setup wins and the rest observe it.
pub fn init() {
    let _ = HEAP.get_or_init(|| {
        // Safety: ARENA is static, zero-initialized, 16-byte aligned, and
        // the once cell guarantees it is handed to exactly one heap.
        unsafe { Heap::new((&raw mut ARENA.0).cast::<u8>(), ARENA_BYTES) }
    });
}

fn heap() -> &'static Heap {
    HEAP.get().expect("heap not initialized; call init() first")
}

/// [`Heap::allocate`] against the process-wide heap.
///
/// # Errors
///
/// [`AllocError::OutOfMemory`] when the arena is exhausted.
///
/// # Panics
///
/// Panics if [`init`] has not run.
pub fn allocate(bytes: u32) -> Result<NonNull<u8>, AllocError> {
    heap().allocate(bytes)
}

/// [`Heap::deallocate`] against the process-wide heap.
///
/// # Safety
///
/// `ptr` must be null or a live pointer from [`allocate`].
///
/// # Panics
///
/// Panics if [`init`] has not run.
pub unsafe fn deallocate(ptr: *mut u8) {
    unsafe { heap().deallocate(ptr) }
}

/// Debug walk of the process-wide heap (see [`debug::show`]).
///
/// # Panics
///
/// Panics if [`init`] has not run.
pub fn show() {
    debug::show(heap());
}
