use crate::raw::RawSpin;
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, Ordering};

/// One-time initialization cell, built on [`RawSpin`].
///
/// The first caller to take the init lock runs the initializer and
/// publishes the value through the `ready` flag; callers racing it block
/// on the lock and find the value already there when they get in. Reads
/// after publication never touch the lock. The process-wide heap lives in
/// one of these: many threads may race its setup, but exactly one arena
/// wiring must run.
///
/// If the initializer panics it dies holding the init lock and every
/// later caller blocks forever, so initializers must not panic.
///
/// # Examples
///
/// ```
/// use heap_sync::SyncOnceCell;
///
/// static CELL: SyncOnceCell<u32> = SyncOnceCell::new();
///
/// assert!(CELL.get().is_none());
/// let v = CELL.get_or_init(|| 42);
/// assert_eq!(*v, 42);
/// assert_eq!(CELL.get(), Some(&42));
/// ```
pub struct SyncOnceCell<T> {
    /// Set (with release ordering) once `value` is written.
    ready: AtomicBool,
    /// Serializes initializers; never held after publication.
    init: RawSpin,
    value: UnsafeCell<MaybeUninit<T>>,
}

// Safety: the value is written once, before `ready` is set, and only
// shared afterwards.
unsafe impl<T: Sync> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    /// Creates an empty cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            init: RawSpin::new(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns the value if it has been published.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.ready.load(Ordering::Acquire) {
            // Safety: `ready` is set only after the value is written.
            Some(unsafe { &*(*self.value.get()).as_ptr() })
        } else {
            None
        }
    }

    /// Returns the value, running `init` first if the cell is empty.
    ///
    /// Exactly one caller runs `init`; callers racing it block on the
    /// init lock until the value is published, then all observe the same
    /// reference.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }

        self.init.lock();
        // Somebody may have initialized while we queued for the lock.
        if !self.ready.load(Ordering::Acquire) {
            let value = init();
            unsafe {
                (*self.value.get()).write(value);
            }
            // Publish the write before anyone can skip the lock.
            self.ready.store(true, Ordering::Release);
        }
        // Safety: this thread took the init lock after a successful
        // `lock` above.
        unsafe { self.init.unlock() };

        // Safety: `ready` is true and stays true.
        unsafe { &*(*self.value.get()).as_ptr() }
    }
}
