use crate::RawLock;
use core::array;

/// A fixed bank of `N` raw locks addressed by index, carrying the
/// acquisition discipline the heap's size-class locks live by.
///
/// A thread holding slot `h` may take a second slot `t` directly only
/// when `t >= h` (indexes are acquired in ascending order). For `t < h`,
/// [`lock_second`](Self::lock_second) releases `h`, takes `t`, then
/// retakes `h`, so the pair is still acquired ascending and two threads
/// crossing in opposite directions cannot deadlock. The price of the
/// detour is staleness: anything read under `h` before the call may have
/// changed by the time `h` is held again, and the caller must reread it.
///
/// Single-slot sections can use [`guard`](Self::guard) for scoped
/// release; the merge protocol, which interleaves releases across slots,
/// uses [`lock`](Self::lock)/[`unlock`](Self::unlock) directly.
///
/// # Examples
///
/// ```
/// use heap_sync::{LockBank, RawSpin};
///
/// let bank: LockBank<RawSpin, 4> = LockBank::new();
/// {
///     let _slot = bank.guard(2);
///     // slot 2 held for this scope
/// }
/// bank.lock(1);
/// let second = bank.lock_second(1, 3); // ascending: direct
/// assert!(!second.reacquired());
/// drop(second); // releases slot 3
/// unsafe { bank.unlock(1) };
/// ```
pub struct LockBank<R, const N: usize> {
    slots: [R; N],
}

impl<R: RawLock + Default, const N: usize> Default for LockBank<R, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawLock + Default, const N: usize> LockBank<R, N> {
    /// A bank of `N` released locks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: array::from_fn(|_| R::default()),
        }
    }
}

impl<R: RawLock, const N: usize> LockBank<R, N> {
    /// Acquires slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    pub fn lock(&self, index: usize) {
        self.slots[index].raw_lock();
    }

    /// Releases slot `index`.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the slot.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    pub unsafe fn unlock(&self, index: usize) {
        debug_assert!(
            self.slots[index].raw_is_held(),
            "released bank slot {index}, which nobody holds"
        );
        unsafe { self.slots[index].raw_unlock() }
    }

    /// Whether slot `index` is currently held by some thread.
    ///
    /// Racy by nature; useful for assertions, not decisions.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    #[must_use]
    pub fn is_locked(&self, index: usize) -> bool {
        self.slots[index].raw_is_held()
    }

    /// Acquires slot `index` for the returned guard's scope.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    pub fn guard(&self, index: usize) -> BankGuard<'_, R, N> {
        self.lock(index);
        BankGuard { bank: self, index }
    }

    /// Acquires `target` while `held` stays held, per the ascending-index
    /// rule. The returned guard releases `target` on drop (a no-op when
    /// `target == held`); `held` remains held either way.
    ///
    /// When `target < held` the pair is taken via release-and-reacquire
    /// and [`SecondGuard::reacquired`] reports `true`: state read under
    /// `held` before this call is stale and must be reread.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range. The calling thread must
    /// hold `held` (debug-asserted).
    pub fn lock_second(&self, held: usize, target: usize) -> SecondGuard<'_, R, N> {
        use core::cmp::Ordering;
        debug_assert!(
            self.slots[held].raw_is_held(),
            "second acquisition without holding slot {held}"
        );
        let reacquired = match target.cmp(&held) {
            Ordering::Equal => false,
            Ordering::Greater => {
                self.lock(target);
                false
            }
            Ordering::Less => {
                // Get back in ascending order: give up the higher slot,
                // take the lower, then queue for the higher again.
                // Safety: the caller holds `held` per this function's
                // contract.
                unsafe { self.unlock(held) };
                self.lock(target);
                self.lock(held);
                true
            }
        };
        SecondGuard {
            bank: self,
            held,
            target,
            reacquired,
        }
    }
}

/// Scoped hold of one bank slot; releases it on drop.
pub struct BankGuard<'bank, R: RawLock, const N: usize> {
    bank: &'bank LockBank<R, N>,
    index: usize,
}

impl<R: RawLock, const N: usize> Drop for BankGuard<'_, R, N> {
    fn drop(&mut self) {
        // Safety: constructing the guard acquired the slot.
        unsafe { self.bank.unlock(self.index) }
    }
}

/// Hold of a second bank slot next to an already-held one; releases the
/// second slot on drop and leaves the first held.
pub struct SecondGuard<'bank, R: RawLock, const N: usize> {
    bank: &'bank LockBank<R, N>,
    held: usize,
    target: usize,
    reacquired: bool,
}

impl<R: RawLock, const N: usize> SecondGuard<'_, R, N> {
    /// Whether the first slot was released and retaken on the way here.
    /// If so, anything read under it before the acquisition is stale.
    #[must_use]
    pub fn reacquired(&self) -> bool {
        self.reacquired
    }
}

impl<R: RawLock, const N: usize> Drop for SecondGuard<'_, R, N> {
    fn drop(&mut self) {
        if self.target != self.held {
            // Safety: constructing the guard acquired the target slot.
            unsafe { self.bank.unlock(self.target) }
        }
    }
}
