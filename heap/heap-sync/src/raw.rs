use crate::RawLock;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// How far the spin backoff is allowed to grow.
///
/// Class locks guard a handful of word writes, so a waiter rarely loops
/// more than once; the cap only matters when many threads pile onto one
/// size class at once.
const BACKOFF_LIMIT: u32 = 64;

/// Unfair compare-and-swap spinlock with exponential backoff.
///
/// Acquisition attempts a single CAS; on failure the waiter watches the
/// flag with plain loads, pausing in exponentially growing bursts between
/// looks, so the cache line is written only when it might actually be
/// free. Late arrivals can overtake long-standing waiters; use
/// [`RawTicket`] when arrival order matters.
///
/// # Examples
///
/// ```
/// use heap_sync::RawSpin;
///
/// let lock = RawSpin::new();
/// lock.lock();
/// // critical section
/// unsafe { lock.unlock() };
/// ```
pub struct RawSpin {
    /// `true` while some thread holds the lock.
    held: AtomicBool,
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpin {
    /// Creates the lock in the released state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Spins until the lock is acquired.
    ///
    /// Never yields to the scheduler; keep the protected section short.
    #[inline]
    pub fn lock(&self) {
        let mut backoff = 1_u32;
        loop {
            if self.try_lock() {
                return;
            }
            while self.held.load(Ordering::Relaxed) {
                for _ in 0..backoff {
                    spin_loop();
                }
                if backoff < BACKOFF_LIMIT {
                    backoff <<= 1;
                }
            }
        }
    }

    /// Single acquisition attempt; `true` if the lock is now held.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Whether any thread currently holds the lock.
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock via a prior [`lock`](Self::lock) or
    /// successful [`try_lock`](Self::try_lock).
    #[inline]
    pub unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl RawLock for RawSpin {
    #[inline]
    fn raw_lock(&self) {
        self.lock();
    }

    #[inline]
    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }

    #[inline]
    fn raw_is_held(&self) -> bool {
        self.is_held()
    }

    #[inline]
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}

/// Fair FIFO ticket lock with queue-proportional backoff.
///
/// Arrivals draw a ticket and wait until it is served, so the lock is
/// granted strictly in arrival order and no thread starves under
/// contention. While waiting, a thread pauses in proportion to its
/// distance from the head of the queue, keeping far-back waiters off the
/// serving counter's cache line.
///
/// Heaps whose threads hammer one size class can be instantiated over
/// this type instead of [`RawSpin`] to trade throughput for fairness.
///
/// # Examples
///
/// ```
/// use heap_sync::RawTicket;
///
/// let lock = RawTicket::new();
/// lock.lock();
/// unsafe { lock.unlock() };
/// ```
pub struct RawTicket {
    /// Next ticket to hand out.
    next_ticket: AtomicU32,
    /// Ticket currently allowed into the critical section.
    now_serving: AtomicU32,
}

impl Default for RawTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl RawTicket {
    /// Creates the lock in the released state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
        }
    }

    /// Draws a ticket and spins until it is served.
    #[inline]
    pub fn lock(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        loop {
            let serving = self.now_serving.load(Ordering::Acquire);
            if serving == ticket {
                return;
            }
            // Pause proportionally to our place in the queue.
            for _ in 0..ticket.wrapping_sub(serving) {
                spin_loop();
            }
        }
    }

    /// Attempts to take the lock without queuing.
    ///
    /// Succeeds only when nobody holds a ticket ahead of us, so fairness
    /// is preserved: a `try_lock` can never jump past a waiter.
    #[inline]
    pub fn try_lock(&self) -> bool {
        let serving = self.now_serving.load(Ordering::Relaxed);
        self.next_ticket
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Whether any ticket is currently being served.
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        let serving = self.now_serving.load(Ordering::Relaxed);
        self.next_ticket.load(Ordering::Relaxed) != serving
    }

    /// Serves the next ticket.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock via a prior [`lock`](Self::lock) or
    /// successful [`try_lock`](Self::try_lock).
    #[inline]
    pub unsafe fn unlock(&self) {
        self.now_serving.fetch_add(1, Ordering::Release);
    }
}

impl RawLock for RawTicket {
    #[inline]
    fn raw_lock(&self) {
        self.lock();
    }

    #[inline]
    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }

    #[inline]
    fn raw_is_held(&self) -> bool {
        self.is_held()
    }

    #[inline]
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}
