//! # Locking primitives for the heap
//!
//! The allocator's critical sections are a few word writes and a short
//! list walk, and its cross-class merge protocol acquires locks by index
//! in a sworn order, sometimes releasing a held lock to get back in line.
//! Scoped guards alone cannot express that, so everything here is built
//! over one *raw* lock trait ([`RawLock`]) with explicit acquire and
//! release:
//!
//! * [`RawSpin`] and [`RawTicket`]: the two lock flavors, unfair-and-lean
//!   versus FIFO-fair;
//! * [`LockBank`]: a fixed, index-addressed array of locks carrying the
//!   ordered-acquisition discipline the size classes need, plus scoped
//!   guards for the sections that do fit a scope;
//! * [`SyncOnceCell`]: one-time initialization for process-wide state,
//!   built on [`RawSpin`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod bank;
mod once;
mod raw;

pub use bank::{BankGuard, LockBank, SecondGuard};
pub use once::SyncOnceCell;
pub use raw::{RawSpin, RawTicket};

/// A raw mutual-exclusion primitive.
///
/// Unlike an owning mutex, a raw lock protects nothing by itself; callers
/// pair it with the data discipline of the code that holds it. Release is
/// a separate, unsafe operation precisely so protocols may unlock and
/// relock out of scope order.
pub trait RawLock {
    /// Blocks (spins) until the calling thread holds the lock.
    fn raw_lock(&self);

    /// Single acquisition attempt; `true` on success.
    fn raw_try_lock(&self) -> bool;

    /// Whether any thread currently holds the lock.
    ///
    /// Inherently racy for decision-making; meant for debug assertions
    /// about protocol state ("this slot must be held here").
    fn raw_is_held(&self) -> bool;

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock. Releasing a lock that is
    /// not held breaks mutual exclusion for every other user.
    unsafe fn raw_unlock(&self);
}
