//! # Concurrent Boundary-Tag Heap
//!
//! A dynamic memory allocator over a single fixed-size contiguous arena,
//! serving many threads at once. The design combines:
//!
//! * a **boundary-tag** block layout: every block carries its size and
//!   allocation state in a header *and* a footer, so both neighbors are
//!   reachable with O(1) arithmetic and freed blocks merge immediately;
//! * **segregated free lists**: eight singly-linked LIFO lists keyed by
//!   payload size class, each behind its own lock, so threads working in
//!   different classes never contend;
//! * an **arena tail**: unused capacity past the high-water mark reads as
//!   zero and doubles as the end-of-heap sentinel; fresh blocks are carved
//!   off it under a dedicated lock when the lists come up empty;
//! * an optional **thread cache**: a per-thread, per-class bounded stack
//!   that serves the hot allocate/free loop with no synchronization at
//!   all.
//!
//! ```text
//! ┌──────────────────────────── arena ─────────────────────────────┐
//! │pad│ block │ block │ block │ ... │ block │ 0 0 0 0 (tail) ...   │
//! └───┴───────┴───────┴───────┴─────┴───────┴──────────────────────┘
//!      ▲                                     ▲
//!      first block                           high-water mark
//!
//!   free lists (one per size class, offsets into the arena):
//!   class 0 (≤8 words)   ──> blk ──> blk ──> ∅
//!   class 1 (≤16 words)  ──> blk ──> ∅
//!   ...
//!   class 7 (unbounded)  ──> ∅
//! ```
//!
//! ## Concurrency model
//!
//! Plain parallel threads; blocking happens only on lock acquisition.
//! Every mutable field has exactly one lock responsible for it: block
//! metadata and list links belong to the lock of the class the block
//! currently sizes into, the high-water mark to the arena lock (never
//! held together with a class lock). Cross-class coalescing acquires
//! class locks in ascending index order, releasing and reacquiring when
//! the order would be violated; see [`heap`] for the protocol and
//! [`thread_cache`] for the cache's ownership rules.
//!
//! ## Entry points
//!
//! [`Heap`] is the self-contained allocator; [`ThreadCache`] wraps a
//! borrowed heap for one thread's traffic; [`global`] exposes the
//! classic process-wide triple `init`/`allocate`/`deallocate` over a
//! static arena; [`debug`] walks and audits a heap.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod arena;
pub mod block;
pub mod config;
pub mod debug;
pub mod error;
mod free_list;
pub mod global;
pub mod heap;
pub mod size_class;
pub mod thread_cache;

pub use error::{AllocError, CheckError};
pub use heap::Heap;
pub use thread_cache::ThreadCache;
