//! Sequential allocator behavior: block placement, reuse, splitting and
//! coalescing arithmetic, boundary cases. Every test finishes with a full
//! structural audit of the heap.

use heap_alloc::block::Block;
use heap_alloc::debug;
use heap_alloc::error::AllocError;
use heap_alloc::heap::Heap;
use std::ops::{Deref, DerefMut};

/// A heap over an owned zeroed buffer.
struct TestHeap {
    heap: Heap,
    _backing: Box<[u64]>,
}

impl Deref for TestHeap {
    type Target = Heap;
    fn deref(&self) -> &Heap {
        &self.heap
    }
}

impl DerefMut for TestHeap {
    fn deref_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }
}

fn new_heap(bytes: usize) -> TestHeap {
    let mut backing = vec![0_u64; bytes.div_ceil(8)].into_boxed_slice();
    let heap = unsafe { Heap::new(backing.as_mut_ptr().cast::<u8>(), bytes) };
    TestHeap {
        heap,
        _backing: backing,
    }
}

fn header(p: *mut u8) -> Block {
    unsafe { Block::from_payload(p) }
}

#[test]
fn multiple_allocations_are_adjacent() {
    let mut th = new_heap(1 << 20);
    let p1 = th.allocate(40).unwrap().as_ptr();
    let p2 = th.allocate(80).unwrap().as_ptr();
    let p3 = th.allocate(120).unwrap().as_ptr();

    assert!(p2 > p1 && p3 > p2);
    // Consecutive payloads differ by payload + header (8) + footer (4).
    assert_eq!(p2 as usize - p1 as usize, 40 + 8 + 4);
    assert_eq!(p3 as usize - p2 as usize, 80 + 8 + 4);

    let stats = debug::check_coalesced(&mut th).unwrap();
    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.free_blocks, 0);
}

#[test]
fn sequential_allocations_of_equal_size() {
    let mut th = new_heap(1 << 20);
    let s = 100_u32; // a whole number of words
    let p1 = th.allocate(s).unwrap().as_ptr();
    let p2 = th.allocate(s).unwrap().as_ptr();
    assert_eq!(p2 as usize - p1 as usize, s as usize + 8 + 4);
    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn free_and_reuse() {
    let mut th = new_heap(1 << 20);
    let p1 = th.allocate(40).unwrap().as_ptr();
    let p2 = th.allocate(80).unwrap().as_ptr();
    let p3 = th.allocate(120).unwrap().as_ptr();
    let _ = (p1, p3);

    unsafe { th.deallocate(p2) };
    assert!(!unsafe { header(p2).is_allocated() });

    // The freed 20-word block is the first fit for a 15-word request.
    let p4 = th.allocate(60).unwrap().as_ptr();
    assert_eq!(p4, p2);
    assert!(unsafe { header(p2).is_allocated() });

    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn forward_coalesce() {
    let mut th = new_heap(1 << 20);
    let _p1 = th.allocate(40).unwrap().as_ptr();
    let p2 = th.allocate(80).unwrap().as_ptr();
    let p3 = th.allocate(120).unwrap().as_ptr();

    unsafe { th.deallocate(p2) };
    unsafe { th.deallocate(p3) };

    // 20 + 30 payload words plus the 3-word overhead of the swallowed tag.
    let h2 = header(p2);
    assert_eq!(unsafe { h2.size_words() }, 53);
    assert!(!unsafe { h2.is_allocated() });

    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn backward_coalesce() {
    let mut th = new_heap(1 << 20);
    let p1 = th.allocate(40).unwrap().as_ptr();
    let p2 = th.allocate(80).unwrap().as_ptr();
    let _p3 = th.allocate(120).unwrap().as_ptr();

    unsafe { th.deallocate(p2) };
    unsafe { th.deallocate(p1) };

    let h1 = header(p1);
    assert_eq!(unsafe { h1.size_words() }, 33);
    assert!(!unsafe { h1.is_allocated() });

    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn full_coalesce() {
    let mut th = new_heap(1 << 20);
    let p1 = th.allocate(40).unwrap().as_ptr();
    let p2 = th.allocate(80).unwrap().as_ptr();
    let p3 = th.allocate(120).unwrap().as_ptr();
    let _p4 = th.allocate(160).unwrap().as_ptr();

    unsafe { th.deallocate(p1) };
    unsafe { th.deallocate(p2) };
    unsafe { th.deallocate(p3) };

    // 10 + 20 + 30 payload words plus two swallowed 3-word overheads.
    let h1 = header(p1);
    assert_eq!(unsafe { h1.size_words() }, 66);
    assert!(!unsafe { h1.is_allocated() });

    let stats = debug::check_coalesced(&mut th).unwrap();
    assert_eq!(stats.free_blocks, 1);
}

#[test]
fn splitting_leaves_a_free_remainder() {
    let mut th = new_heap(1 << 20);
    let p = th.allocate(400).unwrap().as_ptr();
    unsafe { th.deallocate(p) };

    let q = th.allocate(40).unwrap().as_ptr();
    assert_eq!(q, p);

    let hq = header(q);
    assert_eq!(unsafe { hq.size_words() }, 10);

    let remainder = unsafe { hq.next() };
    assert_eq!(unsafe { remainder.size_words() }, 100 - 10 - 3);
    assert!(!unsafe { remainder.is_allocated() });

    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn no_split_below_one_payload_word() {
    let mut th = new_heap(1 << 20);
    // A freed 10-word block cannot be split for a 7-word request (the
    // remainder would be zero-sized), so the whole block is taken.
    let p = th.allocate(40).unwrap().as_ptr();
    let _guard = th.allocate(16).unwrap().as_ptr();
    unsafe { th.deallocate(p) };

    let q = th.allocate(28).unwrap().as_ptr();
    assert_eq!(q, p);
    assert_eq!(unsafe { header(q).size_words() }, 10);

    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn write_and_read_payload() {
    let mut th = new_heap(1 << 20);
    let p = th.allocate(20).unwrap().as_ptr();

    let msg = b"Hello, Allocator!";
    unsafe {
        core::ptr::copy_nonoverlapping(msg.as_ptr(), p, msg.len());
    }
    let got = unsafe { core::slice::from_raw_parts(p, msg.len()) };
    assert_eq!(got, msg);

    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn footer_matches_header() {
    let mut th = new_heap(1 << 20);
    let p = th.allocate(80).unwrap().as_ptr();

    let h = header(p);
    assert_eq!(unsafe { h.tag() }, unsafe { h.footer_tag() });

    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn zero_byte_request_gets_one_word() {
    let mut th = new_heap(1 << 20);
    let p = th.allocate(0).unwrap().as_ptr();
    assert_eq!(unsafe { header(p).size_words() }, 1);
    unsafe { p.write(0xAB) };
    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn null_deallocate_is_a_noop() {
    let mut th = new_heap(1 << 16);
    unsafe { th.deallocate(core::ptr::null_mut()) };
    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn oversized_request_reports_out_of_memory() {
    let mut th = new_heap(4096);
    assert_eq!(th.allocate(1 << 20), Err(AllocError::OutOfMemory));

    // The failure left nothing behind; normal requests still work.
    let stats = debug::check_coalesced(&mut th).unwrap();
    assert_eq!(stats.blocks, 0);
    assert!(th.allocate(64).is_ok());
    debug::check_coalesced(&mut th).unwrap();
}

#[test]
fn exhaustion_and_full_recovery() {
    let mut th = new_heap(4096);

    let mut held = Vec::new();
    loop {
        match th.allocate(128) {
            Ok(p) => held.push(p.as_ptr()),
            Err(AllocError::OutOfMemory) => break,
        }
    }
    assert!(!held.is_empty());

    // Freeing everything in order coalesces the arena back into one block.
    for p in &held {
        unsafe { th.deallocate(*p) };
    }
    let stats = debug::check_coalesced(&mut th).unwrap();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.blocks, 1);

    // And that block is reusable.
    assert!(th.allocate(128).is_ok());
    debug::check_coalesced(&mut th).unwrap();
}
