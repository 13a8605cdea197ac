//! Boundary-tag packing and block navigation.

use heap_alloc::block::{Block, TagWord, overhead_bytes};
use heap_alloc::debug;
use heap_alloc::heap::Heap;

#[test]
fn tag_word_packs_size_and_flag() {
    let tag = TagWord::new().with_size(1234).with_allocated(true);
    assert_eq!(tag.size(), 1234);
    assert!(tag.allocated());

    let raw = tag.into_bits();
    let back = TagWord::from_bits(raw);
    assert_eq!(back, tag);

    // The flag lives outside the size bits.
    assert_eq!(tag.with_allocated(false).size(), 1234);
}

#[test]
fn zero_word_is_the_sentinel() {
    assert!(TagWord::from_bits(0).is_end());
    assert!(!TagWord::new().with_size(1).is_end());
}

#[test]
fn three_word_overhead() {
    assert_eq!(overhead_bytes(), 12);
}

#[test]
fn navigation_between_neighbors() {
    let mut backing = vec![0_u64; 8192];
    let heap: Heap = unsafe { Heap::new(backing.as_mut_ptr().cast::<u8>(), 8192 * 8) };

    let p1 = heap.allocate(40).unwrap().as_ptr();
    let p2 = heap.allocate(80).unwrap().as_ptr();

    let b1 = unsafe { Block::from_payload(p1) };
    let b2 = unsafe { Block::from_payload(p2) };

    // Forward: past b1's footer lands on b2's header.
    assert_eq!(unsafe { b1.next() }, b2);

    // Backward: b2 reads b1's footer and rewinds to b1's header.
    let footer = unsafe { b2.prev_footer_tag() };
    assert_eq!(footer.size(), 10);
    assert!(footer.allocated());
    assert_eq!(unsafe { b2.prev(footer.size()) }, b1);

    // The footer mirrors the header.
    assert_eq!(unsafe { b1.footer_tag() }, unsafe { b1.tag() });
}

#[test]
fn payload_round_trip() {
    let mut backing = vec![0_u64; 4096];
    let mut heap: Heap = unsafe { Heap::new(backing.as_mut_ptr().cast::<u8>(), 4096 * 8) };

    let p = heap.allocate(64).unwrap().as_ptr();
    let block = unsafe { Block::from_payload(p) };
    assert_eq!(unsafe { block.payload() }.as_ptr(), p);
    assert!(heap.contains(p.cast_const()));

    unsafe { heap.deallocate(p) };
    debug::check_coalesced(&mut heap).unwrap();
}
