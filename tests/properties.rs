//! Property tests for the invariants in spec §8 (P1-P4), using `proptest`
//! the way `exo_allocator`/`exo_text` do elsewhere in the pack.

use proptest::prelude::*;

use csopesy_emu::mem::alloc::Allocator;
use csopesy_emu::mem::backing_store::BackingStore;
use csopesy_emu::mem::pager::Pager;

const MEM_TOTAL: usize = 1024;

fn fresh_pager(mem_total: usize, frame_size: usize) -> Pager {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let store = BackingStore::open(tmp.path(), frame_size / 2).unwrap();
    Pager::new(mem_total, frame_size, store)
}

/// P1: block list always tiles `[0, MEM_TOTAL)` and has no two adjacent
/// free blocks, after any sequence of allocate/free calls.
fn check_p1(allocator: &Allocator, total: usize) {
    let blocks = allocator.blocks();
    assert_eq!(blocks[0].start, 0);
    let mut cursor = 0usize;
    for w in blocks {
        assert_eq!(w.start, cursor, "blocks must tile contiguously");
        cursor += w.size;
    }
    assert_eq!(cursor, total, "blocks must cover exactly [0, MEM_TOTAL)");
    for pair in blocks.windows(2) {
        assert!(!(pair[0].is_free() && pair[1].is_free()), "adjacent free blocks must be coalesced");
    }
}

proptest! {
    /// P1, exercised over randomized allocate/free request sequences.
    #[test]
    fn p1_allocator_tiles_and_never_leaves_adjacent_free_blocks(
        ops in prop::collection::vec((1u32..8, 1usize..=256), 1..40)
    ) {
        let mut allocator = Allocator::new(MEM_TOTAL);
        let mut live: Vec<String> = Vec::new();
        for (i, (op, size)) in ops.into_iter().enumerate() {
            if op % 2 == 0 && !live.is_empty() {
                let name = live.remove((op as usize / 2) % live.len());
                allocator.free(&name);
            } else {
                let name = format!("p{i}");
                if allocator.allocate(&name, size).is_some() {
                    live.push(name);
                }
            }
            check_p1(&allocator, MEM_TOTAL);
        }
    }

    /// P2: freeing every allocated process collapses the list back to a
    /// single free block spanning the whole arena.
    #[test]
    fn p2_freeing_everything_collapses_to_one_block(
        sizes in prop::collection::vec(1usize..=128, 1..20)
    ) {
        let mut allocator = Allocator::new(MEM_TOTAL);
        let mut admitted = Vec::new();
        for (i, size) in sizes.into_iter().enumerate() {
            let name = format!("p{i}");
            if allocator.allocate(&name, size).is_some() {
                admitted.push(name);
            }
        }
        for name in &admitted {
            allocator.free(name);
        }
        let blocks = allocator.blocks();
        prop_assert_eq!(blocks.len(), 1);
        prop_assert_eq!(blocks[0].start, 0);
        prop_assert_eq!(blocks[0].size, MEM_TOTAL);
        prop_assert!(blocks[0].is_free());
    }

    /// P3: occupied frame count always equals the FIFO queue length, even
    /// under eviction pressure from many owners sharing few frames.
    #[test]
    fn p3_occupied_frames_equal_fifo_length(
        addrs in prop::collection::vec((0u32..4, 0u32..64), 1..60)
    ) {
        let mut pager = fresh_pager(32, 8); // 4 frames
        for (owner, addr) in addrs {
            let name = format!("p{owner}");
            let _ = pager.write_u16(&name, addr, 1);
            prop_assert_eq!(pager.occupied_frame_count(), pager.fifo_len());
        }
    }

    /// P4: WRITE(a, v) then READ(a) on the same process returns v, even if
    /// other processes' traffic evicted the page in between.
    #[test]
    fn p4_write_then_read_round_trips_across_eviction_pressure(
        value in any::<u16>(),
        noise in prop::collection::vec((1u32..6, 0u32..64), 0..30)
    ) {
        let mut pager = fresh_pager(32, 8); // 4 frames, plenty of eviction pressure
        pager.write_u16("target", 0x4, value).unwrap();
        for (owner, addr) in noise {
            let name = format!("noise{owner}");
            let _ = pager.write_u16(&name, addr, 0xAB);
        }
        let got = pager.read_u16("target", 0x4).unwrap();
        prop_assert_eq!(got, value);
    }
}
