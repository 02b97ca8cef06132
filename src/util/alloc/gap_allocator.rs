use crate::global_state::CollectorState;
use crate::policy::GapFit;
use crate::util::constants::*;
use crate::util::heap::Arena;
use crate::util::Address;
use crate::vm::{ClassModel, ObjectModel};

/// Serves allocations from the published gap table.
pub struct GapAllocator<'a, C: ClassModel> {
    model: ObjectModel<'a, C>,
    state: &'a CollectorState,
}

impl<'a, C: ClassModel> GapAllocator<'a, C> {
    pub fn new(arena: &'a Arena, classes: &'a C, state: &'a CollectorState) -> Self {
        GapAllocator {
            model: ObjectModel::new(arena, classes),
            state,
        }
    }

    /// Claim `size` bytes (already aligned) from a tracked gap. The claimed region is
    /// zeroed. Returns `None` if no gap fits.
    pub fn alloc(&self, size: usize) -> Option<Address> {
        let object = {
            let mut table = self.state.largest_gaps.lock().unwrap();
            let object = match table.claim(size)? {
                GapFit::Exact { object } => object,
                GapFit::Split { object, remainder } => {
                    // The head stays a placeholder, so the arena remains walkable.
                    self.model
                        .write_array_length(remainder.start, (remainder.bytes - ARRAY_OVERHEAD) as i32);
                    object
                }
            };
            if table.is_empty() {
                self.state.set_has_gaps(false);
            }
            object
        };
        self.state.consume_free_bytes(size);
        self.model.arena().zero(object, size);
        trace!("Reused {} bytes of a gap at {}", size, object);
        Some(object)
    }
}

#[cfg(test)]
mod tests {
    use crate::memory_manager;
    use crate::util::constants::*;
    use crate::util::test_util::fixtures::TestHeap;

    /// Allocate `count` leaves, drop them all, then keep one live node behind them so the
    /// run becomes a gap instead of retracting the frontier.
    fn heap_with_gap(count: usize) -> (TestHeap, usize) {
        let t = TestHeap::new();
        let first = t.alloc(t.leaf);
        for _ in 1..count {
            t.alloc(t.leaf);
        }
        let keeper = t.alloc(t.node);
        t.root(keeper);
        memory_manager::invoke_synchronous_collection(&t.heap);
        assert!(memory_manager::has_reclaimable_space(&t.heap));
        (t, first.to_raw_address().as_usize())
    }

    #[test]
    fn exact_fit_reuses_the_gap_start() {
        let (t, gap_start) = heap_with_gap(2);
        let frontier = t.heap.arena().next_ptr();
        let object = memory_manager::allocate(&t.heap, 64).unwrap();
        assert_eq!(object.as_usize(), gap_start);
        assert_eq!(t.heap.arena().next_ptr(), frontier);
        assert!(!memory_manager::has_reclaimable_space(&t.heap));
        assert_eq!(memory_manager::free_bytes(&t.heap), 0);
    }

    #[test]
    fn split_takes_the_tail() {
        let (t, gap_start) = heap_with_gap(4);
        assert_eq!(memory_manager::free_bytes(&t.heap), 128);
        let leaf = t.alloc(t.leaf);
        assert_eq!(leaf.to_raw_address().as_usize(), gap_start + 96);
        assert_eq!(memory_manager::free_bytes(&t.heap), 96);

        let model = t.heap.object_model();
        let head = crate::util::Address::from_usize(gap_start);
        assert_eq!(model.class_id(head), class_ids::BYTE_ARRAY);
        assert_eq!(model.instance_size(head), 96);
        // the walk still covers every byte
        let sizes = t.walk();
        assert_eq!(sizes.len(), 3);
        assert_eq!(&sizes[..2], &[96, 32]);
    }

    #[test]
    fn reused_memory_is_zeroed() {
        let (t, gap_start) = heap_with_gap(1);
        let object = memory_manager::allocate(&t.heap, 32).unwrap();
        assert_eq!(object.as_usize(), gap_start);
        let arena = t.heap.arena();
        // the placeholder header and length are gone
        assert_eq!(arena.load_u32(object), 0);
        assert_eq!(arena.load_u32(object + 4usize), 0);
    }

    #[test]
    fn no_fit_falls_back_to_bump() {
        let (t, gap_start) = heap_with_gap(1);
        let frontier = t.heap.arena().next_ptr();
        // the only gap has 32 bytes
        let object = memory_manager::allocate(&t.heap, 40).unwrap();
        assert_eq!(object, frontier);
        assert!(memory_manager::has_reclaimable_space(&t.heap));
        // 24 bytes leave exactly a placeholder header
        let object = memory_manager::allocate(&t.heap, 24).unwrap();
        assert_eq!(object.as_usize(), gap_start + 8);
        assert_eq!(t.walk()[0], 8);
    }
}
