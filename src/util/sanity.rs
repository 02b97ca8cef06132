//! Heap verification: a linear walk checking that `[allocation_start, next_ptr)` is a gapless
//! sequence of well-formed objects.

use crate::util::constants::*;
use crate::util::Address;
use crate::vm::{ClassModel, ObjectModel};

/// What a verification walk saw.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapSummary {
    pub objects: usize,
    pub placeholders: usize,
    pub placeholder_bytes: usize,
    pub bytes: usize,
}

/// Walk every object up to the current frontier. Panics on an invalid class id, a
/// misaligned object, or a walk that does not end exactly at the frontier.
pub fn verify_heap<C: ClassModel>(model: ObjectModel<'_, C>) -> HeapSummary {
    let arena = model.arena();
    let start = arena.allocation_start();
    let end = arena.next_ptr();
    let mut summary = HeapSummary::default();
    let mut cursor = start;
    while cursor < end {
        assert!(
            cursor.is_aligned_to(MIN_OBJECT_SIZE),
            "Misaligned object at {}",
            cursor
        );
        let class = model.class_id(cursor);
        model.validate_class_id(cursor, class);
        let size = model.size_of(cursor, class);
        assert!(size > 0, "Empty object at {}", cursor);
        if class == class_ids::BYTE_ARRAY && model.mark(cursor) == 0 {
            summary.placeholders += 1;
            summary.placeholder_bytes += size;
        }
        summary.objects += 1;
        cursor += size;
    }
    if cursor != end {
        panic!("Invalid end: object walk ended at {}, frontier is {}", cursor, end);
    }
    summary.bytes = end - start;
    trace!("Verified heap: {:?}", summary);
    summary
}

/// Check that `addr` is the start of an object, by walking from the allocation start.
pub fn is_object_start<C: ClassModel>(model: ObjectModel<'_, C>, addr: Address) -> bool {
    let arena = model.arena();
    let mut cursor = arena.allocation_start();
    let end = arena.next_ptr();
    while cursor < end && cursor < addr {
        cursor += model.instance_size(cursor);
    }
    cursor == addr && addr < end
}
