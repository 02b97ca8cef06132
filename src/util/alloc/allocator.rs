use crate::global_state::CollectorState;
use crate::heap::Heap;
use crate::util::constants::*;
use crate::util::conversions::adjust_object_size;
use crate::util::{Address, ObjectReference};
use crate::vm::{array_size, ClassId, ClassLayout, ClassModel, VMBinding};

use super::bump_allocator::BumpAllocator;
use super::gap_allocator::GapAllocator;

/// Why an allocation request could not be satisfied. Both kinds are fatal for the
/// request; the allocator never retries or collects on its own.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocationError {
    /// The request overflows the address range, or the arena would have to grow past
    /// `max_heap_pages`.
    ReachedMemoryLimit,
    /// The host refused to grow the arena, or the reservation could not be extended.
    FailedToAllocateMemory,
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::ReachedMemoryLimit => write!(f, "reached the arena memory limit"),
            AllocationError::FailedToAllocateMemory => write!(f, "failed to grow the arena"),
        }
    }
}

impl std::error::Error for AllocationError {}

/// Allow specifying different behaviors for a single allocation request.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocationOptions {
    /// A critical allocation may use the last page of headroom that ordinary allocations
    /// leave untouched, so the runtime can still build an error object when memory runs out.
    pub critical: bool,
}

impl AllocationOptions {
    pub const CRITICAL: AllocationOptions = AllocationOptions { critical: true };
}

/// Allocate a zeroed region of `size` bytes, rounded up to the object alignment.
///
/// Small requests are served from the largest gaps of the last sweep when one fits.
/// Everything else is bump-allocated at the frontier, growing the arena if needed.
///
/// Panics if called between a parallel mark and the end of its sweep.
pub fn alloc<VM: VMBinding>(
    heap: &Heap<VM>,
    size: usize,
    options: AllocationOptions,
) -> Result<Address, AllocationError> {
    assert!(
        !heap.state().is_parallel_sweep_pending(),
        "Cannot allocate while a parallel sweep is pending"
    );
    let Some(size) = adjust_object_size(size) else {
        warn!("Allocation of {} bytes overflows the address range", size);
        return Err(AllocationError::ReachedMemoryLimit);
    };
    let state: &CollectorState = heap.state();
    if size <= MAX_GAP_BYTES && state.has_gaps() {
        if let Some(start) = GapAllocator::new(heap.arena(), heap.classes(), state).alloc(size) {
            return Ok(start);
        }
    }
    BumpAllocator::new(heap.arena(), heap.collection()).alloc(size, options)
}

/// Allocate a scalar instance of `class` and write its header. The new object carries the
/// current generation stamp, so a sweep that is still running keeps it.
pub fn alloc_instance<VM: VMBinding>(
    heap: &Heap<VM>,
    class: ClassId,
) -> Result<ObjectReference, AllocationError> {
    let size = match heap.classes().class_layout(class) {
        ClassLayout::Scalar { size } => size,
        ClassLayout::Array { .. } => panic!("Class {} is an array class", class),
    };
    let start = alloc(heap, size, AllocationOptions::default())?;
    heap.object_model()
        .write_header(start, class, heap.state().generation());
    Ok(to_object(start))
}

/// Allocate an array of `length` elements of the array class `class`. A length that
/// cannot be stored in the header is reported as [`AllocationError::ReachedMemoryLimit`].
pub fn alloc_array<VM: VMBinding>(
    heap: &Heap<VM>,
    class: ClassId,
    length: usize,
) -> Result<ObjectReference, AllocationError> {
    let log_element_size = match heap.classes().class_layout(class) {
        ClassLayout::Array { log_element_size } => log_element_size,
        ClassLayout::Scalar { .. } => panic!("Class {} is not an array class", class),
    };
    let fits = length <= i32::MAX as usize
        && length
            .checked_mul(1 << log_element_size)
            .and_then(|bytes| bytes.checked_add(ARRAY_OVERHEAD))
            .is_some();
    if !fits {
        warn!("Array of {} elements of class {} is too large", length, class);
        return Err(AllocationError::ReachedMemoryLimit);
    }
    let start = alloc(
        heap,
        array_size(length, log_element_size),
        AllocationOptions::default(),
    )?;
    let model = heap.object_model();
    model.write_header(start, class, heap.state().generation());
    model.write_array_length(start, length as i32);
    Ok(to_object(start))
}

fn to_object(start: Address) -> ObjectReference {
    // The static block comes first, so the arena never hands out address zero.
    ObjectReference::from_raw_address(start)
        .unwrap_or_else(|| panic!("Allocated an object at {}", start))
}
