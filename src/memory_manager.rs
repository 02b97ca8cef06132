//! Runtime-to-collector interface: safe Rust APIs.
//!
//! This module is the surface a bytecode runtime calls. A runtime creates one [`Heap`] per
//! isolate with [`gc_init`], allocates objects with [`alloc_instance`], [`alloc_array`] or
//! [`allocate`], and triggers collections in one of three ways:
//!
//! 1. [`invoke_synchronous_collection`]: mark and sweep in one call.
//! 2. [`begin_incremental_collection`] followed by calls to [`step_incremental_collection`]
//!    until it returns true. The runtime decides when to step; there is no internal timer.
//! 3. [`begin_parallel_mark`] on the primary thread, [`run_parallel_sweep`] on a secondary
//!    thread, then [`publish_parallel_result`] on the primary thread again. The primary thread
//!    must not allocate between the mark and the end of the sweep; allocating in that window
//!    panics.
//!    [`SweepThread`](crate::plan::SweepThread) packages the secondary thread.
//!
//! Calling the entry points of a cycle out of order panics.

use std::sync::Arc;

use crate::heap::{Heap, HeapBuilder};
use crate::plan::collector;
use crate::util::alloc::allocator;
use crate::util::alloc::{AllocationError, AllocationOptions};
use crate::util::reference_processor::WeakRef;
use crate::util::sanity::{self, HeapSummary};
use crate::util::{Address, ObjectReference};
use crate::vm::{ClassId, VMBinding};

/// Create a heap. This also attempts to initialize the logger. A runtime that uses its
/// own logger should initialize it before calling this.
///
/// Arguments:
/// * `builder`: The options of the heap.
/// * `classes`: The class model. Its classes must not change afterwards.
/// * `scanning`: Reports roots held outside the arena.
/// * `collection`: Host callbacks for arena growth and finished collections.
pub fn gc_init<VM: VMBinding>(
    builder: &HeapBuilder,
    classes: VM::VMClassModel,
    scanning: VM::VMScanning,
    collection: VM::VMCollection,
) -> Heap<VM> {
    match crate::util::logger::try_init() {
        Ok(_) => debug!("arenagc initialized the logger."),
        Err(_) => debug!(
            "arenagc failed to initialize the logger. Possibly a logger has been initialized by user."
        ),
    }
    let heap = builder.build::<VM>(classes, scanning, collection);
    info!(
        "Initialized heap: {} of {} pages committed, objects start at {}",
        heap.arena().committed_pages(),
        heap.arena().max_pages(),
        heap.arena().allocation_start()
    );
    heap
}

/// Run a complete collection cycle on the calling thread.
pub fn invoke_synchronous_collection<VM: VMBinding>(heap: &Heap<VM>) {
    collector::collect(heap)
}

/// Mark from the roots and prepare an incremental sweep.
pub fn begin_incremental_collection<VM: VMBinding>(heap: &Heap<VM>) {
    collector::begin_incremental(heap)
}

/// Sweep a bounded number of objects (the `sweep_step_budget` option). Returns true when
/// the cycle is complete. Returns true immediately if no incremental cycle is running.
pub fn step_incremental_collection<VM: VMBinding>(heap: &Heap<VM>) -> bool {
    collector::step_incremental(heap)
}

/// Start a parallel cycle: mark from the roots on the calling (primary) thread.
pub fn begin_parallel_mark<VM: VMBinding>(heap: &Heap<VM>) {
    collector::begin_parallel_mark(heap)
}

/// Sweep the marked heap into the shadow gap table. Call this on the secondary thread.
pub fn run_parallel_sweep<VM: VMBinding>(heap: &Heap<VM>) {
    collector::run_parallel_sweep(heap)
}

/// Finish a parallel cycle on the primary thread by installing the shadow gap table.
pub fn publish_parallel_result<VM: VMBinding>(heap: &Heap<VM>) {
    collector::publish_parallel_result(heap)
}

/// Allocate `size` bytes of zeroed memory. The caller writes the object header.
///
/// Arguments:
/// * `heap`: The heap to allocate from.
/// * `size`: The number of bytes required. It is rounded up to the object alignment.
pub fn allocate<VM: VMBinding>(heap: &Heap<VM>, size: usize) -> Result<Address, AllocationError> {
    allocator::alloc(heap, size, AllocationOptions::default())
}

/// Allocate `size` bytes of zeroed memory with the given options.
pub fn alloc_with_options<VM: VMBinding>(
    heap: &Heap<VM>,
    size: usize,
    options: AllocationOptions,
) -> Result<Address, AllocationError> {
    allocator::alloc(heap, size, options)
}

/// Allocate an instance of the scalar class `class`, with its header written.
pub fn alloc_instance<VM: VMBinding>(
    heap: &Heap<VM>,
    class: ClassId,
) -> Result<ObjectReference, AllocationError> {
    allocator::alloc_instance(heap, class)
}

/// Allocate an array of the array class `class` with `length` elements, with its header
/// and length written.
pub fn alloc_array<VM: VMBinding>(
    heap: &Heap<VM>,
    class: ClassId,
    length: usize,
) -> Result<ObjectReference, AllocationError> {
    allocator::alloc_array(heap, class, length)
}

/// Whether the last published sweep left gaps the allocator can reuse.
pub fn has_reclaimable_space<VM: VMBinding>(heap: &Heap<VM>) -> bool {
    heap.state().has_gaps()
}

/// Bytes in gaps found by the last sweep that have not been reused since.
pub fn free_bytes<VM: VMBinding>(heap: &Heap<VM>) -> usize {
    heap.state().free_bytes()
}

/// Create a weak reference to `object`. The handle reads `None` once the object has been
/// found unreachable by a sweep.
pub fn new_weak_ref<VM: VMBinding>(
    heap: &Heap<VM>,
    object: Option<ObjectReference>,
) -> Arc<WeakRef> {
    heap.weak_refs().new_weak_ref(heap.arena(), object)
}

/// Walk the whole heap and check its layout. Panics if it is corrupted.
pub fn verify_heap<VM: VMBinding>(heap: &Heap<VM>) -> HeapSummary {
    sanity::verify_heap(heap.object_model())
}
