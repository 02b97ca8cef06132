//! Collection cycles.
//!
//! Every cycle marks from the roots with a fresh generation stamp and then sweeps the
//! arena. The three kinds of cycle differ only in who sweeps and when:
//!
//! * synchronous: mark and sweep to completion in one call,
//! * incremental: mark in [`begin_incremental`], then sweep a bounded number of objects
//!   per [`step_incremental`] call,
//! * parallel: mark in [`begin_parallel_mark`] on the primary context, sweep into the
//!   shadow gap table in [`run_parallel_sweep`] on a secondary context, and swap the tables
//!   in [`publish_parallel_result`] back on the primary context.

use std::time::Instant;

use crate::global_state::CollectionPhase;
use crate::heap::Heap;
use crate::plan::tracing;
use crate::policy::SweepMode;
use crate::util::sanity;
use crate::vm::{Collection, VMBinding};

/// Run a full collection on the calling thread.
pub fn collect<VM: VMBinding>(heap: &Heap<VM>) {
    let state = heap.state();
    state.transition(CollectionPhase::Idle, CollectionPhase::Synchronous);
    let generation = mark(heap);
    {
        let mut table = state.largest_gaps.lock().unwrap();
        let mut sweeper = state.sweeper.borrow_mut();
        sweeper.init(
            heap.arena(),
            heap.weak_refs(),
            &mut table,
            generation,
            SweepMode::Serial,
            vec![],
        );
        sweeper.run_to_completion(heap.object_model(), heap.weak_refs(), &mut table);
        state.publish(&table, sweeper.freed_bytes());
    }
    state.transition(CollectionPhase::Synchronous, CollectionPhase::Idle);
    finish_cycle(heap, "Synchronous");
}

/// Mark and prepare a sweep that [`step_incremental`] runs in steps.
pub fn begin_incremental<VM: VMBinding>(heap: &Heap<VM>) {
    let state = heap.state();
    let mut phase = state.lock_phase();
    assert!(
        *phase == CollectionPhase::Idle,
        "Cannot begin an incremental collection while the collector is {}",
        *phase
    );
    let generation = mark(heap);
    let mut table = state.largest_gaps.lock().unwrap();
    state.sweeper.borrow_mut().init(
        heap.arena(),
        heap.weak_refs(),
        &mut table,
        generation,
        SweepMode::Serial,
        vec![],
    );
    // The table was cleared for the new sweep.
    state.publish(&table, 0);
    *phase = CollectionPhase::Incremental;
}

/// Sweep up to `sweep_step_budget` objects. Returns true when the cycle is complete, or
/// when no incremental cycle is in progress.
pub fn step_incremental<VM: VMBinding>(heap: &Heap<VM>) -> bool {
    let state = heap.state();
    match state.phase() {
        CollectionPhase::Idle => return true,
        CollectionPhase::Incremental => {}
        phase => panic!(
            "Cannot step an incremental collection while the collector is {}",
            phase
        ),
    }
    let done = {
        let mut table = state.largest_gaps.lock().unwrap();
        let mut sweeper = state.sweeper.borrow_mut();
        let done = sweeper.step(
            heap.object_model(),
            heap.weak_refs(),
            &mut table,
            heap.options().sweep_step_budget,
        );
        // Gaps are usable as soon as the sweep has passed them.
        state.publish_step(&table, sweeper.take_unpublished_bytes());
        done
    };
    if done {
        state.transition(CollectionPhase::Incremental, CollectionPhase::Idle);
        finish_cycle(heap, "Incremental");
    }
    done
}

/// The primary-context half of a parallel cycle: mark only.
pub fn begin_parallel_mark<VM: VMBinding>(heap: &Heap<VM>) {
    let state = heap.state();
    let mut phase = state.lock_phase();
    assert!(
        *phase == CollectionPhase::Idle,
        "Cannot begin a parallel collection while the collector is {}",
        *phase
    );
    mark(heap);
    state.set_parallel_sweep_pending(true);
    *phase = CollectionPhase::ParallelMarked;
}

/// The secondary-context half of a parallel cycle: sweep into the shadow gap table.
///
/// The primary context must not allocate until this returns. The active table stays
/// untouched, and this sweep keeps its gaps as they are: after the sweep and before the
/// publication, the primary context may allocate from them again.
pub fn run_parallel_sweep<VM: VMBinding>(heap: &Heap<VM>) {
    let start = Instant::now();
    let state = heap.state();
    state.transition(CollectionPhase::ParallelMarked, CollectionPhase::ParallelSweeping);
    let gaps_in_use = state.largest_gaps.lock().unwrap().starts();
    {
        let mut shadow = state.largest_gaps_tmp.lock().unwrap();
        let mut sweeper = state.sweeper.borrow_mut();
        sweeper.init(
            heap.arena(),
            heap.weak_refs(),
            &mut shadow,
            state.generation(),
            SweepMode::Parallel,
            gaps_in_use,
        );
        sweeper.run_to_completion(heap.object_model(), heap.weak_refs(), &mut shadow);
    }
    state.transition(CollectionPhase::ParallelSweeping, CollectionPhase::ParallelSwept);
    state.set_parallel_sweep_pending(false);
    debug!("Parallel sweep took {:?}", start.elapsed());
}

/// Back on the primary context: make the shadow gap table the active one.
pub fn publish_parallel_result<VM: VMBinding>(heap: &Heap<VM>) {
    let state = heap.state();
    {
        let mut phase = state.lock_phase();
        assert!(
            *phase == CollectionPhase::ParallelSwept,
            "Cannot publish a parallel collection while the collector is {}",
            *phase
        );
        state.swap_gap_tables(state.sweeper.borrow().freed_bytes());
        *phase = CollectionPhase::Idle;
    }
    finish_cycle(heap, "Parallel");
}

fn mark<VM: VMBinding>(heap: &Heap<VM>) -> u8 {
    let start = Instant::now();
    let state = heap.state();
    let model = heap.object_model();
    state.start_cycle();
    let (generation, wrapped) = state.next_generation();
    if wrapped {
        let end = {
            let _guard = heap.arena().lock();
            heap.arena().next_ptr()
        };
        let objects = tracing::clear_all_marks(model, end);
        info!(
            "Generation stamp wrapped around, reset the marks of {} objects",
            objects
        );
    }
    let mut mark_stack = state.mark_stack.borrow_mut();
    let marked = tracing::mark_reachable(
        model,
        heap.field_table(),
        heap.scanning(),
        generation,
        &mut mark_stack,
    );
    debug!(
        "Marked {} objects with generation {} in {:?}",
        marked,
        generation,
        start.elapsed()
    );
    generation
}

fn finish_cycle<VM: VMBinding>(heap: &Heap<VM>, kind: &str) {
    let state = heap.state();
    let (cycle, elapsed) = state.finish_cycle();
    if heap.options().verify_heap {
        let summary = sanity::verify_heap(heap.object_model());
        debug!("Heap verified after cycle {}: {:?}", cycle, summary);
    }
    info!(
        "{} collection {} done in {:?}: {} bytes in gaps, {} bytes up to the frontier",
        kind,
        cycle,
        elapsed,
        state.free_bytes(),
        heap.arena().used_bytes()
    );
    heap.collection().collection_finished(cycle);
}
