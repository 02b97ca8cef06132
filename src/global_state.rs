use crate::policy::{GapTable, Sweeper};
use crate::util::ObjectReference;
use atomic_refcell::AtomicRefCell;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Where a heap is in its collection cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum CollectionPhase {
    /// No cycle in progress. Every kind of cycle starts here.
    Idle,
    /// A synchronous collection is running.
    Synchronous,
    /// Marked, and sweeping in steps on the primary context.
    Incremental,
    /// Marked by the primary context, waiting for the secondary context to sweep.
    ParallelMarked,
    /// The secondary context is sweeping into the shadow gap table.
    ParallelSweeping,
    /// The shadow gap table is ready to be published by the primary context.
    ParallelSwept,
}

/// The mutable collector state of a heap.
///
/// The generation stamp, the gap tables and the sweep progress live here, rather than in
/// process-wide statics, so that each [`crate::Heap`] collects independently. The gap
/// table is double-buffered: the allocator reads `largest_gaps`, and a parallel sweep
/// fills `largest_gaps_tmp` until the primary context swaps the two.
pub struct CollectorState {
    /// The stamp of the current (or last) mark phase. Cycles through 1..=255.
    generation: AtomicU8,
    /// Completed collection cycles.
    cycles: AtomicUsize,
    /// Whether the active gap table has any entry.
    has_gaps: AtomicBool,
    /// Bytes in gaps found by the last sweep, minus what the allocator reused since.
    free_bytes: AtomicUsize,
    /// Set from a parallel mark until its sweep is complete. The primary context must not
    /// allocate in that window: the sweep reads the headers the allocator would write.
    parallel_sweep_pending: AtomicBool,
    pub(crate) largest_gaps: Mutex<Box<GapTable>>,
    pub(crate) largest_gaps_tmp: Mutex<Box<GapTable>>,
    pub(crate) sweeper: AtomicRefCell<Sweeper>,
    pub(crate) mark_stack: AtomicRefCell<Vec<ObjectReference>>,
    phase: Mutex<CollectionPhase>,
    /// When the mark phase of the current or last cycle started.
    cycle_start: Mutex<Option<Instant>>,
}

impl Default for CollectorState {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorState {
    pub fn new() -> Self {
        CollectorState {
            generation: AtomicU8::new(0),
            cycles: AtomicUsize::new(0),
            has_gaps: AtomicBool::new(false),
            free_bytes: AtomicUsize::new(0),
            parallel_sweep_pending: AtomicBool::new(false),
            largest_gaps: Mutex::new(Box::default()),
            largest_gaps_tmp: Mutex::new(Box::default()),
            sweeper: AtomicRefCell::new(Sweeper::new()),
            mark_stack: AtomicRefCell::new(vec![]),
            phase: Mutex::new(CollectionPhase::Idle),
            cycle_start: Mutex::new(None),
        }
    }

    /// The stamp new objects get and the mark phase sets. Zero before the first cycle.
    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Advance the stamp for a new cycle. Returns the new stamp, and whether it wrapped
    /// around so that every mark byte in the arena must be reset before marking.
    pub(crate) fn next_generation(&self) -> (u8, bool) {
        let next = self.generation().wrapping_add(1);
        let (next, wrapped) = if next == 0 { (1, true) } else { (next, false) };
        self.generation.store(next, Ordering::SeqCst);
        (next, wrapped)
    }

    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }

    pub(crate) fn start_cycle(&self) {
        *self.cycle_start.lock().unwrap() = Some(Instant::now());
    }

    /// Count a completed cycle. Returns the new count and the time since its mark phase
    /// started.
    pub(crate) fn finish_cycle(&self) -> (usize, Duration) {
        let elapsed = self
            .cycle_start
            .lock()
            .unwrap()
            .map_or(Duration::ZERO, |start| start.elapsed());
        (self.cycles.fetch_add(1, Ordering::SeqCst) + 1, elapsed)
    }

    pub fn has_gaps(&self) -> bool {
        self.has_gaps.load(Ordering::SeqCst)
    }

    pub(crate) fn set_has_gaps(&self, has_gaps: bool) {
        self.has_gaps.store(has_gaps, Ordering::SeqCst);
    }

    pub fn free_bytes(&self) -> usize {
        self.free_bytes.load(Ordering::SeqCst)
    }

    pub(crate) fn set_free_bytes(&self, bytes: usize) {
        self.free_bytes.store(bytes, Ordering::SeqCst);
    }

    pub(crate) fn consume_free_bytes(&self, bytes: usize) {
        let _ = self
            .free_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |free| {
                Some(free.saturating_sub(bytes))
            });
    }

    pub fn is_parallel_sweep_pending(&self) -> bool {
        self.parallel_sweep_pending.load(Ordering::SeqCst)
    }

    pub(crate) fn set_parallel_sweep_pending(&self, pending: bool) {
        self.parallel_sweep_pending.store(pending, Ordering::SeqCst);
    }

    pub fn phase(&self) -> CollectionPhase {
        *self.phase.lock().unwrap()
    }

    /// Move from `from` to `to`. Panics if the heap is not in `from`, which means the
    /// entry points were called out of order.
    pub(crate) fn transition(&self, from: CollectionPhase, to: CollectionPhase) {
        let mut phase = self.lock_phase();
        assert!(
            *phase == from,
            "Cannot move to {} while the collector is {} (expected {})",
            to,
            *phase,
            from
        );
        *phase = to;
    }

    pub(crate) fn lock_phase(&self) -> MutexGuard<'_, CollectionPhase> {
        self.phase.lock().unwrap()
    }

    /// Make `table` the allocator's view of the heap. The caller holds the lock of the
    /// active table.
    pub(crate) fn publish(&self, table: &GapTable, freed_bytes: usize) {
        self.set_has_gaps(!table.is_empty());
        self.set_free_bytes(freed_bytes);
    }

    /// Make the gaps an incremental step found usable. `new_bytes` is added to the free
    /// bytes rather than replacing them, so reuse between steps stays accounted for. The
    /// caller holds the lock of the active table.
    pub(crate) fn publish_step(&self, table: &GapTable, new_bytes: usize) {
        self.set_has_gaps(!table.is_empty());
        self.free_bytes.fetch_add(new_bytes, Ordering::SeqCst);
    }

    /// Install the shadow gap table as the active one and publish it.
    pub(crate) fn swap_gap_tables(&self, freed_bytes: usize) {
        let mut active = self.largest_gaps.lock().unwrap();
        let mut shadow = self.largest_gaps_tmp.lock().unwrap();
        std::mem::swap(&mut *active, &mut *shadow);
        self.publish(&active, freed_bytes);
    }
}
