//! Sweep phase.
//!
//! The sweep walks `[allocation_start, end)` object by object, where `end` is the frontier
//! when the sweep started. Every maximal run of unmarked objects becomes one placeholder byte
//! array (a gap), and the largest gaps are recorded in a [`GapTable`] for reuse by the
//! allocator. The walk can stop after a budget of objects and resume later with the same
//! result.

use super::gap_table::{Gap, GapTable};
use crate::util::constants::*;
use crate::util::heap::Arena;
use crate::util::reference_processor::{WeakRefCursor, WeakRefTable};
use crate::util::Address;
use crate::vm::{ClassModel, ObjectModel};

/// How the sweep treats unmarked objects that still have weak references.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum SweepMode {
    /// Synchronous or incremental collection. The weak references are cleared and the
    /// object is reclaimed.
    Serial,
    /// Sweep on a secondary thread. The weak references are cleared but the object is kept
    /// until the next cycle, because the primary thread may still be reading it through them.
    Parallel,
}

/// Resumable sweep state.
pub struct Sweeper {
    cursor: Address,
    end: Address,
    gap_start: Address,
    was_used: bool,
    active: bool,
    generation: u8,
    mode: SweepMode,
    freed_bytes: usize,
    /// Part of `freed_bytes` not yet handed out by [`Sweeper::take_unpublished_bytes`].
    unpublished_bytes: usize,
    gaps: usize,
    objects: usize,
    weak_keys: WeakRefCursor,
    /// Gaps the allocator may be handing out while this sweep runs.
    gaps_in_use: Vec<Address>,
}

impl Default for Sweeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Sweeper {
    pub fn new() -> Self {
        Sweeper {
            cursor: Address::ZERO,
            end: Address::ZERO,
            gap_start: Address::ZERO,
            was_used: true,
            active: false,
            generation: 0,
            mode: SweepMode::Serial,
            freed_bytes: 0,
            unpublished_bytes: 0,
            gaps: 0,
            objects: 0,
            weak_keys: WeakRefCursor::default(),
            gaps_in_use: vec![],
        }
    }

    /// Start a sweep for objects marked with `generation`. Clears `table`, fixes the scan
    /// bounds and snapshots the weak reference keys.
    pub fn init(
        &mut self,
        arena: &Arena,
        weak_refs: &WeakRefTable,
        table: &mut GapTable,
        generation: u8,
        mode: SweepMode,
        gaps_in_use: Vec<Address>,
    ) {
        table.clear();
        self.cursor = arena.allocation_start();
        self.end = {
            // Wait for an allocation that is still moving the frontier.
            let _guard = arena.lock();
            arena.next_ptr()
        };
        self.gap_start = self.cursor;
        self.was_used = true;
        self.active = true;
        self.generation = generation;
        self.mode = mode;
        self.freed_bytes = 0;
        self.unpublished_bytes = 0;
        self.gaps = 0;
        self.objects = 0;
        self.weak_keys = WeakRefCursor::new(weak_refs.snapshot_keys());
        self.gaps_in_use = gaps_in_use;
        debug!(
            "{} sweep of generation {} over [{}, {})",
            mode, generation, self.cursor, self.end
        );
    }

    /// Visit at most `budget` objects. Returns true when the sweep is complete.
    pub fn step<C: ClassModel>(
        &mut self,
        model: ObjectModel<'_, C>,
        weak_refs: &WeakRefTable,
        table: &mut GapTable,
        budget: usize,
    ) -> bool {
        assert!(self.active, "No sweep in progress");
        let mut remaining = budget;
        while self.cursor < self.end {
            if remaining == 0 {
                trace!("Sweep paused at {}", self.cursor);
                return false;
            }
            remaining -= 1;

            let object = self.cursor;
            // The size must be read before the header may be overwritten by a placeholder.
            let class = model.class_id(object);
            model.validate_class_id(object, class);
            let size = model.size_of(object, class);

            let mut is_used = model.mark(object) == self.generation;
            if !is_used && self.weak_keys.take(object) {
                is_used = weak_refs.unregister(object) && self.mode == SweepMode::Parallel;
            }
            if !is_used && self.gaps_in_use.contains(&object) {
                // The allocator may be writing into this gap. Keep it for one more cycle.
                is_used = true;
            }

            if is_used != self.was_used {
                if is_used {
                    self.finish_gap(model, table, object);
                } else {
                    self.gap_start = object;
                }
                self.was_used = is_used;
            }

            self.cursor = object + size;
            self.objects += 1;
        }

        if !self.was_used {
            self.finish_trailing_gap(model, table);
        }
        assert!(
            self.cursor == self.end,
            "Sweep ended at {} instead of {}",
            self.cursor,
            self.end
        );
        self.active = false;
        self.weak_keys.clear();
        self.gaps_in_use.clear();
        debug!(
            "Sweep done: {} objects, {} gaps, {} bytes freed",
            self.objects, self.gaps, self.freed_bytes
        );
        true
    }

    /// Run the sweep to the end.
    pub fn run_to_completion<C: ClassModel>(
        &mut self,
        model: ObjectModel<'_, C>,
        weak_refs: &WeakRefTable,
        table: &mut GapTable,
    ) {
        while !self.step(model, weak_refs, table, usize::MAX) {}
    }

    /// Turn `[gap_start, end)` into placeholders and offer them to the table.
    fn finish_gap<C: ClassModel>(
        &mut self,
        model: ObjectModel<'_, C>,
        table: &mut GapTable,
        end: Address,
    ) {
        let mut start = self.gap_start;
        let mut remaining = end - start;
        self.freed_bytes += remaining;
        self.unpublished_bytes += remaining;
        // A placeholder length is an i32, so huge gaps are split into several placeholders.
        while remaining > 0 {
            let bytes = remaining.min(MAX_GAP_BYTES);
            model.write_placeholder(start, bytes);
            table.offer(Gap { start, bytes });
            self.gaps += 1;
            start += bytes;
            remaining -= bytes;
        }
    }

    // The frontier only moves back if nothing was bump-allocated since the sweep began.
    // Otherwise the trailing run is an ordinary gap.
    fn finish_trailing_gap<C: ClassModel>(&mut self, model: ObjectModel<'_, C>, table: &mut GapTable) {
        let arena = model.arena();
        let guard = arena.lock();
        if arena.next_ptr() == self.end {
            arena.set_next_ptr(&guard, self.gap_start);
            debug!(
                "Reduced the frontier to {}, by {} bytes",
                self.gap_start,
                self.end - self.gap_start
            );
        } else {
            drop(guard);
            self.finish_gap(model, table, self.end);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mode(&self) -> SweepMode {
        self.mode
    }

    /// Bytes turned into gaps by the current or last sweep.
    pub fn freed_bytes(&self) -> usize {
        self.freed_bytes
    }

    /// Bytes turned into gaps since the last call.
    pub fn take_unpublished_bytes(&mut self) -> usize {
        std::mem::take(&mut self.unpublished_bytes)
    }

    /// Objects visited by the current or last sweep, placeholders included.
    pub fn objects_visited(&self) -> usize {
        self.objects
    }

    /// The next object to visit.
    pub fn cursor(&self) -> Address {
        self.cursor
    }
}
