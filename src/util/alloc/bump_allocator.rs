use super::allocator::{AllocationError, AllocationOptions};
use crate::util::constants::*;
use crate::util::conversions::bytes_to_pages_up;
use crate::util::heap::Arena;
use crate::util::Address;
use crate::vm::Collection;

/// Allocates at the arena frontier, growing the arena when the committed memory runs out.
pub struct BumpAllocator<'a, C: Collection> {
    arena: &'a Arena,
    collection: &'a C,
}

impl<'a, C: Collection> BumpAllocator<'a, C> {
    pub fn new(arena: &'a Arena, collection: &'a C) -> Self {
        BumpAllocator { arena, collection }
    }

    /// Move the frontier by `size` bytes (already aligned) and return the zeroed region.
    /// On failure the frontier is left where it was.
    pub fn alloc(&self, size: usize, options: AllocationOptions) -> Result<Address, AllocationError> {
        let start = {
            let guard = self.arena.lock();
            let start = self.arena.next_ptr();
            let Some(end) = start.checked_add(size) else {
                warn!("Allocation of {} bytes at {} overflows the address range", size, start);
                return Err(AllocationError::ReachedMemoryLimit);
            };
            // Ordinary allocations leave the last committed page alone.
            let headroom_pages = if options.critical { 0 } else { 1 };
            let needed_pages = bytes_to_pages_up(end.as_usize()) + headroom_pages;
            let committed_pages = self.arena.committed_pages();
            if needed_pages > committed_pages {
                let pages = self.growth(committed_pages, needed_pages - committed_pages)?;
                if !self.collection.grow_memory(pages, committed_pages) {
                    warn!("The host refused to grow the arena by {} pages", pages);
                    return Err(AllocationError::FailedToAllocateMemory);
                }
                if !self.arena.grow(&guard, pages) {
                    warn!("Unable to commit {} more pages", pages);
                    return Err(AllocationError::FailedToAllocateMemory);
                }
                debug!(
                    "Grew the arena from {} to {} pages",
                    committed_pages,
                    committed_pages + pages
                );
            }
            self.arena.set_next_ptr(&guard, end);
            start
        };
        // Retracted frontiers leave stale bytes behind.
        self.arena.zero(start, size);
        Ok(start)
    }

    /// Pages to add: half the committed pages, at least `min_pages`, at most what is left
    /// below the limit.
    fn growth(&self, committed_pages: usize, min_pages: usize) -> Result<usize, AllocationError> {
        let remaining = self.arena.max_pages() - committed_pages;
        if min_pages > remaining {
            warn!(
                "Need {} more pages but only {} remain below the limit of {} pages",
                min_pages,
                remaining,
                self.arena.max_pages()
            );
            return Err(AllocationError::ReachedMemoryLimit);
        }
        Ok((committed_pages / 2).min(remaining).max(min_pages))
    }
}
