/// Host hooks called by the allocator and the collector.
pub trait Collection: Send + Sync + 'static {
    /// Ask the host for `pages` more pages of linear memory, on top of `committed_pages`.
    /// Returning false refuses the growth, and the allocation that needed it fails with
    /// [`crate::util::alloc::AllocationError::FailedToAllocateMemory`].
    fn grow_memory(&self, _pages: usize, _committed_pages: usize) -> bool {
        true
    }

    /// Called after a collection cycle published its gap table.
    fn collection_finished(&self, _cycle: usize) {}
}
