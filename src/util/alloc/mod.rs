//! Object allocation: gap reuse first, then bump allocation at the frontier.

pub(crate) mod allocator;
mod bump_allocator;
mod gap_allocator;

pub use self::allocator::{AllocationError, AllocationOptions};
pub use self::bump_allocator::BumpAllocator;
pub use self::gap_allocator::GapAllocator;
