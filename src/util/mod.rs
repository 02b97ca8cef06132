//! Utilities used by the collector: addresses, constants, the arena, options, logging
//! and the allocator.

/// The address types.
pub mod address;
/// Allocation from gaps and the arena frontier.
pub mod alloc;
/// Constants of the object layout and the arena.
pub mod constants;
/// Calculation, conversion and rounding for memory related numbers.
pub mod conversions;
/// The linear memory and the arena built on it.
pub mod heap;
/// Logger initialization
pub mod logger;
/// Heap options.
pub mod options;
/// Weak references.
pub mod reference_processor;
/// Heap verification.
pub mod sanity;

#[cfg(any(test, feature = "test_private"))]
pub mod test_util;

pub use self::address::Address;
pub use self::address::ObjectReference;
