use static_assertions::const_assert;

/// log2 of the number of bytes in a byte
pub const LOG_BYTES_IN_BYTE: u8 = 0;
/// The number of bytes in a byte
pub const BYTES_IN_BYTE: usize = 1;

/// log2 of the number of bytes in a kilobyte
pub const LOG_BYTES_IN_KBYTE: u8 = 10;
/// The number of bytes in a kilobyte
pub const BYTES_IN_KBYTE: usize = 1 << LOG_BYTES_IN_KBYTE;

/// log2 of the number of bytes in a megabyte
pub const LOG_BYTES_IN_MBYTE: u8 = 20;
/// The number of bytes in a megabyte
pub const BYTES_IN_MBYTE: usize = 1 << LOG_BYTES_IN_MBYTE;

#[cfg(target_pointer_width = "32")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 2;
#[cfg(target_pointer_width = "64")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 3;
/// The number of bytes in an address. Reference slots in the arena have this width.
pub const BYTES_IN_ADDRESS: usize = 1 << LOG_BYTES_IN_ADDRESS;

/// log2 of the number of bytes in an arena page. The arena grows in pages of this size.
pub const LOG_BYTES_IN_PAGE: u8 = 16;
/// The number of bytes in an arena page
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

#[cfg(target_pointer_width = "32")]
/// The hard upper bound of arena pages (4 GB with 32-bit addressing).
pub const MAX_ARENA_PAGES: usize = 1 << 16;
#[cfg(target_pointer_width = "64")]
/// The hard upper bound of arena pages.
pub const MAX_ARENA_PAGES: usize = i32::MAX as usize;

/// log2 of the minimal object size and alignment in bytes.
pub const LOG_MIN_OBJECT_SIZE: u8 = 3;
/// Every object size is rounded up to a multiple of this.
pub const MIN_OBJECT_SIZE: usize = 1 << LOG_MIN_OBJECT_SIZE;

// Object header layout.
//
// | class id (24 bits) | gc byte (8 bits) | array length (32 bits, arrays only) | payload...

/// Mask to get the class id from the first header word.
pub const CLASS_ID_MASK: u32 = 0x00ff_ffff;
/// Offset of the per-object mark byte (generation stamp).
pub const GC_BYTE_OFFSET: usize = 3;
/// Header bytes of a scalar object.
pub const OBJECT_OVERHEAD: usize = 4;
/// Offset of the element count in an array header.
pub const ARRAY_LENGTH_OFFSET: usize = OBJECT_OVERHEAD;
/// Header bytes of an array. Elements start here.
pub const ARRAY_OVERHEAD: usize = OBJECT_OVERHEAD + 4;

/// The largest byte size a single placeholder can describe with its `i32` length field.
pub const MAX_GAP_BYTES: usize = (i32::MAX as usize + ARRAY_OVERHEAD) & !(MIN_OBJECT_SIZE - 1);
/// Gaps of this size or smaller become placeholders but are never offered for reuse.
pub const MIN_TRACKED_GAP_BYTES: usize = ARRAY_OVERHEAD << 1;
/// Number of slots in the largest-gaps table.
pub const LARGEST_GAPS: usize = 16;

/// Reserved class ids assigned by the translator to the built-in classes.
pub mod class_ids {
    /// `java.lang.Object`
    pub const OBJECT: u32 = 0;
    /// Array of references. Elements are traced directly, not through the field table.
    pub const OBJECT_ARRAY: u32 = 1;
    pub const INT_ARRAY: u32 = 2;
    pub const FLOAT_ARRAY: u32 = 3;
    pub const BOOLEAN_ARRAY: u32 = 4;
    /// Byte array. Free gaps are rewritten as byte arrays of this class.
    pub const BYTE_ARRAY: u32 = 5;
    pub const CHAR_ARRAY: u32 = 6;
    pub const SHORT_ARRAY: u32 = 7;
    pub const LONG_ARRAY: u32 = 8;
    pub const DOUBLE_ARRAY: u32 = 9;

    pub const FIRST_ARRAY: u32 = OBJECT_ARRAY;
    pub const LAST_ARRAY: u32 = DOUBLE_ARRAY;
}

/// Offset of the static-storage block. Address zero stays null.
pub const STATIC_DATA_START: usize = MIN_OBJECT_SIZE;

/// Default number of objects visited per incremental sweep step.
pub const DEFAULT_SWEEP_STEP_BUDGET: usize = 20_000;
/// Default number of pages committed when the arena is created.
pub const DEFAULT_INITIAL_HEAP_PAGES: usize = 16;
#[cfg(target_pointer_width = "32")]
/// Default number of pages the arena may grow to.
pub const DEFAULT_MAX_HEAP_PAGES: usize = 1 << 10;
#[cfg(target_pointer_width = "64")]
/// Default number of pages the arena may grow to.
pub const DEFAULT_MAX_HEAP_PAGES: usize = 1 << 12;

const_assert!(ARRAY_OVERHEAD % MIN_OBJECT_SIZE == 0);
const_assert!(GC_BYTE_OFFSET < OBJECT_OVERHEAD);
const_assert!(DEFAULT_MAX_HEAP_PAGES <= MAX_ARENA_PAGES);
const_assert!(MAX_GAP_BYTES - ARRAY_OVERHEAD <= i32::MAX as usize);
