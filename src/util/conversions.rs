use crate::util::constants::*;
use crate::util::Address;

/* Alignment */

pub const fn raw_align_up(val: usize, align: usize) -> usize {
    // See https://github.com/rust-lang/rust/blob/e620d0f337d0643c757bab791fc7d88d63217704/src/libcore/alloc.rs#L192
    val.wrapping_add(align).wrapping_sub(1) & !align.wrapping_sub(1)
}

pub const fn raw_is_aligned(val: usize, align: usize) -> bool {
    val & align.wrapping_sub(1) == 0
}

/* Conversion */

pub fn pages_to_bytes(pages: usize) -> usize {
    pages << LOG_BYTES_IN_PAGE
}

/// Page-count to bytes, or `None` if the byte count does not fit in `usize`.
pub fn checked_pages_to_bytes(pages: usize) -> Option<usize> {
    pages.checked_mul(BYTES_IN_PAGE)
}

pub fn bytes_to_pages_up(bytes: usize) -> usize {
    (bytes >> LOG_BYTES_IN_PAGE) + usize::from(bytes & (BYTES_IN_PAGE - 1) != 0)
}

/// The number of pages needed so that `end` lies inside committed memory. Mirrors the growth
/// rule of the allocator: an end on a page boundary still needs the page it starts.
pub fn pages_covering(end: Address) -> usize {
    (end >> LOG_BYTES_IN_PAGE as usize) + 1
}

/// Normalize a requested allocation size: at least [`MIN_OBJECT_SIZE`] bytes, rounded up to a
/// multiple of it. Returns `None` if rounding overflows.
pub fn adjust_object_size(size: usize) -> Option<usize> {
    let size = size.max(MIN_OBJECT_SIZE);
    size.checked_add(MIN_OBJECT_SIZE - 1)
        .map(|s| s & !(MIN_OBJECT_SIZE - 1))
}

#[cfg(test)]
mod tests {
    use crate::util::constants::*;
    use crate::util::conversions::*;
    use crate::util::Address;

    #[test]
    fn test_bytes_to_pages() {
        assert_eq!(bytes_to_pages_up(0), 0);
        assert_eq!(bytes_to_pages_up(1), 1);
        assert_eq!(bytes_to_pages_up(BYTES_IN_PAGE), 1);
        assert_eq!(bytes_to_pages_up(BYTES_IN_PAGE + 1), 2);
        assert_eq!(pages_to_bytes(3), 3 * BYTES_IN_PAGE);
        assert_eq!(checked_pages_to_bytes(usize::MAX), None);
    }

    #[test]
    fn test_pages_covering() {
        assert_eq!(pages_covering(Address::from_usize(BYTES_IN_PAGE - 8)), 1);
        assert_eq!(pages_covering(Address::from_usize(BYTES_IN_PAGE)), 2);
    }

    #[test]
    fn test_adjust_object_size() {
        assert_eq!(adjust_object_size(0), Some(8));
        assert_eq!(adjust_object_size(5), Some(8));
        assert_eq!(adjust_object_size(8), Some(8));
        assert_eq!(adjust_object_size(13), Some(16));
        assert_eq!(adjust_object_size(usize::MAX - 6), None);
        assert_eq!(adjust_object_size(usize::MAX - 8), Some(usize::MAX - 7));
    }
}
