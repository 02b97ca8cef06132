use crate::util::constants::*;
use crate::util::Address;

/// A run of free bytes, stored in the arena as one placeholder byte array at `start`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Gap {
    pub start: Address,
    pub bytes: usize,
}

impl Gap {
    pub fn end(&self) -> Address {
        self.start + self.bytes
    }
}

/// Where an allocation of a given size fits into the gap table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GapFit {
    /// The gap had exactly the requested size and was removed from the table.
    Exact { object: Address },
    /// The object takes the tail of the gap. `remainder` is the shrunk placeholder that
    /// stays at the gap start; its length field must be rewritten.
    Split { object: Address, remainder: Gap },
}

/// The [`LARGEST_GAPS`] largest gaps found by the last sweep.
///
/// A gap enters the table by replacing the smallest tracked entry, and only if it is
/// strictly larger. Empty slots count as zero bytes, so they are filled first. Gaps of
/// [`MIN_TRACKED_GAP_BYTES`] or less are never tracked.
#[derive(Clone, Debug)]
pub struct GapTable {
    slots: [Option<Gap>; LARGEST_GAPS],
    smallest_index: usize,
    smallest_bytes: usize,
}

impl Default for GapTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GapTable {
    pub fn new() -> Self {
        GapTable {
            slots: [None; LARGEST_GAPS],
            smallest_index: 0,
            smallest_bytes: MIN_TRACKED_GAP_BYTES,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Track `gap` if it is larger than the smallest tracked gap. Returns whether it was taken.
    pub fn offer(&mut self, gap: Gap) -> bool {
        if gap.bytes <= self.smallest_bytes {
            return false;
        }
        self.slots[self.smallest_index] = Some(gap);
        self.refresh_smallest();
        true
    }

    /// Recompute the eviction candidate. Must be called after slots change size.
    pub fn refresh_smallest(&mut self) {
        let (index, bytes) = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (i, slot.map_or(0, |gap| gap.bytes)))
            // first slot wins ties
            .fold((0, usize::MAX), |min, cur| if cur.1 < min.1 { cur } else { min });
        self.smallest_index = index;
        self.smallest_bytes = bytes.max(MIN_TRACKED_GAP_BYTES);
    }

    /// Claim room for an object of `size` bytes (a multiple of [`MIN_OBJECT_SIZE`]).
    ///
    /// A gap of exactly `size` bytes is consumed whole. Otherwise a gap that can keep at
    /// least a placeholder header after giving away `size` bytes is split, and the object
    /// takes its tail.
    pub fn claim(&mut self, size: usize) -> Option<GapFit> {
        let mut fit = None;
        for slot in self.slots.iter_mut() {
            let Some(gap) = slot.as_mut() else {
                continue;
            };
            if gap.bytes == size {
                fit = Some(GapFit::Exact { object: gap.start });
                *slot = None;
                break;
            } else if gap.bytes >= size + ARRAY_OVERHEAD {
                gap.bytes -= size;
                fit = Some(GapFit::Split {
                    object: gap.end(),
                    remainder: *gap,
                });
                break;
            }
        }
        if fit.is_some() {
            self.refresh_smallest();
        }
        fit
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn contains_start(&self, start: Address) -> bool {
        self.gaps().any(|gap| gap.start == start)
    }

    /// Start addresses of the tracked gaps.
    pub fn starts(&self) -> Vec<Address> {
        self.gaps().map(|gap| gap.start).collect()
    }

    pub fn gaps(&self) -> impl Iterator<Item = Gap> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn total_bytes(&self) -> usize {
        self.gaps().map(|gap| gap.bytes).sum()
    }

    /// The size below which an offered gap is rejected.
    pub fn threshold(&self) -> usize {
        self.smallest_bytes
    }
}
