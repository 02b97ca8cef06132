use super::linear_memory::LinearMemory;
use crate::util::constants::*;
use crate::util::conversions::{pages_covering, pages_to_bytes};
use crate::util::{Address, ObjectReference};
use atomic::{Atomic, Ordering};
use std::sync::{Mutex, MutexGuard};

/// The single growable region holding the static-storage block and every object.
///
/// ```text
/// 0         STATIC_DATA_START        allocation_start           next_ptr      committed
/// | null word | static reference slots | objects and placeholders | free ...  |
/// ```
///
/// `[allocation_start, next_ptr)` is a gapless concatenation of object records. The
/// frontier may only be moved while holding the allocation lock.
pub struct Arena {
    memory: LinearMemory,
    allocation_start: Address,
    next_ptr: Atomic<Address>,
    alloc_lock: Mutex<()>,
}

impl Arena {
    pub fn new(initial_pages: usize, max_pages: usize, static_data_bytes: usize) -> Self {
        let allocation_start =
            Address::from_usize(STATIC_DATA_START + static_data_bytes).align_up(MIN_OBJECT_SIZE);
        // The static block must be usable before the first allocation.
        let initial_pages = initial_pages.max(pages_covering(allocation_start));
        assert!(
            initial_pages <= max_pages,
            "The static data ({} bytes) does not fit in {} pages",
            static_data_bytes,
            max_pages
        );
        Arena {
            memory: LinearMemory::new(initial_pages, max_pages),
            allocation_start,
            next_ptr: Atomic::new(allocation_start),
            alloc_lock: Mutex::new(()),
        }
    }

    /// The first address that can hold a dynamically allocated object.
    pub fn allocation_start(&self) -> Address {
        self.allocation_start
    }

    /// The allocation frontier.
    pub fn next_ptr(&self) -> Address {
        self.next_ptr.load(Ordering::SeqCst)
    }

    /// Acquire the allocation lock. Frontier moves and arena growth happen under it.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.alloc_lock.lock().unwrap()
    }

    /// Move the frontier. Requires the allocation lock.
    pub fn set_next_ptr(&self, _guard: &MutexGuard<'_, ()>, next_ptr: Address) {
        debug_assert!(next_ptr >= self.allocation_start);
        debug_assert!(next_ptr.as_usize() <= self.committed_bytes());
        self.next_ptr.store(next_ptr, Ordering::SeqCst);
    }

    /// Commit `pages` more pages. Requires the allocation lock.
    pub fn grow(&self, _guard: &MutexGuard<'_, ()>, pages: usize) -> bool {
        self.memory.grow(pages)
    }

    pub fn committed_pages(&self) -> usize {
        self.memory.committed_pages()
    }

    pub fn committed_bytes(&self) -> usize {
        pages_to_bytes(self.committed_pages())
    }

    pub fn max_pages(&self) -> usize {
        self.memory.reserved_pages()
    }

    /// Bytes between the allocation start and the frontier.
    pub fn used_bytes(&self) -> usize {
        self.next_ptr() - self.allocation_start
    }

    /// Is `addr` inside the dynamically allocated part of the arena? Null and addresses of
    /// static or constant data are not.
    pub fn is_dynamic_instance(&self, addr: Address) -> bool {
        addr >= self.allocation_start
    }

    pub fn load_u8(&self, addr: Address) -> u8 {
        unsafe { self.memory.ptr(addr.as_usize(), 1).read() }
    }

    pub fn store_u8(&self, addr: Address, value: u8) {
        unsafe { self.memory.ptr(addr.as_usize(), 1).write(value) }
    }

    pub fn load_u32(&self, addr: Address) -> u32 {
        unsafe {
            self.memory
                .ptr(addr.as_usize(), 4)
                .cast::<u32>()
                .read_unaligned()
        }
    }

    pub fn store_u32(&self, addr: Address, value: u32) {
        unsafe {
            self.memory
                .ptr(addr.as_usize(), 4)
                .cast::<u32>()
                .write_unaligned(value)
        }
    }

    pub fn load_i32(&self, addr: Address) -> i32 {
        self.load_u32(addr) as i32
    }

    pub fn store_i32(&self, addr: Address, value: i32) {
        self.store_u32(addr, value as u32)
    }

    pub fn load_word(&self, addr: Address) -> usize {
        unsafe {
            self.memory
                .ptr(addr.as_usize(), BYTES_IN_ADDRESS)
                .cast::<usize>()
                .read_unaligned()
        }
    }

    pub fn store_word(&self, addr: Address, value: usize) {
        unsafe {
            self.memory
                .ptr(addr.as_usize(), BYTES_IN_ADDRESS)
                .cast::<usize>()
                .write_unaligned(value)
        }
    }

    /// Zero `[start, start + bytes)`.
    pub fn zero(&self, start: Address, bytes: usize) {
        if bytes == 0 {
            return;
        }
        unsafe { std::ptr::write_bytes(self.memory.ptr(start.as_usize(), bytes), 0, bytes) }
    }

    /// Read the reference slot at `slot`. A zero word is null.
    pub fn load_reference(&self, slot: Address) -> Option<ObjectReference> {
        ObjectReference::from_raw_address(Address::from_usize(self.load_word(slot)))
    }

    pub fn store_reference(&self, slot: Address, value: Option<ObjectReference>) {
        self.store_word(slot, ObjectReference::slot_value(value))
    }

    /// Read the reference field at `offset` bytes into `object`.
    pub fn read_ref(&self, object: ObjectReference, offset: usize) -> Option<ObjectReference> {
        self.load_reference(object.to_raw_address() + offset)
    }

    pub fn write_ref(&self, object: ObjectReference, offset: usize, value: Option<ObjectReference>) {
        self.store_reference(object.to_raw_address() + offset, value)
    }

    /// Read a static reference slot. `slot` is an absolute arena address inside the static block.
    pub fn read_static_ref(&self, slot: Address) -> Option<ObjectReference> {
        debug_assert!(slot >= Address::from_usize(STATIC_DATA_START) && slot < self.allocation_start);
        self.load_reference(slot)
    }

    pub fn write_static_ref(&self, slot: Address, value: Option<ObjectReference>) {
        debug_assert!(slot >= Address::from_usize(STATIC_DATA_START) && slot < self.allocation_start);
        self.store_reference(slot, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_start_follows_static_data() {
        let arena = Arena::new(1, 4, 20);
        assert_eq!(arena.allocation_start(), Address::from_usize(32));
        assert_eq!(arena.next_ptr(), arena.allocation_start());
        assert_eq!(arena.used_bytes(), 0);
        assert!(!arena.is_dynamic_instance(Address::ZERO));
        assert!(!arena.is_dynamic_instance(Address::from_usize(STATIC_DATA_START)));
        assert!(arena.is_dynamic_instance(Address::from_usize(32)));
    }

    #[test]
    fn large_static_block_is_committed() {
        let arena = Arena::new(1, 4, BYTES_IN_PAGE);
        assert_eq!(arena.committed_pages(), 2);
    }

    #[test]
    fn accessors() {
        let arena = Arena::new(1, 1, 0);
        let addr = Address::from_usize(64);
        arena.store_u32(addr, 0xab00_0005);
        assert_eq!(arena.load_u8(addr + GC_BYTE_OFFSET), 0xab);
        arena.store_i32(addr + 4, -2);
        assert_eq!(arena.load_i32(addr + 4), -2);
        arena.zero(addr, 8);
        assert_eq!(arena.load_u32(addr), 0);
        assert_eq!(arena.load_i32(addr + 4), 0);
    }

    #[test]
    fn reference_slots() {
        let arena = Arena::new(1, 1, 16);
        let slot = Address::from_usize(STATIC_DATA_START);
        assert_eq!(arena.read_static_ref(slot), None);
        let object = ObjectReference::from_raw_address(Address::from_usize(0x40)).unwrap();
        arena.write_static_ref(slot, Some(object));
        assert_eq!(arena.read_static_ref(slot), Some(object));
        arena.write_ref(object, 8, Some(object));
        assert_eq!(arena.read_ref(object, 8), Some(object));
        arena.write_ref(object, 8, None);
        assert_eq!(arena.read_ref(object, 8), None);
    }

    #[test]
    fn frontier_moves_under_lock() {
        let arena = Arena::new(1, 2, 0);
        let guard = arena.lock();
        assert!(arena.grow(&guard, 1));
        assert!(!arena.grow(&guard, 1));
        arena.set_next_ptr(&guard, Address::from_usize(BYTES_IN_PAGE + 8));
        drop(guard);
        assert_eq!(arena.next_ptr(), Address::from_usize(BYTES_IN_PAGE + 8));
    }
}
