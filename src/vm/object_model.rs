use crate::util::constants::*;
use crate::util::conversions::raw_align_up;
use crate::util::heap::Arena;
use crate::util::{Address, ObjectReference};
use crate::vm::{ClassId, ClassLayout, ClassModel};

/// Reads and writes object headers in the arena.
///
/// ```text
/// offset 0..3  class id (low 24 bits of the first word)
/// offset 3     gc byte: the generation stamp of the last mark that reached the object
/// offset 4..8  element count (arrays only)
/// ```
pub struct ObjectModel<'a, C: ClassModel> {
    arena: &'a Arena,
    classes: &'a C,
}

impl<C: ClassModel> Clone for ObjectModel<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ClassModel> Copy for ObjectModel<'_, C> {}

impl<'a, C: ClassModel> ObjectModel<'a, C> {
    pub fn new(arena: &'a Arena, classes: &'a C) -> Self {
        ObjectModel { arena, classes }
    }

    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    pub fn class_id(&self, object: Address) -> ClassId {
        self.arena.load_u32(object) & CLASS_ID_MASK
    }

    /// The generation stamp of `object`.
    pub fn mark(&self, object: Address) -> u8 {
        self.arena.load_u8(object + GC_BYTE_OFFSET)
    }

    pub fn write_mark(&self, object: Address, generation: u8) {
        self.arena.store_u8(object + GC_BYTE_OFFSET, generation)
    }

    pub fn array_length(&self, object: Address) -> i32 {
        self.arena.load_i32(object + ARRAY_LENGTH_OFFSET)
    }

    pub fn write_array_length(&self, object: Address, length: i32) {
        self.arena.store_i32(object + ARRAY_LENGTH_OFFSET, length)
    }

    /// Write the first header word.
    pub fn write_header(&self, object: Address, class: ClassId, generation: u8) {
        debug_assert!(class & !CLASS_ID_MASK == 0);
        self.arena
            .store_u32(object, class | ((generation as u32) << (GC_BYTE_OFFSET * 8)))
    }

    /// Abort on a class id that does not name a class. Such a header can only come from a
    /// corrupted heap, and nothing read from the arena can be trusted after that.
    pub fn validate_class_id(&self, object: Address, class: ClassId) {
        if class as usize >= self.classes.num_classes() {
            panic!(
                "Invalid class ID {} at {} (number of classes: {})",
                class,
                object,
                self.classes.num_classes()
            );
        }
    }

    /// The size in bytes of the object at `object` of class `class`, rounded up to the object alignment.
    pub fn size_of(&self, object: Address, class: ClassId) -> usize {
        match self.classes.class_layout(class) {
            ClassLayout::Scalar { size } => raw_align_up(size, MIN_OBJECT_SIZE),
            ClassLayout::Array { log_element_size } => {
                let length = self.array_length(object);
                if length < 0 {
                    panic!("Negative array length {} at {} (class {})", length, object, class);
                }
                array_size(length as usize, log_element_size)
            }
        }
    }

    /// Read, validate and size the object at `object`.
    pub fn instance_size(&self, object: Address) -> usize {
        let class = self.class_id(object);
        self.validate_class_id(object, class);
        self.size_of(object, class)
    }

    /// Rewrite `[start, start + bytes)` as a single unmarked byte array.
    pub fn write_placeholder(&self, start: Address, bytes: usize) {
        debug_assert!(bytes >= ARRAY_OVERHEAD && bytes <= MAX_GAP_BYTES);
        debug_assert!(bytes % MIN_OBJECT_SIZE == 0);
        self.write_header(start, class_ids::BYTE_ARRAY, 0);
        self.write_array_length(start, (bytes - ARRAY_OVERHEAD) as i32);
    }

    /// Outgoing reference at `offset` bytes into `object`.
    pub fn read_ref(&self, object: ObjectReference, offset: usize) -> Option<ObjectReference> {
        self.arena.read_ref(object, offset)
    }
}

/// Size in bytes of an array with `length` elements of `1 << log_element_size` bytes.
pub fn array_size(length: usize, log_element_size: u8) -> usize {
    raw_align_up(ARRAY_OVERHEAD + (length << log_element_size), MIN_OBJECT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::mock_vm::MockClassModel;

    #[test]
    fn header_round_trip() {
        let arena = Arena::new(1, 1, 0);
        let classes = MockClassModel::builtin();
        let model = ObjectModel::new(&arena, &classes);
        let object = arena.allocation_start();

        model.write_header(object, class_ids::INT_ARRAY, 7);
        model.write_array_length(object, 3);
        assert_eq!(model.class_id(object), class_ids::INT_ARRAY);
        assert_eq!(model.mark(object), 7);
        model.write_mark(object, 8);
        assert_eq!(model.class_id(object), class_ids::INT_ARRAY);
        assert_eq!(model.mark(object), 8);
        // 8 + 3 * 4 = 20, rounded to 24
        assert_eq!(model.instance_size(object), 24);
    }

    #[test]
    fn placeholder_spans_gap() {
        let arena = Arena::new(1, 1, 0);
        let classes = MockClassModel::builtin();
        let model = ObjectModel::new(&arena, &classes);
        let start = arena.allocation_start();

        model.write_placeholder(start, 48);
        assert_eq!(model.class_id(start), class_ids::BYTE_ARRAY);
        assert_eq!(model.mark(start), 0);
        assert_eq!(model.array_length(start), 40);
        assert_eq!(model.instance_size(start), 48);

        model.write_placeholder(start, ARRAY_OVERHEAD);
        assert_eq!(model.instance_size(start), ARRAY_OVERHEAD);
    }

    #[test]
    fn object_array_uses_pointer_width() {
        assert_eq!(array_size(2, LOG_BYTES_IN_ADDRESS), ARRAY_OVERHEAD + 2 * BYTES_IN_ADDRESS);
        assert_eq!(array_size(0, 3), ARRAY_OVERHEAD);
        assert_eq!(array_size(1, 0), 16);
    }

    #[test]
    #[should_panic(expected = "Invalid class ID")]
    fn corrupt_class_id() {
        let arena = Arena::new(1, 1, 0);
        let classes = MockClassModel::builtin();
        let model = ObjectModel::new(&arena, &classes);
        let object = arena.allocation_start();
        model.write_header(object, 0x00ab_cdef, 0);
        model.instance_size(object);
    }
}
