// Some tests are conditionally compiled. So not all the code in this module will be used. We simply allow dead code in this module.
#![allow(dead_code)]

use crate::heap::{Heap, HeapBuilder};
use crate::memory_manager;
use crate::plan::tracing;
use crate::plan::FieldOffsetTable;
use crate::util::constants::*;
use crate::util::heap::Arena;
use crate::util::options::Options;
use crate::util::reference_processor::WeakRefTable;
use crate::util::test_util::mock_vm::*;
use crate::util::{Address, ObjectReference};
use crate::vm::{array_size, ClassId, ClassLayout, ClassModel, ObjectModel};

/// An arena with a mock class table and a simple bump allocator, for testing the mark
/// and sweep phases without a full heap.
pub struct TestArena {
    pub arena: Arena,
    pub classes: MockClassModel,
    pub scanning: MockScanning,
    pub fields: FieldOffsetTable,
    pub weak_refs: WeakRefTable,
    pub mark_stack: Vec<ObjectReference>,
    /// The generation of the last mark. New objects are stamped with it.
    pub generation: u8,
}

impl TestArena {
    /// Builtin classes are 0..=9; classes added by `setup` get ids from 10.
    pub fn new<F: FnOnce(&mut MockClassModel)>(setup: F) -> Self {
        Self::with_pages(setup, 4)
    }

    pub fn with_pages<F: FnOnce(&mut MockClassModel)>(setup: F, pages: usize) -> Self {
        let mut classes = MockClassModel::builtin();
        setup(&mut classes);
        let fields = FieldOffsetTable::new(&classes);
        TestArena {
            arena: Arena::new(1, pages, classes.static_data_bytes()),
            classes,
            scanning: MockScanning::default(),
            fields,
            weak_refs: WeakRefTable::new(),
            mark_stack: vec![],
            generation: 0,
        }
    }

    pub fn model(&self) -> ObjectModel<'_, MockClassModel> {
        ObjectModel::new(&self.arena, &self.classes)
    }

    fn bump(&self, size: usize) -> Address {
        let guard = self.arena.lock();
        let start = self.arena.next_ptr();
        let end = start + size;
        while end.as_usize() > self.arena.committed_bytes() {
            assert!(self.arena.grow(&guard, 1), "test arena is full");
        }
        self.arena.set_next_ptr(&guard, end);
        self.arena.zero(start, size);
        start
    }

    pub fn alloc_instance(&self, class: ClassId) -> ObjectReference {
        let ClassLayout::Scalar { size } = self.classes.class_layout(class) else {
            panic!("class {} is an array class", class);
        };
        let start = self.bump(crate::util::conversions::raw_align_up(size, MIN_OBJECT_SIZE));
        self.model().write_header(start, class, self.generation);
        ObjectReference::from_raw_address(start).unwrap()
    }

    pub fn alloc_array(&self, class: ClassId, length: usize) -> ObjectReference {
        let ClassLayout::Array { log_element_size } = self.classes.class_layout(class) else {
            panic!("class {} is not an array class", class);
        };
        let start = self.bump(array_size(length, log_element_size));
        self.model().write_header(start, class, self.generation);
        self.model().write_array_length(start, length as i32);
        ObjectReference::from_raw_address(start).unwrap()
    }

    /// Store `to` into reference field `index` of a mock object class.
    pub fn link(&self, from: ObjectReference, index: usize, to: ObjectReference) {
        self.arena
            .write_ref(from, FIRST_FIELD_OFFSET + index * BYTES_IN_ADDRESS, Some(to));
    }

    pub fn set_element(&self, array: ObjectReference, index: usize, value: Option<ObjectReference>) {
        self.arena.write_ref(
            array,
            ARRAY_OVERHEAD + index * BYTES_IN_ADDRESS,
            value,
        );
    }

    pub fn set_static(&self, class: ClassId, index: usize, value: Option<ObjectReference>) {
        self.arena
            .write_static_ref(self.classes.static_slot(class, index), value);
    }

    /// Mark from the roots with `generation`. Returns the number of objects marked.
    pub fn mark(&mut self, generation: u8) -> usize {
        self.generation = generation;
        tracing::mark_reachable(
            ObjectModel::new(&self.arena, &self.classes),
            &self.fields,
            &self.scanning,
            generation,
            &mut self.mark_stack,
        )
    }

    pub fn mark_of(&self, object: ObjectReference) -> u8 {
        self.model().mark(object.to_raw_address())
    }

    pub fn clear_marks(&self) -> usize {
        tracing::clear_all_marks(self.model(), self.arena.next_ptr())
    }

    /// Sizes of all objects from the allocation start to the frontier.
    pub fn walk(&self) -> Vec<usize> {
        walk_sizes(self.model())
    }
}

pub fn walk_sizes<C: ClassModel>(model: ObjectModel<'_, C>) -> Vec<usize> {
    let arena = model.arena();
    let mut sizes = vec![];
    let mut cursor = arena.allocation_start();
    while cursor < arena.next_ptr() {
        let size = model.instance_size(cursor);
        sizes.push(size);
        cursor += size;
    }
    sizes
}

/// A heap over the mock binding with three extra classes.
pub struct TestHeap {
    pub heap: Heap<MockVM>,
    /// Two reference fields, 24 bytes on 64-bit targets.
    pub node: ClassId,
    /// No reference fields, 32 bytes.
    pub leaf: ClassId,
    /// Four static reference slots.
    pub statics: ClassId,
}

impl TestHeap {
    pub fn new() -> Self {
        Self::with_options(|_| {})
    }

    pub fn with_options<F: FnOnce(&mut Options)>(f: F) -> Self {
        let mut classes = MockClassModel::builtin();
        let node = classes.add_object_class(2);
        let leaf = classes.add_class(32, Some(class_ids::OBJECT), vec![]);
        let statics = classes.add_static_class(4);

        let mut builder = HeapBuilder::without_env();
        builder.options.initial_heap_pages = 1;
        builder.options.max_heap_pages = 64;
        f(&mut builder.options);
        let heap = memory_manager::gc_init::<MockVM>(
            &builder,
            classes,
            MockScanning::default(),
            MockCollection::default(),
        );
        TestHeap {
            heap,
            node,
            leaf,
            statics,
        }
    }

    pub fn alloc(&self, class: ClassId) -> ObjectReference {
        memory_manager::alloc_instance(&self.heap, class).unwrap()
    }

    pub fn link(&self, from: ObjectReference, index: usize, to: Option<ObjectReference>) {
        self.heap
            .arena()
            .write_ref(from, FIRST_FIELD_OFFSET + index * BYTES_IN_ADDRESS, to);
    }

    pub fn set_static(&self, index: usize, value: Option<ObjectReference>) {
        let slot = self.heap.classes().static_slot(self.statics, index);
        self.heap.arena().write_static_ref(slot, value);
    }

    pub fn root(&self, object: ObjectReference) {
        self.heap.scanning().add_root(object);
    }

    pub fn class_of(&self, object: ObjectReference) -> ClassId {
        self.heap.object_model().class_id(object.to_raw_address())
    }

    pub fn walk(&self) -> Vec<usize> {
        walk_sizes(self.heap.object_model())
    }
}

impl Default for TestHeap {
    fn default() -> Self {
        Self::new()
    }
}
