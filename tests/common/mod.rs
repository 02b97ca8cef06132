// Each test binary uses a different subset of the helpers.
#![allow(dead_code)]

use arenagc::memory_manager;
use arenagc::util::constants::*;
use arenagc::util::{Address, ObjectReference};
use arenagc::vm::*;
use arenagc::{Heap, HeapBuilder};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Offset of the first reference field of a node.
pub const FIELD_OFFSET: usize = 8;
/// Reference fields per node.
pub const NODE_REFS: usize = 3;
/// Static reference slots usable as roots.
pub const GLOBAL_SLOTS: usize = 8;

/// A node with [`NODE_REFS`] reference fields.
pub const NODE: ClassId = 10;
/// 40 bytes of primitive data.
pub const BLOB: ClassId = 11;
/// Holds the global slots.
pub const GLOBALS: ClassId = 12;

pub fn node_size() -> usize {
    (FIELD_OFFSET + NODE_REFS * BYTES_IN_ADDRESS + MIN_OBJECT_SIZE - 1) & !(MIN_OBJECT_SIZE - 1)
}

/// The class table of a tiny runtime: the built-in classes plus three of its own.
pub struct TinyClasses {
    layouts: Vec<ClassLayout>,
    fields: Vec<Vec<FieldDescriptor>>,
}

impl TinyClasses {
    fn new() -> Self {
        let mut layouts = vec![ClassLayout::Scalar {
            size: OBJECT_OVERHEAD,
        }];
        for class in class_ids::FIRST_ARRAY..=class_ids::LAST_ARRAY {
            let log_element_size = match class {
                class_ids::OBJECT_ARRAY => LOG_BYTES_IN_ADDRESS,
                class_ids::INT_ARRAY | class_ids::FLOAT_ARRAY => 2,
                class_ids::LONG_ARRAY | class_ids::DOUBLE_ARRAY => 3,
                class_ids::CHAR_ARRAY | class_ids::SHORT_ARRAY => 1,
                _ => 0,
            };
            layouts.push(ClassLayout::Array { log_element_size });
        }
        let mut fields = vec![vec![]; layouts.len()];

        layouts.push(ClassLayout::Scalar {
            size: FIELD_OFFSET + NODE_REFS * BYTES_IN_ADDRESS,
        });
        fields.push(
            (0..NODE_REFS)
                .map(|i| {
                    FieldDescriptor::instance(
                        FIELD_OFFSET + i * BYTES_IN_ADDRESS,
                        FieldKind::Reference,
                    )
                })
                .collect(),
        );
        layouts.push(ClassLayout::Scalar { size: 40 });
        fields.push(vec![FieldDescriptor::instance(8, FieldKind::Primitive)]);
        layouts.push(ClassLayout::Scalar {
            size: OBJECT_OVERHEAD,
        });
        fields.push(
            (0..GLOBAL_SLOTS)
                .map(|i| FieldDescriptor::static_field(i * BYTES_IN_ADDRESS, FieldKind::Reference))
                .collect(),
        );
        TinyClasses { layouts, fields }
    }
}

impl ClassModel for TinyClasses {
    fn num_classes(&self) -> usize {
        self.layouts.len()
    }

    fn class_layout(&self, class: ClassId) -> ClassLayout {
        self.layouts[class as usize]
    }

    fn super_class_id(&self, class: ClassId) -> Option<ClassId> {
        (class != class_ids::OBJECT).then_some(class_ids::OBJECT)
    }

    fn fields(&self, class: ClassId) -> &[FieldDescriptor] {
        &self.fields[class as usize]
    }

    fn static_field_base(&self, _class: ClassId) -> usize {
        // GLOBALS is the only class with static fields.
        0
    }

    fn static_data_bytes(&self) -> usize {
        GLOBAL_SLOTS * BYTES_IN_ADDRESS
    }
}

/// Handles held by the embedding host.
#[derive(Default)]
pub struct TinyRoots {
    pub handles: Mutex<Vec<ObjectReference>>,
}

impl Scanning for TinyRoots {
    fn scan_external_roots(&self, visitor: &mut dyn RootVisitor) {
        for handle in self.handles.lock().unwrap().iter() {
            visitor.visit_root(*handle);
        }
    }
}

#[derive(Default)]
pub struct TinyHost {
    pub deny_growth: AtomicBool,
    pub finished: AtomicUsize,
}

impl Collection for TinyHost {
    fn grow_memory(&self, _pages: usize, _committed_pages: usize) -> bool {
        !self.deny_growth.load(Ordering::SeqCst)
    }

    fn collection_finished(&self, cycle: usize) {
        self.finished.store(cycle, Ordering::SeqCst);
    }
}

pub struct TinyVM;

impl VMBinding for TinyVM {
    type VMClassModel = TinyClasses;
    type VMScanning = TinyRoots;
    type VMCollection = TinyHost;
}

pub fn heap() -> Heap<TinyVM> {
    heap_with(|_| {})
}

pub fn heap_with<F: FnOnce(&mut HeapBuilder)>(f: F) -> Heap<TinyVM> {
    let mut builder = HeapBuilder::without_env();
    builder.options.initial_heap_pages = 1;
    builder.options.max_heap_pages = 64;
    builder.options.verify_heap = true;
    f(&mut builder);
    memory_manager::gc_init::<TinyVM>(
        &builder,
        TinyClasses::new(),
        TinyRoots::default(),
        TinyHost::default(),
    )
}

pub fn node(heap: &Heap<TinyVM>) -> ObjectReference {
    memory_manager::alloc_instance(heap, NODE).unwrap()
}

pub fn blob(heap: &Heap<TinyVM>) -> ObjectReference {
    memory_manager::alloc_instance(heap, BLOB).unwrap()
}

pub fn set_field(
    heap: &Heap<TinyVM>,
    object: ObjectReference,
    index: usize,
    value: Option<ObjectReference>,
) {
    assert!(index < NODE_REFS);
    heap.arena()
        .write_ref(object, FIELD_OFFSET + index * BYTES_IN_ADDRESS, value);
}

pub fn field(heap: &Heap<TinyVM>, object: ObjectReference, index: usize) -> Option<ObjectReference> {
    heap.arena()
        .read_ref(object, FIELD_OFFSET + index * BYTES_IN_ADDRESS)
}

pub fn global_slot(index: usize) -> Address {
    assert!(index < GLOBAL_SLOTS);
    Address::from_usize(STATIC_DATA_START + index * BYTES_IN_ADDRESS)
}

pub fn set_global(heap: &Heap<TinyVM>, index: usize, value: Option<ObjectReference>) {
    heap.arena().write_static_ref(global_slot(index), value);
}

pub fn add_handle(heap: &Heap<TinyVM>, object: ObjectReference) {
    heap.scanning().handles.lock().unwrap().push(object);
}

pub fn clear_handles(heap: &Heap<TinyVM>) {
    heap.scanning().handles.lock().unwrap().clear();
}

/// One record of the arena walk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub start: Address,
    pub class: ClassId,
    pub size: usize,
}

impl Record {
    pub fn is_placeholder(&self) -> bool {
        self.class == class_ids::BYTE_ARRAY
    }
}

pub fn walk(heap: &Heap<TinyVM>) -> Vec<Record> {
    let model = heap.object_model();
    let mut records = vec![];
    let mut cursor = heap.arena().allocation_start();
    while cursor < heap.arena().next_ptr() {
        let record = Record {
            start: cursor,
            class: model.class_id(cursor),
            size: model.instance_size(cursor),
        };
        records.push(record);
        cursor += record.size;
    }
    records
}

pub fn class_at(heap: &Heap<TinyVM>, start: Address) -> ClassId {
    heap.object_model().class_id(start)
}

/// How a test drives a collection cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Synchronous,
    Incremental,
    Parallel,
}

pub fn collect(heap: &Heap<TinyVM>, mode: Mode) {
    match mode {
        Mode::Synchronous => memory_manager::invoke_synchronous_collection(heap),
        Mode::Incremental => {
            memory_manager::begin_incremental_collection(heap);
            while !memory_manager::step_incremental_collection(heap) {}
        }
        Mode::Parallel => {
            memory_manager::begin_parallel_mark(heap);
            std::thread::scope(|scope| {
                scope.spawn(|| memory_manager::run_parallel_sweep(heap));
            });
            memory_manager::publish_parallel_result(heap);
        }
    }
}
