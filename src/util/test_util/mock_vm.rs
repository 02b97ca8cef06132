//! A small in-memory class table and host for unit tests.

use crate::util::constants::*;
use crate::util::{Address, ObjectReference};
use crate::vm::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Byte offset of the first reference field of a mock scalar class.
pub const FIRST_FIELD_OFFSET: usize = MIN_OBJECT_SIZE;

struct MockClass {
    layout: ClassLayout,
    super_class: Option<ClassId>,
    fields: Vec<FieldDescriptor>,
    static_base: usize,
}

pub struct MockClassModel {
    classes: Vec<MockClass>,
    static_bytes: usize,
}

impl MockClassModel {
    /// `java.lang.Object` plus the nine built-in array classes.
    pub fn builtin() -> Self {
        let mut model = MockClassModel {
            classes: vec![],
            static_bytes: 0,
        };
        model.push(ClassLayout::Scalar {
            size: OBJECT_OVERHEAD,
        }, None, vec![]);
        for class in class_ids::FIRST_ARRAY..=class_ids::LAST_ARRAY {
            let log_element_size = match class {
                class_ids::OBJECT_ARRAY => LOG_BYTES_IN_ADDRESS,
                class_ids::INT_ARRAY | class_ids::FLOAT_ARRAY => 2,
                class_ids::LONG_ARRAY | class_ids::DOUBLE_ARRAY => 3,
                class_ids::CHAR_ARRAY | class_ids::SHORT_ARRAY => 1,
                _ => 0,
            };
            model.push(
                ClassLayout::Array { log_element_size },
                Some(class_ids::OBJECT),
                vec![],
            );
        }
        model
    }

    fn push(
        &mut self,
        layout: ClassLayout,
        super_class: Option<ClassId>,
        fields: Vec<FieldDescriptor>,
    ) -> ClassId {
        let static_base = self.static_bytes;
        let static_end = fields
            .iter()
            .filter(|f| f.is_static)
            .map(|f| f.offset + BYTES_IN_ADDRESS)
            .max()
            .unwrap_or(0);
        self.static_bytes += static_end;
        self.classes.push(MockClass {
            layout,
            super_class,
            fields,
            static_base,
        });
        (self.classes.len() - 1) as ClassId
    }

    /// Add a scalar class of `size` bytes with the given declared fields.
    pub fn add_class(
        &mut self,
        size: usize,
        super_class: Option<ClassId>,
        fields: Vec<FieldDescriptor>,
    ) -> ClassId {
        self.push(ClassLayout::Scalar { size }, super_class, fields)
    }

    /// Add a subclass of `Object` with `refs` reference fields laid out one word apart from
    /// [`FIRST_FIELD_OFFSET`].
    pub fn add_object_class(&mut self, refs: usize) -> ClassId {
        let fields = (0..refs)
            .map(|i| {
                FieldDescriptor::instance(FIRST_FIELD_OFFSET + i * BYTES_IN_ADDRESS, FieldKind::Reference)
            })
            .collect();
        self.add_class(
            FIRST_FIELD_OFFSET + refs * BYTES_IN_ADDRESS,
            Some(class_ids::OBJECT),
            fields,
        )
    }

    /// Add a class holding `count` static reference fields.
    pub fn add_static_class(&mut self, count: usize) -> ClassId {
        let fields = (0..count)
            .map(|i| FieldDescriptor::static_field(i * BYTES_IN_ADDRESS, FieldKind::Reference))
            .collect();
        self.add_class(OBJECT_OVERHEAD, Some(class_ids::OBJECT), fields)
    }

    /// Absolute arena address of the `index`-th static field of `class`.
    pub fn static_slot(&self, class: ClassId, index: usize) -> Address {
        let class = &self.classes[class as usize];
        let field = class.fields.iter().filter(|f| f.is_static).nth(index).unwrap();
        Address::from_usize(STATIC_DATA_START + class.static_base + field.offset)
    }

    pub fn set_super_class(&mut self, class: ClassId, super_class: Option<ClassId>) {
        self.classes[class as usize].super_class = super_class;
    }

    pub fn set_layout(&mut self, class: ClassId, layout: ClassLayout) {
        self.classes[class as usize].layout = layout;
    }
}

impl ClassModel for MockClassModel {
    fn num_classes(&self) -> usize {
        self.classes.len()
    }

    fn class_layout(&self, class: ClassId) -> ClassLayout {
        self.classes[class as usize].layout
    }

    fn super_class_id(&self, class: ClassId) -> Option<ClassId> {
        self.classes[class as usize].super_class
    }

    fn fields(&self, class: ClassId) -> &[FieldDescriptor] {
        &self.classes[class as usize].fields
    }

    fn static_field_base(&self, class: ClassId) -> usize {
        self.classes[class as usize].static_base
    }

    fn static_data_bytes(&self) -> usize {
        self.static_bytes
    }
}

/// Host roots, set directly by tests.
#[derive(Default)]
pub struct MockScanning {
    roots: Mutex<Vec<ObjectReference>>,
    scans: AtomicUsize,
}

impl MockScanning {
    pub fn add_root(&self, object: ObjectReference) {
        self.roots.lock().unwrap().push(object);
    }

    pub fn remove_root(&self, object: ObjectReference) {
        self.roots.lock().unwrap().retain(|r| *r != object);
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl Scanning for MockScanning {
    fn scan_external_roots(&self, visitor: &mut dyn RootVisitor) {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let roots = self.roots.lock().unwrap().clone();
        for root in roots {
            visitor.visit_root(root);
        }
    }
}

#[derive(Default)]
pub struct MockCollection {
    pub deny_growth: AtomicBool,
    pub grow_requests: AtomicUsize,
    pub finished_cycles: AtomicUsize,
}

impl Collection for MockCollection {
    fn grow_memory(&self, _pages: usize, _committed_pages: usize) -> bool {
        self.grow_requests.fetch_add(1, Ordering::SeqCst);
        !self.deny_growth.load(Ordering::SeqCst)
    }

    fn collection_finished(&self, cycle: usize) {
        self.finished_cycles.store(cycle, Ordering::SeqCst);
    }
}

pub struct MockVM;

impl VMBinding for MockVM {
    type VMClassModel = MockClassModel;
    type VMScanning = MockScanning;
    type VMCollection = MockCollection;
}
