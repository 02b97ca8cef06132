//! Mark phase.

use crate::plan::FieldOffsetTable;
use crate::util::constants::*;
use crate::util::heap::Arena;
use crate::util::{Address, ObjectReference};
use crate::vm::{ClassModel, ObjectModel, RootVisitor, Scanning};

/// Transitive closure over the object graph with an explicit mark stack.
///
/// An object is stamped with the current generation when it is first reached and pushed
/// once, so cycles and shared children cost one header read per extra visit.
pub struct Tracer<'a, C: ClassModel> {
    model: ObjectModel<'a, C>,
    fields: &'a FieldOffsetTable,
    generation: u8,
    mark_stack: &'a mut Vec<ObjectReference>,
    marked: usize,
}

impl<'a, C: ClassModel> Tracer<'a, C> {
    pub fn new(
        model: ObjectModel<'a, C>,
        fields: &'a FieldOffsetTable,
        generation: u8,
        mark_stack: &'a mut Vec<ObjectReference>,
    ) -> Self {
        debug_assert!(mark_stack.is_empty());
        Tracer {
            model,
            fields,
            generation,
            mark_stack,
            marked: 0,
        }
    }

    /// Mark `object` if it is a dynamic instance not yet marked in this generation.
    pub fn trace_object(&mut self, object: Option<ObjectReference>) {
        let Some(object) = object else {
            return;
        };
        let addr = object.to_raw_address();
        // Static and constant data is never collected.
        if !self.model.arena().is_dynamic_instance(addr) {
            return;
        }
        if self.model.mark(addr) == self.generation {
            return;
        }
        let class = self.model.class_id(addr);
        self.model.validate_class_id(addr, class);
        self.model.write_mark(addr, self.generation);
        self.marked += 1;
        self.mark_stack.push(object);
    }

    /// Scan objects until the mark stack is empty.
    pub fn process_mark_stack(&mut self) {
        while let Some(object) = self.mark_stack.pop() {
            self.scan_object(object);
        }
    }

    fn scan_object(&mut self, object: ObjectReference) {
        let addr = object.to_raw_address();
        let class = self.model.class_id(addr);
        if class == class_ids::OBJECT_ARRAY {
            let length = self.model.array_length(addr);
            debug_assert!(length >= 0);
            let elements = addr + ARRAY_OVERHEAD;
            for i in 0..length as usize {
                let slot = elements + (i << LOG_BYTES_IN_ADDRESS);
                self.trace_object(self.model.arena().load_reference(slot));
            }
        } else {
            let fields = self.fields;
            for &offset in fields.instance_fields(class) {
                self.trace_object(self.model.read_ref(object, offset));
            }
        }
    }

    /// Number of objects marked by this tracer.
    pub fn marked(&self) -> usize {
        self.marked
    }
}

impl<C: ClassModel> RootVisitor for Tracer<'_, C> {
    fn visit_root(&mut self, object: ObjectReference) {
        self.trace_object(Some(object));
    }
}

/// Mark everything reachable from the static reference slots and the host roots with
/// `generation`. Returns the number of newly marked objects.
pub fn mark_reachable<C: ClassModel, S: Scanning>(
    model: ObjectModel<'_, C>,
    fields: &FieldOffsetTable,
    scanning: &S,
    generation: u8,
    mark_stack: &mut Vec<ObjectReference>,
) -> usize {
    let arena = model.arena();
    debug!(
        "Traversing static instances: [{}, {}), {} static fields",
        arena.allocation_start(),
        arena.next_ptr(),
        fields.static_slots().len()
    );
    let mut tracer = Tracer::new(model, fields, generation, mark_stack);
    for &slot in fields.static_slots() {
        tracer.trace_object(arena.read_static_ref(slot));
        tracer.process_mark_stack();
    }
    trace!("Finished static roots, {} objects marked", tracer.marked());
    scanning.scan_external_roots(&mut tracer);
    tracer.process_mark_stack();
    tracer.marked()
}

/// Reset the generation stamp of every object in `[allocation_start, next_ptr)` to 0.
/// Used when the generation counter wraps, so stamps from 255 cycles ago cannot alias
/// the new generation.
pub fn clear_all_marks<C: ClassModel>(model: ObjectModel<'_, C>, end: Address) -> usize {
    let mut cursor = model.arena().allocation_start();
    let mut objects = 0;
    while cursor < end {
        let size = model.instance_size(cursor);
        model.write_mark(cursor, 0);
        cursor += size;
        objects += 1;
    }
    assert_eq!(cursor, end, "Object walk overran the frontier");
    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::fixtures::TestArena;
    use crate::util::test_util::mock_vm::*;

    #[test]
    fn marks_reachable_graph_only() {
        let mut t = TestArena::new(|classes| {
            classes.add_object_class(2);
            classes.add_static_class(1);
        });
        let node = 10;
        let statics = 11;
        let a = t.alloc_instance(node);
        let b = t.alloc_instance(node);
        let c = t.alloc_instance(node);
        let garbage = t.alloc_instance(node);
        t.link(a, 0, b);
        t.link(a, 1, c);
        t.link(b, 0, c);
        t.link(garbage, 0, a);
        t.set_static(statics, 0, Some(a));

        let marked = t.mark(1);
        assert_eq!(marked, 3);
        for o in [a, b, c] {
            assert_eq!(t.mark_of(o), 1);
        }
        assert_eq!(t.mark_of(garbage), 0);
    }

    #[test]
    fn cycles_terminate() {
        let mut t = TestArena::new(|classes| {
            classes.add_object_class(1);
        });
        let a = t.alloc_instance(10);
        let b = t.alloc_instance(10);
        t.link(a, 0, b);
        t.link(b, 0, a);
        t.scanning.add_root(a);
        assert_eq!(t.mark(1), 2);
        // Already stamped: a second pass in the same generation marks nothing.
        assert_eq!(t.mark(1), 0);
        assert_eq!(t.mark(2), 2);
    }

    #[test]
    fn object_array_elements() {
        let mut t = TestArena::new(|classes| {
            classes.add_object_class(0);
        });
        let array = t.alloc_array(class_ids::OBJECT_ARRAY, 3);
        let x = t.alloc_instance(10);
        let y = t.alloc_instance(10);
        t.set_element(array, 0, Some(x));
        t.set_element(array, 2, Some(y));
        t.scanning.add_root(array);
        assert_eq!(t.mark(1), 3);
        assert_eq!(t.mark_of(x), 1);
        assert_eq!(t.mark_of(y), 1);
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let mut t = TestArena::with_pages(
            |classes| {
                classes.add_object_class(1);
            },
            64,
        );
        let head = t.alloc_instance(10);
        let mut tail = head;
        for _ in 0..100_000 {
            let next = t.alloc_instance(10);
            t.link(tail, 0, next);
            tail = next;
        }
        t.scanning.add_root(head);
        assert_eq!(t.mark(1), 100_001);
    }

    #[test]
    fn pointers_below_allocation_start_are_ignored() {
        let mut t = TestArena::new(|classes| {
            classes.add_object_class(1);
        });
        let a = t.alloc_instance(10);
        let below = ObjectReference::from_raw_address(Address::from_usize(STATIC_DATA_START)).unwrap();
        t.link(a, 0, below);
        t.scanning.add_root(a);
        assert_eq!(t.mark(1), 1);
    }

    #[test]
    #[should_panic(expected = "Invalid class ID")]
    fn corrupt_header_is_fatal() {
        let mut t = TestArena::new(|classes| {
            classes.add_object_class(1);
        });
        let a = t.alloc_instance(10);
        let b = t.alloc_instance(10);
        t.link(a, 0, b);
        t.arena.store_u32(b.to_raw_address(), 0x00ff_fff0);
        t.scanning.add_root(a);
        t.mark(1);
    }

    #[test]
    fn clear_marks_after_wrap() {
        let mut t = TestArena::new(|classes| {
            classes.add_object_class(1);
        });
        let a = t.alloc_instance(10);
        let b = t.alloc_instance(10);
        t.scanning.add_root(a);
        t.scanning.add_root(b);
        t.mark(200);
        assert_eq!(t.clear_marks(), 2);
        assert_eq!(t.mark_of(a), 0);
        assert_eq!(t.mark_of(b), 0);
    }
}
