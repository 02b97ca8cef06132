use crate::util::constants::*;
use crate::util::Address;
use crate::vm::{ClassId, ClassLayout, ClassModel};

/// Offsets of the traced reference fields of every class, and the addresses of every
/// traced static reference slot. Built once when the heap is created and never changed.
pub struct FieldOffsetTable {
    /// Per class: inherited offsets first, then the class's own. Classes without reference
    /// fields hold an empty slice, which does not allocate.
    instance: Vec<Box<[usize]>>,
    statics: Box<[Address]>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Resolution {
    Pending,
    InProgress,
    Done,
}

impl FieldOffsetTable {
    pub fn new<C: ClassModel>(classes: &C) -> Self {
        info!("Creating GC field table for {} classes", classes.num_classes());
        check_builtin_classes(classes);

        let num_classes = classes.num_classes();
        let mut table = FieldOffsetTable {
            instance: (0..num_classes).map(|_| Box::default()).collect(),
            statics: Box::default(),
        };
        let mut state = vec![Resolution::Pending; num_classes];
        for class in 0..num_classes {
            table.resolve(classes, class as ClassId, &mut state);
        }

        let mut statics = vec![];
        for class in 0..num_classes as ClassId {
            let base = STATIC_DATA_START + classes.static_field_base(class);
            statics.extend(
                classes
                    .fields(class)
                    .iter()
                    .filter(|f| f.is_static && f.is_collectable())
                    .map(|f| Address::from_usize(base + f.offset)),
            );
        }
        table.statics = statics.into_boxed_slice();

        assert_eq!(table.instance.len(), num_classes);
        debug!(
            "GC field table: {} classes with reference fields, {} static reference fields",
            table.instance.iter().filter(|o| !o.is_empty()).count(),
            table.statics.len()
        );
        table
    }

    // Resolves the superclass chain iteratively so deep hierarchies do not recurse.
    fn resolve<C: ClassModel>(&mut self, classes: &C, class: ClassId, state: &mut [Resolution]) {
        let mut chain = vec![];
        let mut next = Some(class);
        while let Some(c) = next {
            match state[c as usize] {
                Resolution::Done => break,
                Resolution::InProgress => {
                    panic!("Superclass cycle through class {}", c)
                }
                Resolution::Pending => {
                    state[c as usize] = Resolution::InProgress;
                    chain.push(c);
                    next = classes.super_class_id(c);
                    if let Some(s) = next {
                        assert!(
                            (s as usize) < classes.num_classes(),
                            "Class {} has an invalid superclass {}",
                            c,
                            s
                        );
                    }
                }
            }
        }
        // Superclasses are at the end of the chain.
        for &c in chain.iter().rev() {
            let own = classes
                .fields(c)
                .iter()
                .filter(|f| !f.is_static && f.is_collectable())
                .map(|f| f.offset);
            let offsets: Vec<usize> = match classes.super_class_id(c) {
                Some(s) => self.instance[s as usize].iter().copied().chain(own).collect(),
                None => own.collect(),
            };
            if !offsets.is_empty() {
                self.instance[c as usize] = offsets.into_boxed_slice();
            }
            state[c as usize] = Resolution::Done;
        }
    }

    /// Reference field offsets of instances of `class`.
    pub fn instance_fields(&self, class: ClassId) -> &[usize] {
        &self.instance[class as usize]
    }

    /// Addresses of all static reference slots.
    pub fn static_slots(&self) -> &[Address] {
        &self.statics
    }

    pub fn num_classes(&self) -> usize {
        self.instance.len()
    }
}

fn check_builtin_classes<C: ClassModel>(classes: &C) {
    assert!(
        classes.num_classes() > class_ids::LAST_ARRAY as usize,
        "The class table must contain the built-in array classes"
    );
    for class in class_ids::FIRST_ARRAY..=class_ids::LAST_ARRAY {
        assert!(
            matches!(classes.class_layout(class), ClassLayout::Array { .. }),
            "Built-in class {} must be an array class",
            class
        );
    }
    assert_eq!(
        classes.class_layout(class_ids::BYTE_ARRAY),
        ClassLayout::Array {
            log_element_size: 0
        },
        "Placeholder class must be a byte array"
    );
    assert_eq!(
        classes.class_layout(class_ids::OBJECT_ARRAY),
        ClassLayout::Array {
            log_element_size: LOG_BYTES_IN_ADDRESS
        },
        "Object array elements must be reference-sized"
    );
    // The sweep and the heap walks advance by the object size, so it must cover the header.
    for class in 0..classes.num_classes() as ClassId {
        if let ClassLayout::Scalar { size } = classes.class_layout(class) {
            assert!(
                size >= OBJECT_OVERHEAD,
                "Class {} is {} bytes, smaller than the {} byte object header",
                class,
                size,
                OBJECT_OVERHEAD
            );
        }
    }
}
