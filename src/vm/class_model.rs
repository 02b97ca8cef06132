/// Index of a class in the translator's class table.
pub type ClassId = u32;

/// How the size of an instance of a class is computed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassLayout {
    /// A fixed-size instance. `size` includes the object header.
    Scalar { size: usize },
    /// An array. The instance size is the array header plus `length << log_element_size`.
    Array { log_element_size: u8 },
}

/// What a field holds, as far as the collector is concerned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Primitive,
    /// A reference the collector traces.
    Reference,
    /// A reference-sized field the collector must not follow (native handles, raw pointers).
    UntracedReference,
}

/// A field declared by a class (not including inherited fields).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Byte offset from the object start for instance fields, or from the class's static
    /// base for static fields.
    pub offset: usize,
    pub is_static: bool,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub const fn instance(offset: usize, kind: FieldKind) -> Self {
        FieldDescriptor {
            offset,
            is_static: false,
            kind,
        }
    }

    pub const fn static_field(offset: usize, kind: FieldKind) -> Self {
        FieldDescriptor {
            offset,
            is_static: true,
            kind,
        }
    }

    /// Does the collector trace through this field?
    pub fn is_collectable(&self) -> bool {
        self.kind == FieldKind::Reference
    }
}

/// Class metadata produced by the translator. It must be complete before the heap is
/// built and must not change afterwards.
///
/// Class ids `1..=9` are the built-in array classes (see [`crate::util::constants::class_ids`]);
/// the binding has to describe them as arrays with the matching element sizes.
pub trait ClassModel: Send + Sync + 'static {
    /// The number of classes. Valid class ids are `0..num_classes()`.
    fn num_classes(&self) -> usize;

    fn class_layout(&self, class: ClassId) -> ClassLayout;

    /// The direct superclass, or `None` for the root class.
    fn super_class_id(&self, class: ClassId) -> Option<ClassId>;

    /// Fields declared by `class` itself.
    fn fields(&self, class: ClassId) -> &[FieldDescriptor];

    /// Offset of the static storage of `class`, relative to the start of the static block.
    fn static_field_base(&self, class: ClassId) -> usize;

    /// Total size of the static block in bytes.
    fn static_data_bytes(&self) -> usize;
}
