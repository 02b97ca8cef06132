//! The binding side of the collector: what the host runtime supplies.
//!
//! A host implements [`VMBinding`] with three collaborators:
//! * [`ClassModel`]: class metadata (sizes, array layouts, superclasses, fields),
//! * [`Scanning`]: roots held outside the arena,
//! * [`Collection`]: arena growth permission and collection callbacks.

mod class_model;
mod collection;
mod object_model;
mod scanning;

pub use self::class_model::{ClassId, ClassLayout, ClassModel, FieldDescriptor, FieldKind};
pub use self::collection::Collection;
pub use self::object_model::{array_size, ObjectModel};
pub use self::scanning::{RootVisitor, Scanning};

/// The `VMBinding` trait associates the collaborator types of one host runtime.
pub trait VMBinding
where
    Self: Sized + 'static + Send + Sync,
{
    type VMClassModel: ClassModel;
    type VMScanning: Scanning;
    type VMCollection: Collection;
}
