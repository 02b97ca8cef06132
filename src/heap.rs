use crate::global_state::CollectorState;
use crate::plan::FieldOffsetTable;
use crate::policy::Gap;
use crate::util::heap::Arena;
use crate::util::options::Options;
use crate::util::reference_processor::WeakRefTable;
use crate::vm::{ClassModel, ObjectModel, VMBinding};

/// Heap builder. Holds the options before the heap is created.
///
/// The builder reads `ARENAGC_` environment variables unless it is created with
/// [`HeapBuilder::without_env`]. Options can then be changed directly through
/// [`HeapBuilder::options`] or by name with [`HeapBuilder::set_option`].
pub struct HeapBuilder {
    pub options: Options,
}

impl HeapBuilder {
    /// Create a builder with options read from the environment.
    pub fn new() -> Self {
        HeapBuilder {
            options: Options::default(),
        }
    }

    /// Create a builder with the built-in default options only.
    pub fn without_env() -> Self {
        HeapBuilder {
            options: Options::without_env(),
        }
    }

    /// Set an option by name. Returns false if the value is rejected.
    pub fn set_option(&mut self, name: &str, val: &str) -> bool {
        self.options.set_from_str(name, val)
    }

    /// Create a heap over the given host collaborators. Panics if the options are
    /// inconsistent or the class model lacks the built-in classes.
    pub fn build<VM: VMBinding>(
        &self,
        classes: VM::VMClassModel,
        scanning: VM::VMScanning,
        collection: VM::VMCollection,
    ) -> Heap<VM> {
        assert!(self.options.validate(), "Invalid heap options: {:?}", self.options);
        let field_table = FieldOffsetTable::new(&classes);
        let arena = Arena::new(
            self.options.initial_heap_pages,
            self.options.max_heap_pages,
            classes.static_data_bytes(),
        );
        Heap {
            options: self.options.clone(),
            arena,
            classes,
            scanning,
            collection,
            field_table,
            weak_refs: WeakRefTable::new(),
            state: CollectorState::new(),
        }
    }
}

impl Default for HeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A garbage-collected heap: the arena, the host collaborators, and the collector state.
///
/// All entry points take `&self`. At most two contexts may drive one heap at a time: a
/// primary context that allocates and orchestrates, and a secondary context that runs a
/// parallel sweep. See [`crate::memory_manager`].
pub struct Heap<VM: VMBinding> {
    options: Options,
    arena: Arena,
    classes: VM::VMClassModel,
    scanning: VM::VMScanning,
    collection: VM::VMCollection,
    field_table: FieldOffsetTable,
    weak_refs: WeakRefTable,
    state: CollectorState,
}

impl<VM: VMBinding> Heap<VM> {
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn classes(&self) -> &VM::VMClassModel {
        &self.classes
    }

    pub fn scanning(&self) -> &VM::VMScanning {
        &self.scanning
    }

    pub fn collection(&self) -> &VM::VMCollection {
        &self.collection
    }

    pub fn object_model(&self) -> ObjectModel<'_, VM::VMClassModel> {
        ObjectModel::new(&self.arena, &self.classes)
    }

    pub fn field_table(&self) -> &FieldOffsetTable {
        &self.field_table
    }

    pub fn weak_refs(&self) -> &WeakRefTable {
        &self.weak_refs
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    /// The generation stamp of the current or last cycle.
    pub fn generation(&self) -> u8 {
        self.state.generation()
    }

    /// Completed collection cycles.
    pub fn cycles(&self) -> usize {
        self.state.cycles()
    }

    /// A copy of the published gap table entries.
    pub fn largest_gaps(&self) -> Vec<Gap> {
        self.state.largest_gaps.lock().unwrap().gaps().collect()
    }
}
