//! arenagc is a mark and sweep garbage collector for bytecode runtimes that keep every
//! object in one growable linear arena.
//!
//! Objects are never moved. The sweep turns every run of dead objects into a single
//! placeholder byte array (a gap), remembers the largest gaps, and the allocator fills
//! them before it moves the arena frontier. Collections run synchronously, incrementally
//! in bounded steps, or with the sweep on a second thread.
//!
//! A runtime binds to the collector by implementing [`vm::VMBinding`], creates a
//! [`Heap`] with [`memory_manager::gc_init`], and uses the functions in
//! [`memory_manager`] from then on.

#[macro_use]
extern crate log;

pub(crate) mod global_state;
pub use global_state::{CollectionPhase, CollectorState};

mod heap;
pub use heap::{Heap, HeapBuilder};

pub mod memory_manager;
pub mod plan;
pub mod policy;
pub mod util;
pub mod vm;
