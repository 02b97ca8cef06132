//! Collection: the field table, the mark phase, and the orchestration of cycles.

pub mod collector;
pub mod field_table;
pub mod parallel;
pub mod tracing;

pub use self::field_table::FieldOffsetTable;
pub use self::parallel::SweepThread;
