//! The sweep policy: finding free gaps between live objects and recording the largest.

pub mod gap_finder;
pub mod gap_table;

pub use self::gap_finder::{SweepMode, Sweeper};
pub use self::gap_table::{Gap, GapFit, GapTable};
