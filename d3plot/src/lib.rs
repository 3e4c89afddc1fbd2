//! This library implements types and functions to read LS-DYNA "d3plot"
//! result databases: families of binary files holding a static mesh
//! description followed by any number of state records.
//!
//! A database is opened with [`database::D3plotDatabase::open`], which finds
//! every file of the family, detects its word size and byte order, indexes
//! every timestep and groups cells into parts by type and material. Field
//! data is then loaded one timestep at a time.
//!
//! The layers underneath (the word stream over the files, the control
//! dictionary, the timestep index and the part assembler) are public too,
//! for tools that want to poke at a database at a lower level.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![allow(clippy::needless_return)]

pub mod cells;
pub mod control;
pub mod database;
pub mod error;
pub mod family;
pub mod parts;
pub mod sources;
pub mod timesteps;
pub mod util;

/// Re-exports the types most users need.
pub mod prelude {
  pub use crate::cells::{CellKind, CellType};
  pub use crate::control::{Binding, ControlDictionary, DeletionMode};
  pub use crate::database::{D3plotDatabase, DatabaseSummary, OpenOptions};
  pub use crate::error::{D3plotError, D3Result};
  pub use crate::family::{Family, Section, SectionMark, StorageModel};
  pub use crate::parts::assembly::{ArrayScope, DeletedCells};
  pub use crate::parts::{Column, CompactedPart, Part, PartInfo, PartKey, PointSet, Topology};
  pub use crate::sources::{CellRangeSource, PartNameSource};
  pub use crate::timesteps::{TimeStepIndex, TimeStepRecord};
}

#[cfg(test)]
mod tests;
