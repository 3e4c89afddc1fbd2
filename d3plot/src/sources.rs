//! This module defines the interfaces to collaborators that live outside of
//! the decoder: something that knows human-readable part names (usually an
//! input deck parser), and something that narrows which cells are
//! materialized (usually a partitioner for distributed execution).

use std::collections::BTreeMap;

use crate::cells::CellType;

/// Supplies part names by user material id.
pub trait PartNameSource {
  /// The name of the part made of a material, if known.
  fn resolve_part_name(&self, material: i64) -> Option<String>;
}

impl PartNameSource for BTreeMap<i64, String> {
  fn resolve_part_name(&self, material: i64) -> Option<String> {
    return self.get(&material).cloned();
  }
}

/// Narrows the cells of each type that get materialized to `[min, max)`,
/// counted within the type's connectivity block.
pub trait CellRangeSource {
  /// The half-open range of cells of a type to materialize.
  fn cell_range(&self, cell_type: CellType) -> (usize, usize);
}

/// Materializes every cell.
#[derive(Copy, Clone, Debug, Default)]
pub struct FullRange;

impl CellRangeSource for FullRange {
  fn cell_range(&self, _cell_type: CellType) -> (usize, usize) {
    return (0, usize::MAX);
  }
}

impl CellRangeSource for BTreeMap<CellType, (usize, usize)> {
  fn cell_range(&self, cell_type: CellType) -> (usize, usize) {
    return self.get(&cell_type).copied().unwrap_or((0, usize::MAX));
  }
}
