//! This module implements parts: the mesh regions made of every cell of one
//! type sharing one material, along with their compact topology, the points
//! they use and their field columns.

pub mod assembly;
pub mod points;

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::cells::{CellKind, CellType};
use crate::control::ControlDictionary;
use crate::family::{Family, Section, WordKind, EOF_MARKER};
use crate::prelude::*;
use crate::sources::PartNameSource;

pub use points::{PointSet, UniquePoints};

/// Entity type written before the part titles in the root file.
const PART_TITLES_TYPE: i64 = 90001;
/// Bytes in a part title.
const TITLE_BYTES: usize = 72;

/// Identifies a part: its cell type and internal material id.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
  Hash, derive_more::From
)]
pub struct PartKey {
  /// Type of every cell of the part.
  pub cell_type: CellType,
  /// Internal material id (1-based), or surface number for road surfaces.
  pub material: i64
}

/// Which point pool a part's connectivity refers to.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PointPool {
  /// The global nodes, which carry state data.
  Nodes,
  /// The rigid road nodes, which are static.
  RoadNodes
}

/// A named array of values, `components` per tuple.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Column {
  /// Values per tuple.
  pub components: usize,
  /// The values, tuple after tuple.
  pub values: Vec<f64>
}

impl Column {
  /// A column of `tuples` zeroed tuples.
  pub fn zeroed(components: usize, tuples: usize) -> Self {
    return Self { components, values: vec![0.0; components * tuples] };
  }

  /// Number of tuples.
  pub fn tuples(&self) -> usize {
    if self.components == 0 {
      return 0;
    }
    return self.values.len() / self.components;
  }

  /// One tuple.
  pub fn tuple(&self, i: usize) -> &[f64] {
    return &self.values[i * self.components..(i + 1) * self.components];
  }
}

/// Compact cell topology: kinds and point lists, with connectivity given both
/// in local and in global point numbers.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topology {
  /// Kind of every cell.
  pub kinds: Vec<CellKind>,
  /// Start of every cell's point list, plus one final entry.
  pub offsets: Vec<usize>,
  /// Local point numbers.
  pub connectivity: Vec<usize>,
  /// Global point numbers, as read (0-based).
  pub global_connectivity: Vec<usize>,
  /// Index of every cell within its on-disk connectivity block.
  pub block_ids: Vec<usize>
}

impl Topology {
  /// An empty topology sized for `cells` cells and `entries` point ids.
  pub fn with_capacity(cells: usize, entries: usize) -> Self {
    let mut offsets = Vec::with_capacity(cells + 1);
    offsets.push(0);
    return Self {
      kinds: Vec::with_capacity(cells),
      offsets,
      connectivity: Vec::new(),
      global_connectivity: Vec::with_capacity(entries),
      block_ids: Vec::with_capacity(cells)
    };
  }

  /// Appends a cell given by global point numbers.
  pub fn push(&mut self, kind: CellKind, globals: &[usize], block_id: usize) {
    self.kinds.push(kind);
    self.global_connectivity.extend_from_slice(globals);
    self.offsets.push(self.global_connectivity.len());
    self.block_ids.push(block_id);
  }

  /// Number of cells.
  pub fn cell_count(&self) -> usize {
    return self.kinds.len();
  }

  /// Local point numbers of one cell.
  pub fn cell(&self, i: usize) -> &[usize] {
    return &self.connectivity[self.offsets[i]..self.offsets[i + 1]];
  }
}

/// A part, ready to receive field data.
#[derive(Debug)]
pub struct Part {
  /// Cell type and material.
  pub key: PartKey,
  /// Human-readable name.
  pub name: String,
  /// User-facing material id.
  pub user_material: i64,
  /// Which points the connectivity refers to.
  pub pool: PointPool,
  /// Cells of the part.
  pub topology: Topology,
  /// Points the part uses.
  pub points: Box<dyn PointSet>,
  /// Static coordinates of the used points.
  pub coordinates: Column,
  /// Per-point columns of the loaded timestep.
  pub point_columns: BTreeMap<String, Column>,
  /// Per-cell columns of the loaded timestep.
  pub cell_columns: BTreeMap<String, Column>,
  /// Per-cell deletion flags of the loaded timestep (true means deleted).
  pub deleted: Option<Vec<bool>>
}

/// Summary of a part, as listed to consumers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartInfo {
  /// Index of the part.
  pub id: usize,
  /// Cell type of the part.
  pub cell_type: CellType,
  /// Internal material id.
  pub material: i64,
  /// User-facing material id.
  pub user_material: i64,
  /// Name of the part.
  pub name: String,
  /// Number of cells.
  pub cells: usize,
  /// Number of used points.
  pub points: usize,
  /// Point-usage representation.
  pub representation: String
}

impl Part {
  /// Number of used points.
  pub fn point_count(&self) -> usize {
    return self.points.len();
  }

  /// Number of cells.
  pub fn cell_count(&self) -> usize {
    return self.topology.cell_count();
  }

  /// Summarizes the part.
  pub fn info(&self, id: usize) -> PartInfo {
    return PartInfo {
      id,
      cell_type: self.key.cell_type,
      material: self.key.material,
      user_material: self.user_material,
      name: self.name.clone(),
      cells: self.cell_count(),
      points: self.point_count(),
      representation: self.points.representation().to_owned()
    };
  }

  /// A view of the part without its deleted cells and the points only they
  /// used. Without deletion flags, every cell is kept.
  pub fn compacted(&self) -> CompactedPart {
    return self.without(self.deleted.as_deref());
  }

  /// A view of the part without the flagged cells and the points only they
  /// used.
  pub fn without(&self, deleted: Option<&[bool]>) -> CompactedPart {
    let keep: Vec<bool> = match deleted {
      Some(d) => (0..self.cell_count()).map(|c| !d.get(c).copied().unwrap_or(false)).collect(),
      None => vec![true; self.cell_count()]
    };
    let mut used = vec![false; self.point_count()];
    for c in (0..self.cell_count()).filter(|c| keep[*c]) {
      for p in self.topology.cell(c) {
        used[*p] = true;
      }
    }
    // temporary remap from full local numbers to compacted ones
    let mut remap: Vec<Option<usize>> = vec![None; used.len()];
    let mut kept_points: Vec<usize> = Vec::new();
    for p in (0..used.len()).filter(|p| used[*p]) {
      remap[p] = Some(kept_points.len());
      kept_points.push(p);
    }
    let mut topology = Topology::with_capacity(self.cell_count(), 0);
    let mut kept_cells: Vec<usize> = Vec::new();
    for c in (0..self.cell_count()).filter(|c| keep[*c]) {
      let start = self.topology.offsets[c];
      let end = self.topology.offsets[c + 1];
      let globals = &self.topology.global_connectivity[start..end];
      topology.push(self.topology.kinds[c], globals, self.topology.block_ids[c]);
      topology.connectivity.extend(
        self.topology.cell(c).iter().filter_map(|p| remap[*p])
      );
      kept_cells.push(c);
    }
    let pick = |col: &Column, rows: &[usize]| Column {
      components: col.components,
      values: rows.iter()
        .flat_map(|r| col.tuple(*r).iter().copied())
        .collect()
    };
    let point_columns = self.point_columns.iter()
      .map(|(n, col)| (n.clone(), pick(col, &kept_points)))
      .collect();
    let cell_columns = self.cell_columns.iter()
      .map(|(n, col)| (n.clone(), pick(col, &kept_cells)))
      .collect();
    let all_globals = self.points.globals();
    return CompactedPart {
      key: self.key,
      topology,
      point_globals: kept_points.iter().map(|p| all_globals[*p]).collect(),
      coordinates: pick(&self.coordinates, &kept_points),
      point_columns,
      cell_columns
    };
  }
}

/// A part without its deleted cells.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactedPart {
  /// The part it was made from.
  pub key: PartKey,
  /// Remaining cells, renumbered over the remaining points.
  pub topology: Topology,
  /// Global number of each remaining point.
  pub point_globals: Vec<usize>,
  /// Coordinates of the remaining points.
  pub coordinates: Column,
  /// Remaining per-point values.
  pub point_columns: BTreeMap<String, Column>,
  /// Remaining per-cell values.
  pub cell_columns: BTreeMap<String, Column>
}

/// Where part names come from: an external source, declarations, titles
/// stored in the root file, and finally a fabricated name.
#[derive(Default)]
pub struct PartCatalog {
  /// External name source.
  source: Option<Box<dyn PartNameSource>>,
  /// Names declared for specific parts.
  declared: BTreeMap<PartKey, String>,
  /// Titles from the root file, by user part id.
  titles: BTreeMap<i64, String>
}

impl std::fmt::Debug for PartCatalog {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return f.debug_struct("PartCatalog")
      .field("source", &self.source.is_some())
      .field("declared", &self.declared)
      .field("titles", &self.titles)
      .finish();
  }
}

impl PartCatalog {
  /// A catalog with an optional external source.
  pub fn new(source: Option<Box<dyn PartNameSource>>) -> Self {
    return Self { source, ..Default::default() };
  }

  /// Sets the titles read from the root file.
  pub fn set_titles(&mut self, titles: BTreeMap<i64, String>) {
    self.titles = titles;
  }

  /// Titles read from the root file.
  pub fn titles(&self) -> &BTreeMap<i64, String> {
    return &self.titles;
  }

  /// Declares a part by raw cell type code. Unknown codes cannot be read
  /// safely, so the declaration is dropped and false returned.
  pub fn declare_part(&mut self, raw_type: i64, material: i64, name: &str) -> bool {
    let Some(cell_type) = CellType::from_code(raw_type) else {
      warn!(
        "Dropping part \"{}\" (material {}): unknown cell type code {}.",
        name, material, raw_type
      );
      return false;
    };
    self.declared.insert(PartKey { cell_type, material }, name.to_owned());
    return true;
  }

  /// The name of a part.
  pub fn name_for(&self, key: PartKey, dict: &ControlDictionary) -> String {
    if let Some(n) = self.declared.get(&key) {
      return n.clone();
    }
    if key.cell_type == CellType::RoadSurface {
      return format!("RoadSurface{}", key.material);
    }
    let user = dict.user_material(key.material);
    if let Some(n) = self.source.as_ref().and_then(|s| s.resolve_part_name(user)) {
      return n;
    }
    if let Some(n) = self.titles.get(&user).filter(|t| !t.is_empty()) {
      return n.clone();
    }
    if dict.materials.arbitrary {
      return format!("Part{} (Matl{})", key.material, user);
    }
    return format!("Part{}", key.material);
  }
}

/// Reads the part titles that follow the end-of-states marker of the root
/// file, when the root file holds no states. Returns an empty map when there
/// are none.
pub fn read_root_titles(
  family: &mut Family,
  dict: &ControlDictionary
) -> D3Result<BTreeMap<i64, String>> {
  let mut titles: BTreeMap<i64, String> = BTreeMap::new();
  let mark = family.section_mark(0, Section::State)?;
  if mark.file != 0 || dict.level != 0 {
    return Ok(titles);
  }
  let ws = family.word_bytes() as u64;
  let left = family.file_words(0).saturating_sub(mark.offset);
  if left < 3 {
    return Ok(titles);
  }
  family.seek(mark)?;
  family.buffer_chunk(WordKind::Float, 1)?;
  if family.next_float()? != EOF_MARKER {
    return Ok(titles);
  }
  let head = family.read_ints(2)?;
  if head[0] != PART_TITLES_TYPE || head[1] <= 0 {
    debug!("No part titles after the root file's states.");
    return Ok(titles);
  }
  let parts = head[1] as u64;
  let title_words = TITLE_BYTES / family.word_bytes();
  let needed = 3 + parts * (1 + title_words as u64);
  if needed > left {
    warn!(
      "Root file announces {} part titles but only has room for {} bytes.",
      parts, (left - 3) * ws
    );
    return Ok(titles);
  }
  for _ in 0..parts {
    let id = family.read_ints(1)?[0];
    family.buffer_chunk(WordKind::Char, title_words)?;
    let title = family.next_string(title_words)?;
    titles.insert(id, title);
  }
  debug!("Read {} part titles.", titles.len());
  return Ok(titles);
}
