//! This module implements the part assembler. It reads the connectivity
//! blocks of an adaptation level, groups cells into parts by type and
//! material, builds every part's compact topology and point set, and later
//! routes the node and cell data of a state into per-part columns.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cells::{CellKind, CellType};
use crate::control::arrays::{SEGMENT_ID, USER_ID};
use crate::control::{ControlDictionary, DeletionMode};
use crate::family::{chunk_sizes, Family, Section, WordKind};
use crate::parts::{
  Column, Part, PartCatalog, PartKey, PointPool, Topology, UniquePoints
};
use crate::prelude::*;
use crate::sources::CellRangeSource;

pub use crate::control::arrays::{DEFLECTED_COORDINATES, DEFLECTION};

/// Order of the connectivity blocks on disk (after the particles, which
/// live in their own section, and before the road surfaces).
const GEOMETRY_ORDER: [CellType; 4] = [
  CellType::Solid,
  CellType::ThickShell,
  CellType::Beam,
  CellType::Shell
];
/// Order of cell records within a state.
const STATE_ORDER: [CellType; 4] = GEOMETRY_ORDER;
/// Order of the deletion flags within a state.
const DELETION_ORDER: [CellType; 4] = [
  CellType::Solid,
  CellType::ThickShell,
  CellType::Shell,
  CellType::Beam
];

/// What an array toggle applies to.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
  Hash
)]
pub enum ArrayScope {
  /// Node arrays.
  Point,
  /// Cell arrays of one cell type.
  Cell(CellType)
}

/// What to do with cells the solver flags as deleted.
#[derive(
  Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq
)]
pub enum DeletedCells {
  /// Don't read deletion flags.
  Ignore,
  /// Read flags and attach them to parts.
  #[default]
  Flag,
  /// Read flags; consumers get compacted parts without deleted cells.
  Remove
}

/// Which arrays are read. Everything is enabled unless disabled.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArraySelection {
  /// Arrays switched off.
  disabled: BTreeSet<(ArrayScope, String)>
}

impl ArraySelection {
  /// Switches an array on or off.
  pub fn set(&mut self, scope: ArrayScope, name: &str, enabled: bool) {
    if enabled {
      self.disabled.remove(&(scope, name.to_owned()));
    } else {
      self.disabled.insert((scope, name.to_owned()));
    }
  }

  /// Whether an array is read.
  pub fn is_enabled(&self, scope: ArrayScope, name: &str) -> bool {
    return !self.disabled.contains(&(scope, name.to_owned()));
  }
}

/// A run of consecutive cells of one block sharing a material.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Run {
  /// Block the cells come from.
  pub cell_type: CellType,
  /// Their material.
  pub material: i64,
  /// Index of the first cell within the block.
  pub first: usize,
  /// Number of cells.
  pub len: usize
}

/// A connectivity block, as read.
#[derive(Clone, Debug)]
struct Block {
  /// Type of the block.
  cell_type: CellType,
  /// Words per record; the last one is the material.
  stride: usize,
  /// Point ids per record.
  nodes: usize,
  /// The records, one after the other.
  words: Vec<i64>
}

impl Block {
  /// Number of records.
  fn len(&self) -> usize {
    return self.words.len() / self.stride;
  }

  /// One record.
  fn record(&self, i: usize) -> &[i64] {
    return &self.words[i * self.stride..(i + 1) * self.stride];
  }

  /// Material of a record.
  fn material(&self, i: usize) -> i64 {
    return self.words[(i + 1) * self.stride - 1];
  }
}

/// The part and local cell a record is routed to.
type Route = Option<(usize, usize)>;

/// Columns read for one part, waiting to be committed.
#[derive(Clone, Debug, Default)]
pub struct StagedPart {
  /// Per-point columns.
  pub point_columns: BTreeMap<String, Column>,
  /// Per-cell columns.
  pub cell_columns: BTreeMap<String, Column>,
  /// Deletion flags.
  pub deleted: Option<Vec<bool>>
}

/// The parts of one adaptation level and the routing tables that feed them.
#[derive(Debug, Default)]
pub struct PartAssembler {
  /// Level the parts were built for.
  level: usize,
  /// The parts, ordered by key.
  parts: Vec<Part>,
  /// Runs found by classification, in disk order.
  runs: Vec<Run>,
  /// Connectivity block index to part cell, per block.
  block_routes: BTreeMap<CellType, Vec<Route>>,
  /// State record index to part cell, per cell type with state data.
  state_routes: BTreeMap<CellType, Vec<Route>>,
  /// Columns taken from the static section, one entry per part.
  static_columns: Vec<StagedPart>
}

impl PartAssembler {
  /// Reads the mesh of the dictionary's level and builds its parts.
  pub fn assemble(
    family: &mut Family,
    dict: &ControlDictionary,
    catalog: &PartCatalog,
    ranges: &dyn CellRangeSource
  ) -> D3Result<Self> {
    let level = dict.level;
    let dim = dict.derived.dimension;
    let nodes = dict.node_count();
    family.skip_to_word(Section::GeometryData, level, 0)?;
    let node_coords = family.read_floats(nodes * dim)?;
    let mut blocks: Vec<Block> = Vec::new();
    blocks.push(read_particles(family, dict)?);
    family.skip_to_word(Section::GeometryData, level, (nodes * dim) as u64)?;
    for ct in GEOMETRY_ORDER {
      blocks.push(read_block(family, ct, dict.record_count(ct))?);
    }
    let (road_block, road_coords) = read_road(family, dict)?;
    blocks.push(road_block);
    let mut asm = Self { level, ..Default::default() };
    // classification
    for block in blocks.iter() {
      let (lo, hi) = ranges.cell_range(block.cell_type);
      let hi = hi.min(block.len());
      for i in lo.min(hi)..hi {
        let material = block.material(i);
        let extends = asm.runs.last().is_some_and(|r| {
          r.cell_type == block.cell_type && r.material == material && r.first + r.len == i
        });
        match asm.runs.last_mut() {
          Some(r) if extends => r.len += 1,
          _ => asm.runs.push(Run { cell_type: block.cell_type, material, first: i, len: 1 })
        }
      }
    }
    debug!("Classified cells into {} runs.", asm.runs.len());
    // allocation
    let mut sizes: BTreeMap<PartKey, (usize, usize)> = BTreeMap::new();
    for run in asm.runs.iter() {
      let key = target(run.cell_type, run.material, dict);
      let nodes_per_cell = block_of(&blocks, run.cell_type).map_or(0, |b| b.nodes);
      let size = sizes.entry(key).or_insert((0, 0));
      size.0 += run.len;
      size.1 += run.len * nodes_per_cell;
    }
    let mut index: BTreeMap<PartKey, usize> = BTreeMap::new();
    let mut topologies: Vec<Topology> = Vec::with_capacity(sizes.len());
    for (key, (cells, entries)) in sizes.iter() {
      index.insert(*key, topologies.len());
      topologies.push(Topology::with_capacity(*cells, *entries));
    }
    // insertion
    let shell_state = shell_state_indices(&blocks, dict)?;
    for block in blocks.iter() {
      asm.block_routes.insert(block.cell_type, vec![None; block.len()]);
    }
    for ct in STATE_ORDER {
      asm.state_routes.insert(ct, vec![None; dict.cell_count(ct)]);
    }
    let road_pool = road_coords.len() / 3;
    let mut globals: Vec<usize> = Vec::with_capacity(8);
    for run in asm.runs.iter() {
      let Some(block) = block_of(&blocks, run.cell_type) else { continue };
      let key = target(run.cell_type, run.material, dict);
      let part = index[&key];
      let pool_size = if run.cell_type == CellType::RoadSurface { road_pool } else { nodes };
      for i in run.first..run.first + run.len {
        let record = block.record(i);
        globals.clear();
        for id in &record[..block.nodes] {
          if *id < 1 || *id as usize > pool_size {
            return Err(D3plotError::CorruptHeader(format!(
              "{} {} refers to point {} of {}", block.cell_type, i, id, pool_size
            )));
          }
          globals.push(*id as usize - 1);
        }
        let kind = match block.cell_type {
          CellType::Solid => CellKind::classify_solid(record),
          other => CellKind::for_type(other)
        };
        let topology = &mut topologies[part];
        let local = topology.cell_count();
        topology.push(kind, &globals[..kind.point_count().min(globals.len())], i);
        if let Some(routes) = asm.block_routes.get_mut(&block.cell_type) {
          routes[i] = Some((part, local));
        }
        let state_index = match (block.cell_type, key.cell_type) {
          (CellType::Shell, CellType::Shell) => shell_state.get(i).copied().flatten(),
          (CellType::Shell, _) => None,
          (ct, _) if STATE_ORDER.contains(&ct) => Some(i),
          _ => None
        };
        if let Some(s) = state_index {
          if let Some(slot) = asm.state_routes.get_mut(&block.cell_type).and_then(|r| r.get_mut(s)) {
            *slot = Some((part, local));
          }
        }
      }
    }
    // unique points and naming
    let ws = family.word_bytes();
    for ((key, _), topology) in sizes.iter().zip(topologies) {
      let (pool, pool_size, coords, comps) = match key.cell_type {
        CellType::RoadSurface => (PointPool::RoadNodes, road_pool, &road_coords, 3),
        _ => (PointPool::Nodes, nodes, &node_coords, dim)
      };
      let built = UniquePoints::build(&topology.global_connectivity, pool_size, ws);
      let mut part = Part {
        key: *key,
        name: catalog.name_for(*key, dict),
        user_material: match key.cell_type {
          CellType::RoadSurface => key.material,
          _ => dict.user_material(key.material)
        },
        pool,
        topology,
        points: built.set,
        coordinates: Column::default(),
        point_columns: BTreeMap::new(),
        cell_columns: BTreeMap::new(),
        deleted: None
      };
      part.topology.connectivity = built.local;
      part.coordinates = gather(coords, comps, &part.points.globals());
      debug!(
        "Part \"{}\": {} cells, {} points ({}).",
        part.name, part.cell_count(), part.point_count(), part.points.representation()
      );
      asm.parts.push(part);
    }
    asm.static_columns = asm.build_static_columns(dict, &blocks);
    info!("Assembled {} parts for adaptation level {}.", asm.parts.len(), level);
    return Ok(asm);
  }

  /// Level the parts were built for.
  pub fn level(&self) -> usize {
    return self.level;
  }

  /// The parts.
  pub fn parts(&self) -> &[Part] {
    return &self.parts;
  }

  /// The parts, mutably.
  pub fn parts_mut(&mut self) -> &mut [Part] {
    return &mut self.parts;
  }

  /// Runs found by classification.
  pub fn runs(&self) -> &[Run] {
    return &self.runs;
  }

  /// Builds the user number and segment number columns of every part.
  fn build_static_columns(&self, dict: &ControlDictionary, blocks: &[Block]) -> Vec<StagedPart> {
    let mut out: Vec<StagedPart> = vec![StagedPart::default(); self.parts.len()];
    if let Some(tables) = dict.user_id_tables.as_ref() {
      let ids: Vec<f64> = tables.nodes.iter().map(|id| *id as f64).collect();
      for (p, part) in self.parts.iter().enumerate() {
        if part.pool == PointPool::Nodes && !part.points.is_empty() {
          let col = gather(&ids, 1, &part.points.globals());
          out[p].point_columns.insert(USER_ID.to_owned(), col);
        }
        if part.key.cell_type.has_user_ids() {
          out[p].cell_columns.insert(USER_ID.to_owned(), Column::zeroed(1, part.cell_count()));
        }
      }
      for (ct, numbers) in tables.cells.iter() {
        let Some(routes) = self.block_routes.get(ct) else { continue };
        for (route, id) in routes.iter().zip(numbers.iter()) {
          let Some((p, cell)) = route else { continue };
          if let Some(col) = out[*p].cell_columns.get_mut(USER_ID) {
            col.values[*cell] = *id as f64;
          }
        }
      }
    }
    if let Some(road) = block_of(blocks, CellType::RoadSurface).filter(|b| b.len() > 0) {
      for (p, part) in self.parts.iter().enumerate() {
        if part.key.cell_type == CellType::RoadSurface {
          out[p].cell_columns.insert(SEGMENT_ID.to_owned(), Column::zeroed(1, part.cell_count()));
        }
      }
      let routes = self.block_routes.get(&CellType::RoadSurface).map(|r| r.as_slice()).unwrap_or(&[]);
      for (segment, route) in routes.iter().enumerate().take(road.len()) {
        let Some((p, cell)) = route else { continue };
        if let Some(col) = out[*p].cell_columns.get_mut(SEGMENT_ID) {
          col.values[*cell] = (segment + 1) as f64;
        }
      }
    }
    return out;
  }

  /// Reads the node and cell data of a state into staged columns, one entry
  /// per part. Nothing is modified, so a failure leaves loaded data intact.
  pub fn read_state(
    &self,
    family: &mut Family,
    dict: &ControlDictionary,
    step: usize,
    selection: &ArraySelection,
    deleted_cells: DeletedCells
  ) -> D3Result<Vec<StagedPart>> {
    let mut staged: Vec<StagedPart> = vec![StagedPart::default(); self.parts.len()];
    for ((s, part), fixed) in staged.iter_mut().zip(self.parts.iter()).zip(self.static_columns.iter()) {
      let cells = ArrayScope::Cell(part.key.cell_type);
      s.point_columns = enabled(&fixed.point_columns, selection, ArrayScope::Point);
      s.cell_columns = enabled(&fixed.cell_columns, selection, cells);
    }
    self.read_node_arrays(family, dict, step, selection, &mut staged)?;
    self.read_cell_arrays(family, dict, step, selection, &mut staged)?;
    if deleted_cells != DeletedCells::Ignore {
      match dict.derived.deletion {
        DeletionMode::None => {},
        DeletionMode::Point => {
          debug!("Point deletion flags are present but not applied.");
        },
        DeletionMode::Cell => self.read_deletion(family, dict, step, &mut staged)?
      }
      self.read_particle_deletion(family, dict, step, &mut staged)?;
    }
    return Ok(staged);
  }

  /// Moves staged columns into the parts.
  pub fn commit(&mut self, staged: Vec<StagedPart>) {
    for (part, s) in self.parts.iter_mut().zip(staged) {
      part.point_columns = s.point_columns;
      part.cell_columns = s.cell_columns;
      part.deleted = s.deleted;
    }
  }

  /// Reads every enabled node array over the whole node range, a chunk at a
  /// time, and copies each part's used points into its columns.
  fn read_node_arrays(
    &self,
    family: &mut Family,
    dict: &ControlDictionary,
    step: usize,
    selection: &ArraySelection,
    staged: &mut [StagedPart]
  ) -> D3Result<()> {
    let nodes = dict.node_count();
    let users: Vec<usize> = (0..self.parts.len())
      .filter(|p| self.parts[*p].pool == PointPool::Nodes && !self.parts[*p].points.is_empty())
      .collect();
    let deflection = selection.is_enabled(ArrayScope::Point, DEFLECTION);
    let keep_deflected = selection.is_enabled(ArrayScope::Point, DEFLECTED_COORDINATES);
    family.skip_to_word(Section::State, step, dict.derived.state.nodes)?;
    for b in dict.derived.point_arrays.iter() {
      let words = (nodes * b.components) as u64;
      let wanted = selection.is_enabled(ArrayScope::Point, &b.name)
        || (b.name == DEFLECTED_COORDINATES && deflection);
      if users.is_empty() || !wanted {
        family.skip_words(words)?;
        continue;
      }
      let mut columns: Vec<Column> = users.iter()
        .map(|p| Column {
          components: b.components,
          values: Vec::with_capacity(self.parts[*p].point_count() * b.components)
        })
        .collect();
      let mut first = 0;
      let mut values: Vec<f64> = Vec::new();
      for size in chunk_sizes(nodes, b.components) {
        family.buffer_chunk(WordKind::Float, size)?;
        values.clear();
        for _ in 0..size {
          values.push(family.next_float()?);
        }
        let last = first + size / b.components;
        for (col, p) in columns.iter_mut().zip(users.iter()) {
          let set = &self.parts[*p].points;
          let Some((lo, hi)) = set.bounds() else { continue };
          for g in lo.max(first)..(hi + 1).min(last) {
            if set.contains(g) {
              let at = (g - first) * b.components;
              col.values.extend_from_slice(&values[at..at + b.components]);
            }
          }
        }
        first = last;
      }
      for (col, p) in columns.into_iter().zip(users.iter()) {
        staged[*p].point_columns.insert(b.name.clone(), col);
      }
    }
    // displacement from the static coordinates
    for p in users.into_iter().filter(|_| deflection) {
      let coords = &self.parts[p].coordinates;
      let deflected = if keep_deflected {
        staged[p].point_columns.get(DEFLECTED_COORDINATES).cloned()
      } else {
        staged[p].point_columns.remove(DEFLECTED_COORDINATES)
      };
      let Some(deflected) = deflected else { continue };
      if deflected.components != coords.components
        || deflected.values.len() != coords.values.len() {
        continue;
      }
      let values = deflected.values.iter()
        .zip(coords.values.iter())
        .map(|(d, c)| d - c)
        .collect();
      let col = Column { components: coords.components, values };
      staged[p].point_columns.insert(DEFLECTION.to_owned(), col);
    }
    return Ok(());
  }

  /// Reads the per-cell records of every cell type with state data and
  /// deinterleaves the enabled arrays into each part's columns.
  fn read_cell_arrays(
    &self,
    family: &mut Family,
    dict: &ControlDictionary,
    step: usize,
    selection: &ArraySelection,
    staged: &mut [StagedPart]
  ) -> D3Result<()> {
    for ct in STATE_ORDER {
      let (Some(layout), Some(routes)) = (dict.cell_layout(ct), self.state_routes.get(&ct)) else {
        continue;
      };
      let bindings: Vec<_> = layout.bindings.iter()
        .filter(|b| selection.is_enabled(ArrayScope::Cell(ct), &b.name))
        .collect();
      if bindings.is_empty() || layout.width == 0 || routes.iter().all(|r| r.is_none()) {
        continue;
      }
      for (p, part) in self.parts.iter().enumerate().filter(|(_, p)| p.key.cell_type == ct) {
        for b in bindings.iter() {
          staged[p].cell_columns.insert(
            b.name.clone(),
            Column::zeroed(b.components, part.cell_count())
          );
        }
      }
      let offset = dict.derived.state.cells.get(&ct).copied().unwrap_or(0);
      family.skip_to_word(Section::State, step, offset)?;
      let mut record = 0;
      let mut values: Vec<f64> = Vec::new();
      for size in chunk_sizes(routes.len(), layout.width) {
        family.buffer_chunk(WordKind::Float, size)?;
        values.clear();
        for _ in 0..size {
          values.push(family.next_float()?);
        }
        for r in 0..size / layout.width {
          let Some((p, cell)) = routes[record + r] else { continue };
          let base = r * layout.width;
          for b in bindings.iter() {
            if let Some(col) = staged[p].cell_columns.get_mut(&b.name) {
              let src = &values[base + b.offset..base + b.offset + b.components];
              let dst = cell * b.components;
              col.values[dst..dst + b.components].copy_from_slice(src);
            }
          }
        }
        record += size / layout.width;
      }
    }
    return Ok(());
  }

  /// Reads the cell deletion flags: zero means deleted.
  fn read_deletion(
    &self,
    family: &mut Family,
    dict: &ControlDictionary,
    step: usize,
    staged: &mut [StagedPart]
  ) -> D3Result<()> {
    for (p, part) in self.parts.iter().enumerate() {
      if part.key.cell_type != CellType::Particle && part.key.cell_type != CellType::RoadSurface {
        staged[p].deleted = Some(vec![false; part.cell_count()]);
      }
    }
    family.skip_to_word(Section::State, step, dict.derived.state.deletion)?;
    for ct in DELETION_ORDER {
      let count = dict.record_count(ct);
      let flags = family.read_floats(count)?;
      let Some(routes) = self.block_routes.get(&ct) else { continue };
      for (i, flag) in flags.iter().enumerate() {
        let Some(Some((p, cell))) = routes.get(i) else { continue };
        if let Some(d) = staged[*p].deleted.as_mut() {
          d[*cell] = *flag == 0.0;
        }
      }
    }
    return Ok(());
  }

  /// Reads particle deletion from the material word that starts every SPH
  /// state record: zero means deleted.
  fn read_particle_deletion(
    &self,
    family: &mut Family,
    dict: &ControlDictionary,
    step: usize,
    staged: &mut [StagedPart]
  ) -> D3Result<()> {
    let width = dict.sph_data_words;
    let particles = dict.cell_count(CellType::Particle);
    let Some(routes) = self.block_routes.get(&CellType::Particle) else { return Ok(()) };
    if width == 0 || particles == 0 || routes.iter().all(|r| r.is_none()) {
      return Ok(());
    }
    for (p, part) in self.parts.iter().enumerate() {
      if part.key.cell_type == CellType::Particle {
        staged[p].deleted = Some(vec![false; part.cell_count()]);
      }
    }
    family.skip_to_word(Section::State, step, dict.derived.state.sph)?;
    let mut record = 0;
    let mut values: Vec<f64> = Vec::new();
    for size in chunk_sizes(particles, width) {
      family.buffer_chunk(WordKind::Float, size)?;
      values.clear();
      for _ in 0..size {
        values.push(family.next_float()?);
      }
      for r in 0..size / width {
        let Some(Some((p, cell))) = routes.get(record + r) else { continue };
        if let Some(d) = staged[*p].deleted.as_mut() {
          d[*cell] = values[r * width] == 0.0;
        }
      }
      record += size / width;
    }
    return Ok(());
  }
}

/// The enabled entries of a set of static columns.
fn enabled(
  columns: &BTreeMap<String, Column>,
  selection: &ArraySelection,
  scope: ArrayScope
) -> BTreeMap<String, Column> {
  return columns.iter()
    .filter(|(name, _)| selection.is_enabled(scope, name))
    .map(|(name, col)| (name.clone(), col.clone()))
    .collect();
}

/// The part a cell of a block lands in: shells of rigid materials become
/// rigid bodies.
fn target(block: CellType, material: i64, dict: &ControlDictionary) -> PartKey {
  if block == CellType::Shell && dict.is_rigid(material) {
    return PartKey { cell_type: CellType::RigidBody, material };
  }
  return PartKey { cell_type: block, material };
}

/// Finds a block by type.
fn block_of(blocks: &[Block], cell_type: CellType) -> Option<&Block> {
  return blocks.iter().find(|b| b.cell_type == cell_type);
}

/// State record index of every shell; rigid shells have no state record.
fn shell_state_indices(
  blocks: &[Block],
  dict: &ControlDictionary
) -> D3Result<Vec<Option<usize>>> {
  let Some(shells) = block_of(blocks, CellType::Shell) else {
    return Ok(Vec::new());
  };
  let mut next = 0;
  let indices: Vec<Option<usize>> = (0..shells.len())
    .map(|i| {
      if dict.is_rigid(shells.material(i)) {
        return None;
      }
      next += 1;
      return Some(next - 1);
    })
    .collect();
  if next != dict.cell_count(CellType::Shell) {
    return Err(D3plotError::CorruptHeader(format!(
      "{} shells are not rigid, the header accounts for {}",
      next,
      dict.cell_count(CellType::Shell)
    )));
  }
  return Ok(indices);
}

/// Reads a connectivity block a bounded chunk at a time.
fn read_block(family: &mut Family, cell_type: CellType, count: usize) -> D3Result<Block> {
  let stride = cell_type.connectivity_words();
  let mut words: Vec<i64> = Vec::with_capacity(count * stride);
  for size in chunk_sizes(count, stride) {
    family.buffer_chunk(WordKind::Int, size)?;
    for _ in 0..size {
      words.push(family.next_int()?);
    }
  }
  return Ok(Block { cell_type, stride, nodes: cell_type.nodes_per_cell(), words });
}

/// Reads the SPH node list: a node and a material per particle.
fn read_particles(family: &mut Family, dict: &ControlDictionary) -> D3Result<Block> {
  let count = dict.record_count(CellType::Particle);
  if count > 0 {
    family.skip_to_word(Section::SphNodeData, dict.level, 0)?;
  }
  return read_block(family, CellType::Particle, count);
}

/// Reads the road surfaces: road node coordinates, and one record per
/// segment (four road node numbers and the surface number).
fn read_road(family: &mut Family, dict: &ControlDictionary) -> D3Result<(Block, Vec<f64>)> {
  let mut block = Block {
    cell_type: CellType::RoadSurface,
    stride: CellType::RoadSurface.connectivity_words() + 1,
    nodes: CellType::RoadSurface.nodes_per_cell(),
    words: Vec::new()
  };
  let Some(road) = dict.road.as_ref() else {
    return Ok((block, Vec::new()));
  };
  family.skip_to_word(Section::RigidSurfaceData, dict.level, 4)?;
  let ids = family.read_ints(road.nnode)?;
  let coords = family.read_floats(3 * road.nnode)?;
  let by_id: HashMap<i64, usize> = ids.iter()
    .enumerate()
    .map(|(i, id)| (*id, i + 1))
    .collect();
  for (surface, nseg) in road.segments.iter().enumerate() {
    let _header = family.read_ints(2)?;
    let nodes = family.read_ints(4 * nseg)?;
    for segment in nodes.chunks_exact(4) {
      // segments name road nodes by id; fall back to 1-based positions
      block.words.extend(segment.iter().map(|n| by_id.get(n).map_or(*n, |i| *i as i64)));
      block.words.push(surface as i64 + 1);
    }
  }
  if road.motion {
    warn!("Road surface motion is present but not read.");
  }
  return Ok((block, coords));
}

/// Copies the tuples of a pool for a list of global ids.
fn gather(pool: &[f64], components: usize, globals: &[usize]) -> Column {
  let mut values: Vec<f64> = Vec::with_capacity(globals.len() * components);
  for g in globals {
    let at = g * components;
    if at + components <= pool.len() {
      values.extend_from_slice(&pool[at..at + components]);
    } else {
      values.extend(std::iter::repeat(0.0).take(components));
    }
  }
  return Column { components, values };
}
