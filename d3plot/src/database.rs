//! This module implements the database: the public entry point that opens a
//! d3plot family, scans its timesteps, assembles its parts and loads field
//! data for one timestep at a time.

use std::collections::BTreeMap;
use std::path::Path;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cells::CellType;
use crate::control::{Binding, ControlDictionary};
use crate::family::{Family, StorageModel};
use crate::parts::assembly::{ArrayScope, ArraySelection, DeletedCells, PartAssembler};
use crate::parts::{read_root_titles, CompactedPart, Part, PartCatalog, PartInfo, Topology};
use crate::prelude::*;
use crate::sources::{CellRangeSource, FullRange, PartNameSource};
use crate::timesteps::TimeStepIndex;
use crate::util::split_family_path;

/// Options that change how a database is read.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenOptions {
  /// What to do with deleted cells.
  pub deleted_cells: DeletedCells,
  /// Arrays that start out disabled.
  pub disabled_arrays: Vec<(ArrayScope, String)>
}

/// A short description of a database, fit for printing or serializing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSummary {
  /// Title from the control section.
  pub title: String,
  /// Release string.
  pub release: String,
  /// Code version.
  pub version: f64,
  /// Base name of the family.
  pub base_name: String,
  /// Number of files in the family.
  pub files: usize,
  /// Number of adaptation levels.
  pub levels: usize,
  /// Word size, in bytes.
  pub word_bytes: usize,
  /// Whether words are byte-swapped relative to this machine.
  pub swapped: bool,
  /// Spatial dimension.
  pub dimension: usize,
  /// Number of nodes in the first level.
  pub nodes: usize,
  /// Declared cells per type in the first level.
  pub cells: BTreeMap<CellType, usize>,
  /// Number of internal materials.
  pub materials: usize,
  /// Number of timesteps.
  pub timesteps: usize,
  /// First and last time.
  pub time_range: Option<(f64, f64)>,
  /// Whether a trailing partial state was ignored.
  pub truncated_tail: bool,
  /// Node arrays.
  pub point_arrays: Vec<Binding>,
  /// Cell arrays per cell type.
  pub cell_arrays: BTreeMap<CellType, Vec<Binding>>,
  /// Parts of the loaded level.
  pub parts: Vec<PartInfo>
}

/// An open d3plot database.
pub struct D3plotDatabase {
  /// The file family.
  family: Family,
  /// Dictionary of every adaptation level.
  dictionaries: Vec<ControlDictionary>,
  /// Every state.
  steps: TimeStepIndex,
  /// Where part names come from.
  catalog: PartCatalog,
  /// Parts of the level of the loaded timestep.
  assembler: PartAssembler,
  /// Which arrays are read.
  selection: ArraySelection,
  /// What to do with deleted cells.
  deleted_cells: DeletedCells,
  /// Narrows which cells are materialized.
  ranges: Box<dyn CellRangeSource>,
  /// The loaded timestep, if any.
  current: Option<usize>
}

impl std::fmt::Debug for D3plotDatabase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return f.debug_struct("D3plotDatabase")
      .field("family", &self.family)
      .field("steps", &self.steps.len())
      .field("catalog", &self.catalog)
      .field("parts", &self.assembler.parts().len())
      .field("selection", &self.selection)
      .field("deleted_cells", &self.deleted_cells)
      .field("current", &self.current)
      .finish();
  }
}

impl D3plotDatabase {
  /// Opens the database a path points to. The path may name any file of the
  /// family, or an input deck next to it.
  pub fn open(path: &Path, options: OpenOptions) -> D3Result<Self> {
    return Self::open_with_sources(path, options, None, None);
  }

  /// Opens a database with external part names and cell ranges.
  pub fn open_with_sources(
    path: &Path,
    options: OpenOptions,
    names: Option<Box<dyn PartNameSource>>,
    ranges: Option<Box<dyn CellRangeSource>>
  ) -> D3Result<Self> {
    let (directory, base_name) = split_family_path(path);
    info!("Opening {} in {}...", base_name, directory.display());
    let mut family = Family::open(&directory, &base_name)?;
    let model = family.detect_storage_model()?;
    debug!("Storage model: {:?}.", model);
    let mut dictionaries = vec![ControlDictionary::parse(&mut family, 0)?];
    let steps = TimeStepIndex::scan(&mut family, &mut dictionaries)?;
    let mut catalog = PartCatalog::new(names);
    catalog.set_titles(read_root_titles(&mut family, &dictionaries[0])?);
    let ranges = ranges.unwrap_or_else(|| Box::new(FullRange));
    let assembler = PartAssembler::assemble(
      &mut family,
      &dictionaries[0],
      &catalog,
      ranges.as_ref()
    )?;
    let mut selection = ArraySelection::default();
    for (scope, name) in options.disabled_arrays.iter() {
      selection.set(*scope, name, false);
    }
    let db = Self {
      family,
      dictionaries,
      steps,
      catalog,
      assembler,
      selection,
      deleted_cells: options.deleted_cells,
      ranges,
      current: None
    };
    info!(
      "Opened {}: {} parts, {} timesteps.",
      db.family.base_name(), db.assembler.parts().len(), db.steps.len()
    );
    return Ok(db);
  }

  /// Summaries of every part of the loaded level.
  pub fn list_parts(&self) -> Vec<PartInfo> {
    return self.assembler.parts().iter()
      .enumerate()
      .map(|(i, p)| p.info(i))
      .collect();
  }

  /// A part, with the data of the loaded timestep.
  pub fn part(&self, id: usize) -> D3Result<&Part> {
    return self.assembler.parts().get(id).ok_or(D3plotError::NoSuchPart(id));
  }

  /// The topology of a part.
  pub fn part_topology(&self, id: usize) -> D3Result<&Topology> {
    return Ok(&self.part(id)?.topology);
  }

  /// A part as consumers should see it: without its deleted cells in remove
  /// mode, whole otherwise.
  pub fn compacted_part(&self, id: usize) -> D3Result<CompactedPart> {
    let part = self.part(id)?;
    return Ok(match self.deleted_cells {
      DeletedCells::Remove => part.compacted(),
      _ => part.without(None)
    });
  }

  /// Switches an array on or off for the next load. Every array listed by
  /// `point_arrays` or `cell_arrays` can be toggled, including the
  /// displacement and the user numbers. Turning deflected coordinates off
  /// while the displacement stays on still reads them, but doesn't keep them.
  pub fn set_array_enabled(
    &mut self,
    scope: ArrayScope,
    name: &str,
    enabled: bool
  ) -> D3Result<()> {
    let known = match scope {
      ArrayScope::Point => self.point_arrays().iter().any(|b| b.name == name),
      ArrayScope::Cell(ct) => self.cell_arrays(ct).iter().any(|b| b.name == name)
    };
    if !known {
      return Err(D3plotError::NoSuchArray(name.to_owned()));
    }
    self.selection.set(scope, name, enabled);
    return Ok(());
  }

  /// Whether an array is read on the next load.
  pub fn is_array_enabled(&self, scope: ArrayScope, name: &str) -> bool {
    return self.selection.is_enabled(scope, name);
  }

  /// Loads the field data of a timestep into every part. When the timestep
  /// belongs to another adaptation level, the parts are rebuilt first. On
  /// failure the previously loaded data stays in place.
  pub fn load_timestep(&mut self, index: usize) -> D3Result<()> {
    let level = self.steps.get(index)?.level;
    let dict = self.dictionaries.get(level).ok_or_else(|| {
      D3plotError::CorruptHeader(format!("no dictionary for adaptation level {}", level))
    })?;
    let mut rebuilt: Option<PartAssembler> = None;
    if level != self.assembler.level() {
      info!("Timestep {} is in adaptation level {}, rebuilding parts.", index, level);
      rebuilt = Some(PartAssembler::assemble(
        &mut self.family,
        dict,
        &self.catalog,
        self.ranges.as_ref()
      )?);
    }
    let assembler = rebuilt.as_ref().unwrap_or(&self.assembler);
    let staged = assembler.read_state(
      &mut self.family,
      dict,
      index,
      &self.selection,
      self.deleted_cells
    )?;
    if let Some(a) = rebuilt {
      self.assembler = a;
    }
    self.assembler.commit(staged);
    self.current = Some(index);
    debug!("Loaded timestep {} (t={}).", index, self.steps.get(index)?.time);
    return Ok(());
  }

  /// Index of the loaded timestep.
  pub fn current_step(&self) -> Option<usize> {
    return self.current;
  }

  /// Number of timesteps.
  pub fn time_step_count(&self) -> usize {
    return self.steps.len();
  }

  /// First and last time, if there are timesteps.
  pub fn time_range(&self) -> Option<(f64, f64)> {
    return self.steps.time_range();
  }

  /// Time of every timestep.
  pub fn time_values(&self) -> Vec<f64> {
    return self.steps.times();
  }

  /// The timestep index.
  pub fn time_steps(&self) -> &TimeStepIndex {
    return &self.steps;
  }

  /// Whether a trailing partial state was ignored.
  pub fn truncated_tail(&self) -> bool {
    return self.steps.truncated_tail();
  }

  /// Point arrays of the loaded level.
  pub fn point_arrays(&self) -> Vec<Binding> {
    return self.loaded_dictionary().point_bindings();
  }

  /// Cell arrays of a cell type in the loaded level.
  pub fn cell_arrays(&self, cell_type: CellType) -> Vec<Binding> {
    return self.loaded_dictionary().cell_bindings(cell_type);
  }

  /// The dictionary of an adaptation level.
  pub fn control(&self, level: usize) -> Option<&ControlDictionary> {
    return self.dictionaries.get(level);
  }

  /// The storage model the family was detected as.
  pub fn storage_model(&self) -> StorageModel {
    return self.family.storage_model();
  }

  /// The file family.
  pub fn family(&self) -> &Family {
    return &self.family;
  }

  /// Declares a part name by raw cell type code. Applies to parts assembled
  /// from now on, and renames matching parts of the loaded level.
  pub fn declare_part(&mut self, raw_type: i64, material: i64, name: &str) -> bool {
    if !self.catalog.declare_part(raw_type, material, name) {
      return false;
    }
    let dict = self.loaded_dictionary().clone();
    for part in self.assembler.parts_mut() {
      part.name = self.catalog.name_for(part.key, &dict);
    }
    return true;
  }

  /// Describes the database.
  pub fn summary(&self) -> DatabaseSummary {
    let dict = &self.dictionaries[0];
    let cell_arrays = CellType::all().iter()
      .map(|ct| (*ct, dict.cell_bindings(*ct)))
      .filter(|(_, b)| !b.is_empty())
      .collect();
    let point_arrays = dict.point_bindings();
    let model = self.storage_model();
    debug!("Point arrays: {}.", point_arrays.iter().map(|b| b.name.as_str()).join(", "));
    return DatabaseSummary {
      title: dict.header.title.clone(),
      release: dict.header.release.clone(),
      version: dict.header.version,
      base_name: self.family.base_name().to_owned(),
      files: self.family.files().len(),
      levels: self.family.level_count(),
      word_bytes: model.word_bytes(),
      swapped: model.is_swapped(),
      dimension: dict.derived.dimension,
      nodes: dict.node_count(),
      cells: dict.derived.cell_counts.clone(),
      materials: dict.material_count(),
      timesteps: self.steps.len(),
      time_range: self.steps.time_range(),
      truncated_tail: self.steps.truncated_tail(),
      point_arrays,
      cell_arrays,
      parts: self.list_parts()
    };
  }

  /// The dictionary of the level the parts were built for.
  fn loaded_dictionary(&self) -> &ControlDictionary {
    let level = self.assembler.level();
    return self.dictionaries.get(level).unwrap_or(&self.dictionaries[0]);
  }
}
