//! This module implements the control dictionary: the typed contents of the
//! 64-word control header of an adaptation level, the tables read from the
//! rest of its static section, and every quantity derived from them (cell
//! counts, which arrays exist, and the exact layout of one state record).
//!
//! Derived quantities are pure functions of what was read, so parsing the
//! same level twice yields the same dictionary.

pub mod arrays;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::cells::CellType;
use crate::family::{Family, Section, SectionMark, WordKind};
use crate::prelude::*;

pub use arrays::{Binding, CellLayout};

/// Words in the control section.
pub const CONTROL_WORDS: u64 = 64;
/// Words holding the title.
const TITLE_WORDS: usize = 10;
/// Word index of the release string.
const RELEASE_WORD: u64 = 13;
/// Number of integer words following the version.
const HEADER_INTS: usize = 49;
/// IOSHL flags are "on" when they hold this value.
const IOSHL_ON: i64 = 1000;
/// Minimum value of the first SPH attribute flag (its own word count).
const MIN_SPH_ATTRIBUTES: i64 = 9;
/// Words of the user id header, and of its extension when NSORT < 0.
const USER_ID_HEADER: (usize, usize) = (10, 6);
/// Words per connectivity record on disk, per cell type.
const GEOMETRY_BLOCKS: [CellType; 4] = [
  CellType::Solid,
  CellType::ThickShell,
  CellType::Beam,
  CellType::Shell
];
/// MAXINT magnitudes above this encode cell deletion.
const DELETION_FLAG: i64 = 10000;
/// Order of the element user id tables, after the node ids.
const USER_ID_ORDER: [CellType; 4] = [
  CellType::Solid,
  CellType::Beam,
  CellType::Shell,
  CellType::ThickShell
];

/// The control word at index 22 is the SPH particle count for most writers,
/// but some codes store an element deletion option there. Both readings are
/// kept, alongside the code version that can tell them apart.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SharedControlWord {
  /// The raw value.
  pub raw: i64,
  /// Version of the code that wrote the database.
  pub version: f64
}

impl SharedControlWord {
  /// Reading as the number of SPH particles (used for layout).
  pub fn as_sph_count(&self) -> usize {
    return self.raw.max(0) as usize;
  }

  /// Reading as the non-standard element deletion option.
  pub fn as_deletion_option(&self) -> i64 {
    return self.raw;
  }
}

/// The primary fields of the control section, by name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[allow(missing_docs)]
pub struct ControlHeader {
  pub title: String,
  pub release: String,
  pub version: f64,
  pub ndim: i64,
  pub numnp: i64,
  pub icode: i64,
  pub nglbv: i64,
  pub it: i64,
  pub iu: i64,
  pub iv: i64,
  pub ia: i64,
  pub nel8: i64,
  pub nummat8: i64,
  pub nv3d: i64,
  pub nel2: i64,
  pub nummat2: i64,
  pub nv1d: i64,
  pub nel4: i64,
  pub nummat4: i64,
  pub nv2d: i64,
  pub neiph: i64,
  pub neips: i64,
  pub maxint: i64,
  pub nmsph: SharedControlWord,
  pub ngpsph: i64,
  pub narbs: i64,
  pub nelt: i64,
  pub nummatt: i64,
  pub nv3dt: i64,
  pub ioshl: [bool; 4],
  pub ialemat: i64,
  pub ncfdv1: i64,
  pub ncfdv2: i64,
  pub nadapt: i64,
  pub numfluid: i64
}

impl ControlHeader {
  /// Decodes the 49 integers that follow the version word.
  fn from_ints(title: String, release: String, version: f64, w: &[i64]) -> Self {
    let on = |v: i64| v == IOSHL_ON;
    return Self {
      title,
      release,
      version,
      ndim: w[0],
      numnp: w[1],
      icode: w[2],
      nglbv: w[3],
      it: w[4],
      iu: w[5],
      iv: w[6],
      ia: w[7],
      nel8: w[8],
      nummat8: w[9],
      // 10 and 11 are blank
      nv3d: w[12],
      nel2: w[13],
      nummat2: w[14],
      nv1d: w[15],
      nel4: w[16],
      nummat4: w[17],
      nv2d: w[18],
      neiph: w[19],
      neips: w[20],
      maxint: w[21],
      nmsph: SharedControlWord { raw: w[22], version },
      ngpsph: w[23],
      narbs: w[24],
      nelt: w[25],
      nummatt: w[26],
      nv3dt: w[27],
      ioshl: [on(w[28]), on(w[29]), on(w[30]), on(w[31])],
      ialemat: w[32],
      ncfdv1: w[33],
      ncfdv2: w[34],
      nadapt: w[35],
      // 36 is blank
      numfluid: w[37]
    };
  }
}

/// Which entities, if any, the solver flags as deleted in every state.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeletionMode {
  /// Nothing is ever deleted.
  None,
  /// One word per node.
  Point,
  /// One word per continuum cell.
  Cell
}

/// The user id header, present when NARBS is nonzero.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct UserIdHeader {
  pub nsort: i64,
  pub nsrh: i64,
  pub nsrb: i64,
  pub nsrs: i64,
  pub nsrt: i64,
  pub nsortd: i64,
  pub nsrhd: i64,
  pub nsrbd: i64,
  pub nsrsd: i64,
  pub nsrtd: i64,
  /// NSRMA, NSRMU, NSRMP, NSRTM, NUMRBS and NMMAT, when NSORT < 0.
  pub extension: Option<[i64; 6]>
}

impl UserIdHeader {
  /// Number of arbitrary material ids (NMMAT), if present.
  pub fn nmmat(&self) -> Option<usize> {
    return self.extension.map(|e| e[5].max(0) as usize);
  }
}

/// User numbers of nodes and elements, present when NARBS is nonzero.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdTables {
  /// User number of every node.
  pub nodes: Vec<i64>,
  /// User number of every connectivity record, per block.
  pub cells: BTreeMap<CellType, Vec<i64>>
}

/// Internal-to-user material id tables.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaterialTables {
  /// Whether the ids came from the file rather than being sequential.
  pub arbitrary: bool,
  /// User ids in internal order.
  pub ordered: Vec<i64>,
  /// User ids as written.
  pub unordered: Vec<i64>,
  /// Internal ids of the unordered user ids.
  pub lookup: Vec<i64>
}

/// Rigid road surface header and segment counts.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoadHeader {
  /// Road nodes.
  pub nnode: usize,
  /// Total segments.
  pub nseg: usize,
  /// Surfaces.
  pub nsurf: usize,
  /// Whether surface motion is written in every state.
  pub motion: bool,
  /// Segments of every surface, in order.
  pub segments: Vec<usize>
}

/// Word offsets of every block of one state record.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateLayout {
  /// Total words in a state.
  pub words: u64,
  /// Offset of the node arrays.
  pub nodes: u64,
  /// Words taken by the node arrays.
  pub node_words: u64,
  /// Offset of each cell type's records.
  pub cells: BTreeMap<CellType, u64>,
  /// Offset of the deletion flags.
  pub deletion: u64,
  /// Words taken by the deletion flags.
  pub deletion_words: u64,
  /// Offset of the SPH particle data.
  pub sph: u64,
  /// Offset of the road surface motion.
  pub road: u64
}

/// Everything computed from the primary fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Derived {
  /// Spatial dimension of coordinates.
  pub dimension: usize,
  /// Whether rigid materials are listed.
  pub has_material_types: bool,
  /// Whether a rigid road surface section exists.
  pub has_rigid_road: bool,
  /// Effective integration points through the thickness.
  pub integration_points: usize,
  /// Element deletion mode.
  pub deletion: DeletionMode,
  /// Whether shells and thick shells carry strain tensors.
  pub strain: bool,
  /// Declared number of cells per type.
  pub cell_counts: BTreeMap<CellType, usize>,
  /// Node arrays, with offsets in components per node.
  pub point_arrays: Vec<Binding>,
  /// Per-cell record layouts.
  pub cell_layouts: BTreeMap<CellType, CellLayout>,
  /// Point arrays that are not part of the state record.
  pub extra_point_arrays: Vec<Binding>,
  /// Cell arrays that are not part of the state record, per cell type.
  pub extra_cell_arrays: BTreeMap<CellType, Vec<Binding>>,
  /// Layout of one state record.
  pub state: StateLayout,
  /// Words in the static section of this level.
  pub pre_state_words: u64
}

/// The control dictionary of one adaptation level.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ControlDictionary {
  /// Level this dictionary describes.
  pub level: usize,
  /// Primary fields.
  pub header: ControlHeader,
  /// Rigid body shell count (NUMRBE).
  pub numrbe: usize,
  /// Rigid materials (internal ids).
  pub rigid_materials: BTreeSet<i64>,
  /// ALE fluid materials.
  pub fluid_materials: BTreeSet<i64>,
  /// SPH attribute flags, starting with isphfg(1).
  pub sph_flags: Vec<i64>,
  /// Words of state data per SPH particle.
  pub sph_data_words: usize,
  /// The user id header, if any.
  pub user_ids: Option<UserIdHeader>,
  /// User numbers of nodes and elements, if any.
  pub user_id_tables: Option<UserIdTables>,
  /// Material id tables.
  pub materials: MaterialTables,
  /// The road surface header, if any.
  pub road: Option<RoadHeader>,
  /// Derived quantities.
  pub derived: Derived
}

impl ControlDictionary {
  /// Reads the static section of an adaptation level, which starts at the
  /// first file of that level, marking every section of it on the way.
  pub fn parse(family: &mut Family, level: usize) -> D3Result<Self> {
    let first = family.first_file_of_level(level).ok_or_else(|| {
      D3plotError::CorruptHeader(format!("no files for adaptation level {}", level))
    })?;
    family.seek(SectionMark { file: first, offset: 0 })?;
    family.mark_section_start(level, Section::Control);
    // title, release and version
    family.buffer_chunk(WordKind::Char, TITLE_WORDS)?;
    let title = family.next_string(TITLE_WORDS)?;
    family.skip_to_word(Section::Control, level, RELEASE_WORD)?;
    family.buffer_chunk(WordKind::Char, 1)?;
    let release = family.next_string(1)?;
    family.buffer_chunk(WordKind::Float, 1)?;
    let version = family.next_float()?;
    let ints = family.read_ints(HEADER_INTS)?;
    let header = ControlHeader::from_ints(title, release, version, &ints);
    debug!("Level {} control: \"{}\", version {}.", level, header.title, version);
    let (dimension, has_material_types, has_rigid_road) = match header.ndim {
      4 => (3, false, false),
      5 => (3, true, false),
      7 => (3, true, true),
      other => return Err(D3plotError::UnsupportedGeometry(other))
    };
    let mut pre_state_words = CONTROL_WORDS;
    let count = |v: i64| v.max(0) as usize;
    // material types
    family.mark_section_start(level, Section::MaterialTypeData);
    let mut numrbe = 0;
    let mut rigid_materials: BTreeSet<i64> = BTreeSet::new();
    if has_material_types {
      let head = family.read_ints(2)?;
      numrbe = count(head[0]);
      let nummat = count(head[1]);
      rigid_materials.extend(family.read_ints(nummat)?);
      pre_state_words += 2 + nummat as u64;
    }
    if numrbe > count(header.nel4) {
      return Err(D3plotError::CorruptHeader(format!(
        "{} rigid shells but only {} shells", numrbe, header.nel4
      )));
    }
    // fluid materials
    family.mark_section_start(level, Section::FluidMaterialIdData);
    let fluid_materials: BTreeSet<i64> = family.read_ints(count(header.ialemat))?
      .into_iter()
      .collect();
    pre_state_words += count(header.ialemat) as u64;
    // sph attribute flags
    family.mark_section_start(level, Section::SphElementData);
    let particles = header.nmsph.as_sph_count();
    let mut sph_flags: Vec<i64> = Vec::new();
    let mut sph_data_words = 0;
    if particles > 0 {
      let attributes = family.read_ints(1)?[0];
      if attributes < MIN_SPH_ATTRIBUTES {
        return Err(D3plotError::CorruptHeader(format!(
          "SPH attribute count is {}, must be at least {}",
          attributes, MIN_SPH_ATTRIBUTES
        )));
      }
      sph_flags.push(attributes);
      sph_flags.extend(family.read_ints(attributes as usize - 1)?);
      sph_data_words = 1 + sph_flags[1..].iter().map(|v| count(*v)).sum::<usize>();
      pre_state_words += attributes as u64;
    }
    // geometry
    family.mark_section_start(level, Section::GeometryData);
    let mut geometry_words = count(header.numnp) as u64 * dimension as u64;
    for ct in GEOMETRY_BLOCKS {
      geometry_words += (record_count(&header, ct) * ct.connectivity_words()) as u64;
    }
    family.skip_words(geometry_words)?;
    pre_state_words += geometry_words;
    // user ids
    family.mark_section_start(level, Section::UserIdData);
    let mut user_ids: Option<UserIdHeader> = None;
    let mut user_id_tables: Option<UserIdTables> = None;
    if header.narbs != 0 {
      let w = family.read_ints(USER_ID_HEADER.0)?;
      let mut ids = UserIdHeader {
        nsort: w[0], nsrh: w[1], nsrb: w[2], nsrs: w[3], nsrt: w[4],
        nsortd: w[5], nsrhd: w[6], nsrbd: w[7], nsrsd: w[8], nsrtd: w[9],
        extension: None
      };
      let mut header_words = USER_ID_HEADER.0;
      if ids.nsort < 0 {
        let e = family.read_ints(USER_ID_HEADER.1)?;
        ids.extension = Some([e[0], e[1], e[2], e[3], e[4], e[5]]);
        header_words += USER_ID_HEADER.1;
      }
      user_ids = Some(ids);
      let table_words = count(header.numnp)
        + USER_ID_ORDER.iter().map(|ct| record_count(&header, *ct)).sum::<usize>();
      if header_words + table_words <= count(header.narbs) {
        let nodes = family.read_ints(count(header.numnp))?;
        let mut cells: BTreeMap<CellType, Vec<i64>> = BTreeMap::new();
        for ct in USER_ID_ORDER {
          cells.insert(ct, family.read_ints(record_count(&header, ct))?);
        }
        user_id_tables = Some(UserIdTables { nodes, cells });
      } else {
        warn!(
          "NARBS is {}, too small for {} user id words, user ids ignored.",
          header.narbs, header_words + table_words
        );
      }
    }
    let materials = read_material_tables(family, level, &header, user_ids.as_ref())?;
    if header.narbs != 0 {
      family.skip_to_word(Section::UserIdData, level, count(header.narbs) as u64)?;
      pre_state_words += count(header.narbs) as u64;
    }
    // adapted parents
    family.mark_section_start(level, Section::AdaptedParentData);
    family.skip_words(2 * count(header.nadapt) as u64)?;
    pre_state_words += 2 * count(header.nadapt) as u64;
    // sph nodes
    family.mark_section_start(level, Section::SphNodeData);
    family.skip_words(2 * particles as u64)?;
    pre_state_words += 2 * particles as u64;
    // rigid road surfaces
    family.mark_section_start(level, Section::RigidSurfaceData);
    let mut road: Option<RoadHeader> = None;
    if has_rigid_road {
      let w = family.read_ints(4)?;
      let mut r = RoadHeader {
        nnode: count(w[0]),
        nseg: count(w[1]),
        nsurf: count(w[2]),
        motion: w[3] != 0,
        segments: Vec::new()
      };
      family.skip_words(4 * r.nnode as u64)?;
      pre_state_words += 4 + 4 * r.nnode as u64;
      for _ in 0..r.nsurf {
        let s = family.read_ints(2)?;
        let nseg = count(s[1]);
        family.skip_words(4 * nseg as u64)?;
        r.segments.push(nseg);
        pre_state_words += 2 + 4 * nseg as u64;
      }
      if r.segments.iter().sum::<usize>() != r.nseg {
        warn!(
          "Road surfaces list {} segments, header says {}.",
          r.segments.iter().sum::<usize>(), r.nseg
        );
      }
      road = Some(r);
    }
    family.mark_section_start(level, Section::EndOfStatic);
    family.mark_section_start(level, Section::State);
    let mut dict = Self {
      level,
      header,
      numrbe,
      rigid_materials,
      fluid_materials,
      sph_flags,
      sph_data_words,
      user_ids,
      user_id_tables,
      materials,
      road,
      derived: Derived {
        dimension,
        has_material_types,
        has_rigid_road,
        integration_points: 0,
        deletion: DeletionMode::None,
        strain: false,
        cell_counts: BTreeMap::new(),
        point_arrays: Vec::new(),
        cell_layouts: BTreeMap::new(),
        extra_point_arrays: Vec::new(),
        extra_cell_arrays: BTreeMap::new(),
        state: StateLayout::default(),
        pre_state_words
      }
    };
    dict.derive();
    family.set_state_size(level, dict.derived.state.words);
    debug!(
      "Level {}: {} static words, {} words per state.",
      level, pre_state_words, dict.derived.state.words
    );
    return Ok(dict);
  }

  /// Computes every derived quantity from the primary fields and tables.
  pub(crate) fn derive(&mut self) {
    let h = &self.header;
    let count = |v: i64| v.max(0) as usize;
    let dim = self.derived.dimension;
    // integration points and deletion
    let (points, deletion) = match h.maxint {
      m if (0..=DELETION_FLAG).contains(&m) => (m, DeletionMode::None),
      m if m < -DELETION_FLAG => (-m - DELETION_FLAG, DeletionMode::Cell),
      m if m > DELETION_FLAG => (m - DELETION_FLAG, DeletionMode::Cell),
      m => (-m, DeletionMode::Point)
    };
    let points = count(points);
    let ioshl = |i: usize| h.ioshl[i] as i64;
    let per_point = points as i64 * (6 * ioshl(0) + ioshl(1) + h.neips);
    let strain = if h.nv2d > 0 {
      h.nv2d - (per_point + 8 * ioshl(2) + 4 * ioshl(3)) > 1
    } else if h.nelt > 0 {
      h.nv3dt - per_point > 1
    } else {
      false
    };
    // cell counts
    let mut cell_counts: BTreeMap<CellType, usize> = BTreeMap::new();
    for ct in CellType::all() {
      let n = match ct {
        CellType::Particle => h.nmsph.as_sph_count(),
        CellType::Beam => count(h.nel2),
        CellType::Shell => count(h.nel4) - self.numrbe,
        CellType::ThickShell => count(h.nelt),
        CellType::Solid => count(h.nel8),
        CellType::RigidBody => self.numrbe,
        CellType::RoadSurface => self.road.as_ref().map_or(0, |r| r.nseg)
      };
      cell_counts.insert(*ct, n);
    }
    // node arrays
    let point_arrays = arrays::register_if_enabled(
      arrays::node_rules(h, dim),
      None,
      "Node"
    );
    let node_components: usize = point_arrays.iter().map(|b| b.components).sum();
    let cell_layouts: BTreeMap<CellType, CellLayout> =
      arrays::cell_layouts(h, points, strain).into_iter().collect();
    let user_ids = self.user_id_tables.is_some();
    let extra_point_arrays = arrays::extra_point_arrays(h, dim, user_ids);
    let extra_cell_arrays = arrays::extra_cell_arrays(
      user_ids,
      cell_counts[&CellType::RoadSurface]
    );
    // state layout
    let mut state = StateLayout::default();
    let mut words: u64 = 1 + count(h.nglbv) as u64;
    state.nodes = words;
    state.node_words = (node_components * count(h.numnp)) as u64;
    words += state.node_words;
    for ct in [CellType::Solid, CellType::ThickShell, CellType::Beam, CellType::Shell] {
      state.cells.insert(ct, words);
      let width = cell_layouts.get(&ct).map_or(0, |l| l.width);
      words += (width * cell_counts[&ct]) as u64;
    }
    state.deletion = words;
    state.deletion_words = match deletion {
      DeletionMode::None => 0,
      DeletionMode::Point => count(h.numnp) as u64,
      DeletionMode::Cell => (count(h.nel8) + count(h.nelt) + count(h.nel4)
        + count(h.nel2)) as u64
    };
    words += state.deletion_words;
    state.sph = words;
    words += (self.sph_data_words * cell_counts[&CellType::Particle]) as u64;
    state.road = words;
    if let Some(r) = self.road.as_ref().filter(|r| r.motion) {
      words += 6 * r.nsurf as u64;
    }
    state.words = words;
    let d = &mut self.derived;
    d.integration_points = points;
    d.deletion = deletion;
    d.strain = strain;
    d.cell_counts = cell_counts;
    d.point_arrays = point_arrays;
    d.cell_layouts = cell_layouts;
    d.extra_point_arrays = extra_point_arrays;
    d.extra_cell_arrays = extra_cell_arrays;
    d.state = state;
  }

  /// Declared number of cells of a type.
  pub fn cell_count(&self, cell_type: CellType) -> usize {
    return self.derived.cell_counts.get(&cell_type).copied().unwrap_or(0);
  }

  /// Number of connectivity records of a type on disk.
  pub fn record_count(&self, cell_type: CellType) -> usize {
    return record_count(&self.header, cell_type);
  }

  /// Number of nodes.
  pub fn node_count(&self) -> usize {
    return self.header.numnp.max(0) as usize;
  }

  /// Words in one state record.
  pub fn state_words(&self) -> u64 {
    return self.derived.state.words;
  }

  /// Whether an internal material id is rigid.
  pub fn is_rigid(&self, material: i64) -> bool {
    return self.rigid_materials.contains(&material);
  }

  /// Number of internal materials.
  pub fn material_count(&self) -> usize {
    if self.materials.arbitrary {
      return self.materials.ordered.len();
    }
    let h = &self.header;
    return [h.nummat8, h.nummatt, h.nummat4, h.nummat2, h.ngpsph]
      .iter()
      .map(|v| v.max(&0))
      .sum::<i64>() as usize;
  }

  /// User-facing id of an internal material.
  pub fn user_material(&self, material: i64) -> i64 {
    return usize::try_from(material - 1).ok()
      .and_then(|i| self.materials.ordered.get(i))
      .copied()
      .unwrap_or(material);
  }

  /// The record layout of a cell type, if it has state data.
  pub fn cell_layout(&self, cell_type: CellType) -> Option<&CellLayout> {
    return self.derived.cell_layouts.get(&cell_type);
  }

  /// Every point array a part can carry: the state record's, then the rest.
  pub fn point_bindings(&self) -> Vec<Binding> {
    return self.derived.point_arrays.iter()
      .chain(self.derived.extra_point_arrays.iter())
      .cloned()
      .collect();
  }

  /// Every cell array a part of a cell type can carry.
  pub fn cell_bindings(&self, cell_type: CellType) -> Vec<Binding> {
    let in_state = self.cell_layout(cell_type).map(|l| l.bindings.as_slice()).unwrap_or(&[]);
    let extra = self.derived.extra_cell_arrays.get(&cell_type)
      .map(|b| b.as_slice())
      .unwrap_or(&[]);
    return in_state.iter().chain(extra.iter()).cloned().collect();
  }
}

/// Connectivity records of a type in the geometry section.
fn record_count(h: &ControlHeader, cell_type: CellType) -> usize {
  let v = match cell_type {
    CellType::Solid => h.nel8,
    CellType::ThickShell => h.nelt,
    CellType::Beam => h.nel2,
    CellType::Shell => h.nel4,
    CellType::Particle => h.nmsph.raw,
    CellType::RigidBody | CellType::RoadSurface => 0
  };
  return v.max(0) as usize;
}

/// Reads the arbitrary material id tables, or fabricates sequential ones.
fn read_material_tables(
  family: &mut Family,
  level: usize,
  h: &ControlHeader,
  ids: Option<&UserIdHeader>
) -> D3Result<MaterialTables> {
  let count = |v: i64| v.max(0) as u64;
  if let Some(nmmat) = ids.filter(|_| h.narbs > 0).and_then(|i| i.nmmat()) {
    let skip = (USER_ID_HEADER.0 + USER_ID_HEADER.1) as u64
      + count(h.numnp) + count(h.nel8) + count(h.nel2) + count(h.nel4)
      + count(h.nelt);
    family.skip_to_word(Section::UserIdData, level, skip)?;
    let mut all = family.read_ints(3 * nmmat)?.into_iter();
    let mut take = |n: usize| all.by_ref().take(n).collect::<Vec<i64>>();
    let ordered = take(nmmat);
    let unordered = take(nmmat);
    let lookup = take(nmmat);
    return Ok(MaterialTables { arbitrary: true, ordered, unordered, lookup });
  }
  let n = [h.nummat8, h.nummatt, h.nummat4, h.nummat2, h.ngpsph]
    .iter()
    .map(|v| count(*v))
    .sum::<u64>() as i64;
  let seq: Vec<i64> = (1..=n).collect();
  return Ok(MaterialTables {
    arbitrary: false,
    ordered: seq.clone(),
    unordered: seq.clone(),
    lookup: seq
  });
}
