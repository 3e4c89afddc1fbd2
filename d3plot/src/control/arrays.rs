//! This module implements the tables that say which field arrays a database
//! holds, and where every array sits inside its on-disk record.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cells::CellType;
use crate::control::ControlHeader;

/// Name of the node array holding deflected coordinates.
pub const DEFLECTED_COORDINATES: &str = "DeflectedCoordinates";
/// Name of the displacement array computed from deflected coordinates.
pub const DEFLECTION: &str = "Deflection";
/// Name of the user number arrays of points and cells.
pub const USER_ID: &str = "UserID";
/// Name of the road segment number array.
pub const SEGMENT_ID: &str = "SegmentID";

/// Where an array lives inside an interleaved record, and how wide it is.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Binding {
  /// Name of the array.
  pub name: String,
  /// Word offset within the record (for node arrays, the component offset
  /// of the array's block).
  pub offset: usize,
  /// Number of components.
  pub components: usize
}

/// The layout of the per-cell record of one cell type.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellLayout {
  /// Words per cell on disk.
  pub width: usize,
  /// Every named array within the record.
  pub bindings: Vec<Binding>
}

/// One row of an array table.
#[derive(Clone, Debug)]
pub(crate) struct ArrayRule {
  /// Array name.
  name: String,
  /// Whether the array is on disk.
  present: bool,
  /// Number of components.
  components: usize
}

/// Builds a table row.
fn rule(name: impl Into<String>, present: bool, components: usize) -> ArrayRule {
  return ArrayRule { name: name.into(), present, components };
}

/// Lays out every present row of a table one after the other. Absent rows do
/// not advance the offset. When a record width is known, rows that would run
/// past it are dropped.
pub(crate) fn register_if_enabled(
  rules: impl IntoIterator<Item = ArrayRule>,
  width: Option<usize>,
  owner: &str
) -> Vec<Binding> {
  let mut offset = 0;
  let mut bindings: Vec<Binding> = Vec::new();
  for r in rules.into_iter().filter(|r| r.present && r.components > 0) {
    if let Some(w) = width {
      if offset + r.components > w {
        warn!(
          "{} array {} ({} components at word {}) overruns the {}-word record, dropped.",
          owner, r.name, r.components, offset, w
        );
        continue;
      }
    }
    bindings.push(Binding { name: r.name, offset, components: r.components });
    offset += r.components;
  }
  return bindings;
}

/// Bit of the first CFD flag set when pressure is written.
const CFD_PRESSURE: i64 = 2;
/// Bits of the first CFD flag for the three vorticity axes.
const CFD_VORTICITY: [i64; 3] = [4, 8, 16];
/// Scalar CFD node arrays behind single bits of the first CFD flag.
const CFD_SCALARS: [(&str, i64); 9] = [
  ("ResVorticity", 32),
  ("Enstrophy", 64),
  ("Helicity", 128),
  ("StreamFunc", 256),
  ("Enthalpy", 512),
  ("Density", 1024),
  ("TurbulentKE", 2048),
  ("Dissipation", 4096),
  ("EddyVisc", 1040384),
];

/// Node array table, in on-disk order.
pub(crate) fn node_rules(h: &ControlHeader, dim: usize) -> Vec<ArrayRule> {
  let cfd = h.ncfdv1;
  let all_axes = CFD_VORTICITY.iter().all(|b| cfd & b != 0);
  let mut rules = vec![
    rule("Temperature", h.it != 0, 1),
    rule(DEFLECTED_COORDINATES, h.iu != 0, dim),
    rule("Velocity", h.iv != 0, dim),
    rule("Acceleration", h.ia != 0, dim),
    rule("Pressure", cfd & CFD_PRESSURE != 0, 1),
    rule("Vorticity", all_axes, 3),
  ];
  for (axis, bit) in ["X", "Y", "Z"].iter().zip(CFD_VORTICITY) {
    rules.push(rule(format!("Vorticity_{}", axis), !all_axes && cfd & bit != 0, 1));
  }
  for (name, bit) in CFD_SCALARS {
    rules.push(rule(name, cfd & bit != 0, 1));
  }
  for species in 1..=10 {
    let present = h.ncfdv2 & (1_i64 << species) != 0;
    rules.push(rule(format!("Species{:02}", species), present, 1));
  }
  return rules;
}

/// Name suffix of an integration point through the thickness.
fn point_suffix(point: usize, points: usize) -> String {
  return match (point, points >= 3) {
    (0, _) => String::new(),
    (1, true) => "InnerSurf".to_owned(),
    (2, true) => "OuterSurf".to_owned(),
    _ => format!("IntPt{}", point + 1)
  };
}

/// The per-integration-point rows shared by shells and thick shells.
fn through_thickness_rules(h: &ControlHeader, points: usize) -> Vec<ArrayRule> {
  let mut rules: Vec<ArrayRule> = Vec::new();
  for p in 0..points {
    let sfx = point_suffix(p, points);
    rules.push(rule(format!("Stress{}", sfx), h.ioshl[0], 6));
    rules.push(rule(format!("EffPlastStrn{}", sfx), h.ioshl[1], 1));
    rules.push(rule(format!("IntPtData{}", sfx), h.neips > 0, h.neips.max(0) as usize));
  }
  return rules;
}

/// Solid record table.
pub(crate) fn solid_rules(h: &ControlHeader, strain: bool) -> Vec<ArrayRule> {
  let mut rules = vec![
    rule("Stress", true, 6),
    rule("EffPlastStrn", true, 1),
  ];
  let strained = strain && h.neiph >= 6;
  let mut extra = h.neiph.max(0) as usize - if strained { 6 } else { 0 };
  if h.numfluid != 0 {
    let groups = h.numfluid.unsigned_abs() as usize;
    let with_mass = h.numfluid < 0;
    let needed = 2 + groups + if with_mass { groups } else { 0 };
    if needed <= extra {
      rules.push(rule("Density", true, 1));
      for g in 1..=groups {
        rules.push(rule(format!("VolumeFraction{:02}", g), true, 1));
      }
      rules.push(rule("DominantGroup", true, 1));
      for g in 1..=groups {
        rules.push(rule(format!("SpeciesMass{:02}", g), with_mass, 1));
      }
      extra -= needed;
    } else {
      warn!("{} fluid groups do not fit in {} history words.", groups, extra);
    }
  }
  rules.push(rule("IntPtData", extra > 0, extra));
  rules.push(rule("Strain", strained, 6));
  return rules;
}

/// Thick shell record table.
pub(crate) fn thick_shell_rules(
  h: &ControlHeader,
  points: usize,
  strain: bool
) -> Vec<ArrayRule> {
  let mut rules = through_thickness_rules(h, points);
  rules.push(rule("StrainInnerSurf", strain, 6));
  rules.push(rule("StrainOuterSurf", strain, 6));
  return rules;
}

/// Shell record table.
pub(crate) fn shell_rules(
  h: &ControlHeader,
  points: usize,
  strain: bool
) -> Vec<ArrayRule> {
  let mut rules = through_thickness_rules(h, points);
  rules.extend([
    rule("BendingResultant", h.ioshl[2], 3),
    rule("ShearResultant", h.ioshl[2], 2),
    rule("NormalResultant", h.ioshl[2], 3),
    rule("Thickness", h.ioshl[3], 1),
    rule("ElementMisc", h.ioshl[3], 2),
    rule("StrainInnerSurf", strain, 6),
    rule("StrainOuterSurf", strain, 6),
    rule("InternalEnergy", h.ioshl[3], 1),
  ]);
  return rules;
}

/// Beam record table.
pub(crate) fn beam_rules(h: &ControlHeader) -> Vec<ArrayRule> {
  let resultants = h.nv1d >= 6;
  let integrated = h.nv1d > 6;
  return vec![
    rule("AxialForce", resultants, 1),
    rule("ShearResultant", resultants, 2),
    rule("BendingResultant", resultants, 2),
    rule("TorsionResultant", resultants, 1),
    rule("ShearStress", integrated, 2),
    rule("AxialStress", integrated, 1),
    rule("AxialStrain", integrated, 1),
    rule("PlasticStrain", integrated, 1),
  ];
}

/// Builds the record layouts of every cell type that has state data. Types
/// with a zero-word record get no layout.
pub(crate) fn cell_layouts(
  h: &ControlHeader,
  points: usize,
  strain: bool
) -> Vec<(CellType, CellLayout)> {
  let width = |w: i64| w.max(0) as usize;
  let tables = [
    (CellType::Solid, width(h.nv3d), solid_rules(h, strain)),
    (CellType::ThickShell, width(h.nv3dt), thick_shell_rules(h, points, strain)),
    (CellType::Beam, width(h.nv1d), beam_rules(h)),
    (CellType::Shell, width(h.nv2d), shell_rules(h, points, strain)),
  ];
  return tables.into_iter()
    .filter(|(_, w, _)| *w > 0)
    .map(|(ct, w, rules)| {
      let bindings = register_if_enabled(rules, Some(w), ct.name());
      (ct, CellLayout { width: w, bindings })
    })
    .collect();
}

/// Keeps the present rows of a table that is not laid out in a record.
fn standalone(rules: Vec<ArrayRule>) -> Vec<Binding> {
  return rules.into_iter()
    .filter(|r| r.present && r.components > 0)
    .map(|r| Binding { name: r.name, offset: 0, components: r.components })
    .collect();
}

/// Point arrays every part can get besides the state record's: the
/// displacement, and the node user numbers of the static section.
pub(crate) fn extra_point_arrays(h: &ControlHeader, dim: usize, user_ids: bool) -> Vec<Binding> {
  return standalone(vec![
    rule(DEFLECTION, h.iu != 0, dim),
    rule(USER_ID, user_ids, 1),
  ]);
}

/// Cell arrays that come from the static section: element user numbers and
/// road segment numbers.
pub(crate) fn extra_cell_arrays(
  user_ids: bool,
  road_segments: usize
) -> BTreeMap<CellType, Vec<Binding>> {
  let mut out: BTreeMap<CellType, Vec<Binding>> = BTreeMap::new();
  for ct in CellType::all() {
    let bindings = standalone(vec![
      rule(USER_ID, user_ids && ct.has_user_ids(), 1),
      rule(SEGMENT_ID, *ct == CellType::RoadSurface && road_segments > 0, 1),
    ]);
    if !bindings.is_empty() {
      out.insert(*ct, bindings);
    }
  }
  return out;
}
