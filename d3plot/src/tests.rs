
use std::collections::BTreeMap;
use std::path::Path;

use tempfile::TempDir;

use crate::family::{chunk_sizes, Endian, WordKind, WordSize, EOF_MARKER};
use crate::parts::points::{prefers_dense, UniquePoints};
use crate::prelude::*;
use crate::util::{adaptation_suffix, family_file_name, split_family_path};
use synth::*;

/// Writes a database with a single hexahedron, one global pair, deflected
/// coordinates (coordinates plus half the time) and a solid record of
/// `1..=6, time` per state.
fn write_single_solid(model: StorageModel, times: &[f64]) -> Writer {
  let mut h = header();
  h[NUMNP] = 8;
  h[NGLBV] = 2;
  h[IU] = 1;
  h[NEL8] = 1;
  h[NUMMAT8] = 1;
  h[NV3D] = 7;
  let xyz = coords(8);
  let mut w = Writer::new(model);
  w.control("single solid", &h).floats(&xyz).ints(&[1, 2, 3, 4, 5, 6, 7, 8, 1]);
  for t in times {
    w.float(*t).floats(&[10.0, 20.0]);
    w.floats(&xyz.iter().map(|c| c + 0.5 * t).collect::<Vec<f64>>());
    w.floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, *t]);
  }
  return w;
}

/// Writes two solids over twelve nodes, one per material, with temperatures
/// `100 + node` and solid records `10k+1..=10k+6, k` in every state. With
/// user ids, node `n` is numbered `1001 + n` and solid `k` is `501 + k`.
fn write_two_materials(dir: &Path, maxint: i64, deletion: Option<[f64; 2]>, user_ids: bool) {
  let mut h = header();
  h[NUMNP] = 12;
  h[IT] = 1;
  h[NEL8] = 2;
  h[NUMMAT8] = 2;
  h[NV3D] = 7;
  h[MAXINT] = maxint;
  if user_ids {
    h[NARBS] = 10 + 12 + 2;
  }
  let mut w = Writer::native();
  w.control("two materials", &h)
    .floats(&coords(12))
    .ints(&[1, 2, 3, 4, 5, 6, 7, 8, 1])
    .ints(&[5, 6, 7, 8, 9, 10, 11, 12, 2]);
  if user_ids {
    w.ints(&[1, 0, 0, 0, 0, 0, 0, 0, 0, 0])
      .ints(&(1001..=1012).collect::<Vec<i64>>())
      .ints(&[501, 502]);
  }
  w.float(0.0);
  w.floats(&(0..12).map(|n| 100.0 + n as f64).collect::<Vec<f64>>());
  for k in 0..2 {
    let base = 10.0 * k as f64;
    w.floats(&[base + 1.0, base + 2.0, base + 3.0, base + 4.0, base + 5.0, base + 6.0, k as f64]);
  }
  if let Some(flags) = deletion {
    w.floats(&flags);
  }
  w.float(EOF_MARKER);
  w.save(&dir.join("d3plot"));
}

fn open(dir: &TempDir) -> D3plotDatabase {
  return D3plotDatabase::open(&dir.path().join("d3plot"), OpenOptions::default()).unwrap();
}

#[test]
fn test_suffixes() {
  assert_eq!(adaptation_suffix(0), "");
  assert_eq!(adaptation_suffix(1), "aa");
  assert_eq!(adaptation_suffix(2), "ab");
  assert_eq!(adaptation_suffix(26), "az");
  assert_eq!(adaptation_suffix(27), "ba");
  assert_eq!(family_file_name("d3plot", 0, 0), "d3plot");
  assert_eq!(family_file_name("d3plot", 0, 3), "d3plot03");
  assert_eq!(family_file_name("d3plot", 1, 1), "d3plotaa01");
  assert_eq!(family_file_name("d3plot", 0, 100), "d3plot100");
}

#[test]
fn test_split_family_path() {
  let dir = tempfile::tempdir().unwrap();
  let p = dir.path();
  std::fs::write(p.join("d3plot"), b"").unwrap();
  std::fs::write(p.join("d3plot01"), b"").unwrap();
  std::fs::write(p.join("d3plotaa"), b"").unwrap();
  let base = |name: &str| split_family_path(&p.join(name)).1;
  assert_eq!(base("d3plot"), "d3plot");
  assert_eq!(base("d3plot01"), "d3plot");
  assert_eq!(base("d3plotaa"), "d3plot");
  assert_eq!(base("crash.k"), "d3plot");
  assert_eq!(base("run.key"), "d3plot");
  // digits are kept when the shorter name is not there
  assert_eq!(base("model2"), "model2");
  assert_eq!(split_family_path(&p.join("d3plot01")).0, p.to_path_buf());
}

#[test]
fn test_chunk_sizes() {
  assert!(chunk_sizes(0, 3).is_empty());
  assert!(chunk_sizes(3, 0).is_empty());
  assert_eq!(chunk_sizes(10, 3), vec![30]);
  let big = chunk_sizes(1 << 20, 7);
  assert_eq!(big.iter().sum::<usize>(), 7 << 20);
  assert!(big.iter().all(|s| s % 7 == 0 && *s <= crate::family::MAX_CHUNK_WORDS));
}

#[test]
fn test_single_solid() {
  let dir = tempfile::tempdir().unwrap();
  let times = [0.0, 0.5];
  let mut w = write_single_solid(StorageModel::default(), &times);
  w.float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let mut db = open(&dir);
  assert_eq!(db.time_values(), times.to_vec());
  assert_eq!(db.time_range(), Some((0.0, 0.5)));
  assert!(!db.truncated_tail());
  let dict = db.control(0).unwrap();
  assert_eq!(dict.header.title, "single solid");
  assert_eq!(dict.header.release, "R9");
  assert_eq!(dict.state_words(), 1 + 2 + 24 + 7);
  let parts = db.list_parts();
  assert_eq!(parts.len(), 1);
  assert_eq!(parts[0].cell_type, CellType::Solid);
  assert_eq!(parts[0].name, "Part1");
  assert_eq!((parts[0].cells, parts[0].points), (1, 8));
  assert_eq!(db.part_topology(0).unwrap().kinds, vec![CellKind::Hexahedron]);
  assert_eq!(db.part_topology(0).unwrap().cell(0), &[0, 1, 2, 3, 4, 5, 6, 7]);
  db.load_timestep(1).unwrap();
  assert_eq!(db.current_step(), Some(1));
  let part = db.part(0).unwrap();
  let expected: Vec<f64> = coords(8).iter().map(|c| c + 0.25).collect();
  assert_eq!(part.point_columns["DeflectedCoordinates"].values, expected);
  assert_eq!(part.point_columns["Deflection"].values, vec![0.25; 24]);
  assert_eq!(part.cell_columns["Stress"].tuple(0), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
  assert_eq!(part.cell_columns["EffPlastStrn"].values, vec![0.5]);
  assert!(part.deleted.is_none());
}

#[test]
fn test_swapped_double_precision() {
  let dir = tempfile::tempdir().unwrap();
  let model = StorageModel { word_size: WordSize::Eight, endian: Endian::swapped() };
  let times = [0.0, 0.125, 0.25];
  let mut w = write_single_solid(model, &times);
  w.float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let mut db = open(&dir);
  assert_eq!(db.storage_model(), model);
  let summary = db.summary();
  assert_eq!(summary.word_bytes, 8);
  assert!(summary.swapped);
  assert_eq!(summary.timesteps, 3);
  assert_eq!(summary.materials, 1);
  assert_eq!(db.time_values(), times.to_vec());
  db.load_timestep(2).unwrap();
  let part = db.part(0).unwrap();
  assert_eq!(part.cell_columns["EffPlastStrn"].values, vec![0.25]);
}

#[test]
fn test_states_in_later_files_and_titles() {
  let dir = tempfile::tempdir().unwrap();
  let mut w = write_single_solid(StorageModel::default(), &[]);
  w.float(EOF_MARKER).ints(&[90001, 1, 1]).chars("Hood", 18);
  w.save(&dir.path().join("d3plot"));
  // the states go to the next file of the family
  let mut only_states = Writer::native();
  for t in [0.0, 1.0] {
    only_states.float(t).floats(&[10.0, 20.0]);
    only_states.floats(&coords(8).iter().map(|c| c + 0.5 * t).collect::<Vec<f64>>());
    only_states.floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, t]);
  }
  only_states.float(EOF_MARKER).save(&dir.path().join("d3plot01"));
  let mut db = open(&dir);
  assert_eq!(db.family().files().len(), 2);
  assert_eq!(db.time_values(), vec![0.0, 1.0]);
  assert_eq!(db.time_steps().records()[0].mark.file, 1);
  assert_eq!(db.list_parts()[0].name, "Hood");
  db.load_timestep(1).unwrap();
  assert_eq!(db.part(0).unwrap().point_columns["Deflection"].values, vec![0.5; 24]);
}

#[test]
fn test_truncated_tail() {
  let dir = tempfile::tempdir().unwrap();
  let mut w = write_single_solid(StorageModel::default(), &[0.0, 1.0]);
  // the start of a third state, cut short
  w.float(2.0).floats(&[0.0; 9]);
  w.save(&dir.path().join("d3plot"));
  let mut db = open(&dir);
  assert_eq!(db.time_step_count(), 2);
  assert!(db.truncated_tail());
  db.load_timestep(1).unwrap();
  let err = db.load_timestep(2).unwrap_err();
  assert!(matches!(err, D3plotError::InvalidTimeStep { index: 2, count: 2 }));
  // the failed load left the previous data in place
  assert_eq!(db.current_step(), Some(1));
  assert_eq!(db.part(0).unwrap().cell_columns["EffPlastStrn"].values, vec![1.0]);
}

#[test]
fn test_no_files() {
  let dir = tempfile::tempdir().unwrap();
  let err = D3plotDatabase::open(&dir.path().join("d3plot"), OpenOptions::default())
    .unwrap_err();
  assert!(matches!(err, D3plotError::NoFilesFound { .. }));
}

#[test]
fn test_unrecognized_format() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("d3plot"), vec![0u8; 512]).unwrap();
  let err = D3plotDatabase::open(&dir.path().join("d3plot"), OpenOptions::default())
    .unwrap_err();
  assert!(matches!(err, D3plotError::UnrecognizedFormat(_)));
}

#[test]
fn test_unsupported_geometry() {
  let dir = tempfile::tempdir().unwrap();
  let mut h = header();
  h[NDIM] = 2;
  let mut w = Writer::native();
  w.control("flat", &h).float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let err = D3plotDatabase::open(&dir.path().join("d3plot"), OpenOptions::default())
    .unwrap_err();
  assert!(matches!(err, D3plotError::UnsupportedGeometry(2)));
}

#[test]
fn test_adaptation_levels() {
  let dir = tempfile::tempdir().unwrap();
  let mut w = write_single_solid(StorageModel::default(), &[0.0]);
  w.float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let mut h = header();
  h[NUMNP] = 12;
  h[NGLBV] = 2;
  h[IU] = 1;
  h[NEL8] = 2;
  h[NUMMAT8] = 1;
  h[NV3D] = 7;
  let xyz = coords(12);
  let mut w = Writer::native();
  w.control("adapted", &h)
    .floats(&xyz)
    .ints(&[1, 2, 3, 4, 5, 6, 7, 8, 1])
    .ints(&[5, 6, 7, 8, 9, 10, 11, 12, 1]);
  w.float(1.0).floats(&[10.0, 20.0]);
  w.floats(&xyz.iter().map(|c| c + 0.5).collect::<Vec<f64>>());
  w.floats(&[0.0; 14]);
  w.float(EOF_MARKER).save(&dir.path().join("d3plotaa"));
  let mut db = open(&dir);
  assert_eq!(db.family().level_count(), 2);
  assert_eq!(db.time_values(), vec![0.0, 1.0]);
  assert_eq!(db.time_steps().records()[1].level, 1);
  assert_eq!(db.control(1).unwrap().node_count(), 12);
  assert_eq!(db.list_parts()[0].points, 8);
  db.load_timestep(1).unwrap();
  let parts = db.list_parts();
  assert_eq!((parts[0].cells, parts[0].points), (2, 12));
  assert_eq!(db.part(0).unwrap().point_columns["Deflection"].values, vec![0.5; 36]);
  db.load_timestep(0).unwrap();
  assert_eq!(db.list_parts()[0].points, 8);
}

#[test]
fn test_node_scatter_and_bijection() {
  let dir = tempfile::tempdir().unwrap();
  write_two_materials(dir.path(), 0, None, false);
  let mut db = open(&dir);
  let parts = db.list_parts();
  assert_eq!(parts.len(), 2);
  assert_eq!(parts.iter().map(|p| p.cells).sum::<usize>(), 2);
  assert_eq!(parts[1].name, "Part2");
  db.load_timestep(0).unwrap();
  let first: Vec<f64> = (0..8).map(|n| 100.0 + n as f64).collect();
  let second: Vec<f64> = (4..12).map(|n| 100.0 + n as f64).collect();
  assert_eq!(db.part(0).unwrap().point_columns["Temperature"].values, first);
  assert_eq!(db.part(1).unwrap().point_columns["Temperature"].values, second);
  let part = db.part(1).unwrap();
  assert_eq!(part.points.globals(), (4..12).collect::<Vec<usize>>());
  let globals = part.points.globals();
  for (local, global) in part.topology.connectivity.iter()
    .zip(part.topology.global_connectivity.iter()) {
    assert_eq!(globals[*local], *global);
  }
  assert_eq!(part.cell_columns["Stress"].tuple(0), &[11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
  assert_eq!(part.coordinates.tuple(0), &[4.0, 8.0, 12.0]);
}

#[test]
fn test_array_toggles() {
  let dir = tempfile::tempdir().unwrap();
  write_two_materials(dir.path(), 0, None, false);
  let mut db = open(&dir);
  let err = db.set_array_enabled(ArrayScope::Point, "Nope", false).unwrap_err();
  assert!(matches!(err, D3plotError::NoSuchArray(_)));
  db.set_array_enabled(ArrayScope::Point, "Temperature", false).unwrap();
  db.set_array_enabled(ArrayScope::Cell(CellType::Solid), "Stress", false).unwrap();
  assert!(!db.is_array_enabled(ArrayScope::Point, "Temperature"));
  db.load_timestep(0).unwrap();
  let part = db.part(1).unwrap();
  assert!(part.point_columns.is_empty());
  assert!(!part.cell_columns.contains_key("Stress"));
  assert_eq!(part.cell_columns["EffPlastStrn"].values, vec![1.0]);
}

#[test]
fn test_sources() {
  let dir = tempfile::tempdir().unwrap();
  write_two_materials(dir.path(), 0, None, false);
  let names: BTreeMap<i64, String> = [(1, "Bumper".to_owned())].into_iter().collect();
  let ranges: BTreeMap<CellType, (usize, usize)> = [(CellType::Solid, (1, 2))].into_iter().collect();
  let mut db = D3plotDatabase::open_with_sources(
    &dir.path().join("d3plot"),
    OpenOptions::default(),
    Some(Box::new(names.clone())),
    None
  ).unwrap();
  assert_eq!(db.list_parts()[0].name, "Bumper");
  assert!(!db.declare_part(99, 1, "Nothing"));
  assert!(db.declare_part(CellType::Solid.code(), 2, "Door"));
  assert_eq!(db.list_parts()[1].name, "Door");
  let mut db = D3plotDatabase::open_with_sources(
    &dir.path().join("d3plot"),
    OpenOptions::default(),
    Some(Box::new(names)),
    Some(Box::new(ranges))
  ).unwrap();
  let parts = db.list_parts();
  assert_eq!(parts.len(), 1);
  assert_eq!(parts[0].material, 2);
  db.load_timestep(0).unwrap();
  let part = db.part(0).unwrap();
  assert_eq!(part.topology.block_ids, vec![1]);
  assert_eq!(part.cell_columns["EffPlastStrn"].values, vec![1.0]);
}

#[test]
fn test_deletion() {
  let dir = tempfile::tempdir().unwrap();
  write_two_materials(dir.path(), 10003, Some([1.0, 0.0]), false);
  let mut db = open(&dir);
  assert_eq!(db.control(0).unwrap().derived.deletion, DeletionMode::Cell);
  assert_eq!(db.control(0).unwrap().derived.integration_points, 3);
  db.load_timestep(0).unwrap();
  assert_eq!(db.part(0).unwrap().deleted, Some(vec![false]));
  assert_eq!(db.part(1).unwrap().deleted, Some(vec![true]));
  // flagged cells stay unless removal was asked for
  assert_eq!(db.compacted_part(1).unwrap().topology.cell_count(), 1);
  let options = OpenOptions { deleted_cells: DeletedCells::Remove, ..Default::default() };
  let mut db = D3plotDatabase::open(&dir.path().join("d3plot"), options).unwrap();
  db.load_timestep(0).unwrap();
  let gone = db.compacted_part(1).unwrap();
  assert_eq!(gone.topology.cell_count(), 0);
  assert!(gone.point_globals.is_empty());
  let kept = db.compacted_part(0).unwrap();
  assert_eq!(kept.topology.cell_count(), 1);
  assert_eq!(kept.point_globals, (0..8).collect::<Vec<usize>>());
  assert_eq!(kept.cell_columns["Stress"].values.len(), 6);
}

#[test]
fn test_compaction_drops_unused_points() {
  let dir = tempfile::tempdir().unwrap();
  let mut h = header();
  h[NUMNP] = 12;
  h[NEL8] = 2;
  h[NUMMAT8] = 1;
  h[NV3D] = 7;
  h[MAXINT] = -10000 - 2;
  let mut w = Writer::native();
  w.control("one part", &h)
    .floats(&coords(12))
    .ints(&[1, 2, 3, 4, 5, 6, 7, 8, 1])
    .ints(&[5, 6, 7, 8, 9, 10, 11, 12, 1]);
  w.float(0.0).floats(&[0.0; 14]).floats(&[0.0, 1.0]).float(EOF_MARKER);
  w.save(&dir.path().join("d3plot"));
  let options = OpenOptions { deleted_cells: DeletedCells::Remove, ..Default::default() };
  let mut db = D3plotDatabase::open(&dir.path().join("d3plot"), options).unwrap();
  db.load_timestep(0).unwrap();
  let part = db.compacted_part(0).unwrap();
  assert_eq!(part.topology.cell_count(), 1);
  assert_eq!(part.topology.block_ids, vec![1]);
  assert_eq!(part.point_globals, (4..12).collect::<Vec<usize>>());
  assert_eq!(part.topology.cell(0), &[0, 1, 2, 3, 4, 5, 6, 7]);
  assert_eq!(part.coordinates.tuple(0), &[4.0, 8.0, 12.0]);
}

#[test]
fn test_rigid_shells() {
  let dir = tempfile::tempdir().unwrap();
  let mut h = header();
  h[NDIM] = 5;
  h[NUMNP] = 6;
  h[NEL4] = 2;
  h[NUMMAT4] = 2;
  h[NV2D] = 4;
  h[IOSHL4] = 1000;
  let mut w = Writer::native();
  w.control("rigid", &h)
    .ints(&[1, 1, 2])
    .floats(&coords(6))
    .ints(&[1, 2, 3, 4, 1])
    .ints(&[3, 4, 5, 6, 2]);
  w.float(0.0).floats(&[0.25, 7.0, 8.0, 9.0]).float(EOF_MARKER);
  w.save(&dir.path().join("d3plot"));
  let mut db = open(&dir);
  let dict = db.control(0).unwrap();
  assert_eq!(dict.numrbe, 1);
  assert_eq!(dict.cell_count(CellType::Shell), 1);
  assert_eq!(dict.cell_count(CellType::RigidBody), 1);
  assert_eq!(dict.state_words(), 5);
  let parts = db.list_parts();
  assert_eq!(parts.len(), 2);
  assert_eq!((parts[0].cell_type, parts[0].material), (CellType::Shell, 1));
  assert_eq!((parts[1].cell_type, parts[1].material), (CellType::RigidBody, 2));
  db.load_timestep(0).unwrap();
  let shell = db.part(0).unwrap();
  assert_eq!(shell.cell_columns["Thickness"].values, vec![0.25]);
  assert_eq!(shell.cell_columns["ElementMisc"].values, vec![7.0, 8.0]);
  assert_eq!(shell.cell_columns["InternalEnergy"].values, vec![9.0]);
  assert!(db.part(1).unwrap().cell_columns.is_empty());
  assert_eq!(db.part_topology(1).unwrap().kinds, vec![CellKind::Quad]);
}

#[test]
fn test_solid_kinds() {
  let dir = tempfile::tempdir().unwrap();
  let mut h = header();
  h[NUMNP] = 8;
  h[NEL8] = 4;
  h[NUMMAT8] = 1;
  h[NV3D] = 7;
  let mut w = Writer::native();
  w.control("kinds", &h)
    .floats(&coords(8))
    .ints(&[1, 2, 3, 4, 4, 4, 4, 4, 1])
    .ints(&[1, 2, 3, 4, 5, 5, 5, 5, 1])
    .ints(&[1, 2, 3, 4, 5, 6, 6, 6, 1])
    .ints(&[1, 2, 3, 4, 5, 6, 7, 8, 1])
    .float(EOF_MARKER);
  w.save(&dir.path().join("d3plot"));
  let db = open(&dir);
  assert_eq!(db.time_step_count(), 0);
  assert_eq!(db.time_range(), None);
  let topology = db.part_topology(0).unwrap();
  assert_eq!(topology.kinds, vec![
    CellKind::Tetra,
    CellKind::Pyramid,
    CellKind::Wedge,
    CellKind::Hexahedron
  ]);
  assert_eq!(topology.offsets, vec![0, 4, 9, 15, 23]);
  assert_eq!(topology.cell(2), &[0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_node_array_names() {
  let dir = tempfile::tempdir().unwrap();
  let names = |ncfdv1: i64, ncfdv2: i64| {
    let mut h = header();
    h[NUMNP] = 8;
    h[NCFDV1] = ncfdv1;
    h[NCFDV2] = ncfdv2;
    let mut w = Writer::native();
    w.control("cfd", &h).floats(&coords(8)).float(EOF_MARKER);
    w.save(&dir.path().join("d3plot"));
    let db = open(&dir);
    return db.point_arrays().iter()
      .map(|b| (b.name.clone(), b.components))
      .collect::<Vec<(String, usize)>>();
  };
  let owned = |v: &[(&str, usize)]| v.iter()
    .map(|(n, c)| (n.to_string(), *c))
    .collect::<Vec<(String, usize)>>();
  assert_eq!(names(2 | 4 | 8 | 16, 0), owned(&[("Pressure", 1), ("Vorticity", 3)]));
  assert_eq!(names(4 | 16, 0), owned(&[("Vorticity_X", 1), ("Vorticity_Z", 1)]));
  assert_eq!(names(32 | 1024, 1 << 2), owned(&[
    ("ResVorticity", 1),
    ("Density", 1),
    ("Species02", 1)
  ]));
}

#[test]
fn test_unique_points() {
  // four points out of a hundred: dense
  let dense = UniquePoints::build(&[3, 1, 2, 0, 3], 100, 4);
  assert_eq!(dense.set.representation(), "dense");
  assert_eq!(dense.local, vec![3, 1, 2, 0, 3]);
  // two points far apart: sparse, same numbering rule
  let sparse = UniquePoints::build(&[1500, 10], 2000, 4);
  assert_eq!(sparse.set.representation(), "sparse");
  assert_eq!(sparse.local, vec![1, 0]);
  assert_eq!(sparse.set.globals(), vec![10, 1500]);
  assert!(sparse.set.contains(1500) && !sparse.set.contains(11));
  assert_eq!(sparse.set.bounds(), Some((10, 1500)));
  assert!(prefers_dense(4, 4, 0, 3));
  assert!(!prefers_dense(2, 4, 10, 1500));
  // dense sets rank across block boundaries
  let conn: Vec<usize> = (60..200).step_by(2).collect();
  let wide = UniquePoints::build(&conn, 300, 8);
  assert_eq!(wide.set.representation(), "dense");
  assert_eq!(wide.local, (0..conn.len()).collect::<Vec<usize>>());
  assert_eq!(wide.set.local(198), Some(69));
  assert_eq!(wide.set.local(199), None);
  // an empty part
  let none = UniquePoints::build(&[], 10, 4);
  assert!(none.set.is_empty());
  assert_eq!(none.set.bounds(), None);
}

#[test]
fn test_unique_points_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  write_two_materials(dir.path(), 0, None, false);
  let db = open(&dir);
  let topology = db.part_topology(1).unwrap();
  let globals = db.part(1).unwrap().points.globals();
  let once = UniquePoints::build(&topology.global_connectivity, 12, 4);
  assert_eq!(once.local, topology.connectivity);
  assert_eq!(once.set.globals(), globals);
  let back: Vec<usize> = once.local.iter().map(|l| globals[*l]).collect();
  let twice = UniquePoints::build(&back, 12, 4);
  assert_eq!(twice.local, once.local);
  assert_eq!(twice.set.globals(), globals);
}

#[test]
fn test_word_stream() {
  let dir = tempfile::tempdir().unwrap();
  let mut w = Writer::native();
  w.ints(&[1, 2, 3]).float(1.5);
  w.save(&dir.path().join("words"));
  let mut family = Family::open(dir.path(), "words").unwrap();
  assert_eq!(family.files().len(), 1);
  assert_eq!(family.file_words(0), 4);
  assert_eq!(family.read_ints(2).unwrap(), vec![1, 2]);
  family.buffer_chunk(WordKind::Int, 1).unwrap();
  let err = family.next_float().unwrap_err();
  assert!(matches!(err, D3plotError::WordKindMismatch { .. }));
  assert_eq!(family.next_int().unwrap(), 3);
  assert!(matches!(family.next_int().unwrap_err(), D3plotError::BufferExhausted { .. }));
  assert_eq!(family.read_floats(1).unwrap(), vec![1.5]);
  assert!(family.at_end_of_file());
  let err = family.buffer_chunk(WordKind::Float, 1).unwrap_err();
  assert!(matches!(err, D3plotError::TruncatedRead { .. }));
  let err = family.section_mark(0, Section::Control).unwrap_err();
  assert!(matches!(err, D3plotError::UnmarkedSection { .. }));
  family.seek(SectionMark { file: 0, offset: 0 }).unwrap();
  family.mark_section_start(0, Section::Control);
  family.skip_words(3).unwrap();
  family.mark_section_start(0, Section::Control);
  assert_eq!(family.section_mark(0, Section::Control).unwrap().offset, 0);
  family.skip_to_word(Section::Control, 0, 3).unwrap();
  assert_eq!(family.read_floats(1).unwrap(), vec![1.5]);
  assert!(family.skip_words(1).is_err());
}

#[test]
fn test_cell_types() {
  for ct in CellType::all() {
    assert_eq!(CellType::from_code(ct.code()), Some(*ct));
    assert_eq!(ct.name().parse::<CellType>(), Ok(*ct));
  }
  assert_eq!(CellType::from_code(-1), None);
  assert_eq!(CellType::from_code(99), None);
  assert_eq!(CellKind::classify_solid(&[1, 2, 3]), CellKind::Hexahedron);
  assert_eq!(CellKind::for_type(CellType::ThickShell), CellKind::QuadraticQuad);
}

/// Checks that every level's states and static words fit in its files.
fn assert_state_sizes_fit(db: &D3plotDatabase) {
  let family = db.family();
  for level in 0..family.level_count() {
    let dict = db.control(level).unwrap();
    let steps = db.time_steps().records().iter().filter(|r| r.level == level).count() as u64;
    let words: u64 = (0..family.files().len())
      .filter(|i| family.files()[*i].level == level)
      .map(|i| family.file_words(i))
      .sum();
    assert!(dict.state_words() * steps + dict.derived.pre_state_words <= words);
  }
}

/// Writes two SPH particles with one material and a radius each, the second
/// one dead (zero material word) in the only state.
fn write_particles(dir: &Path) {
  let mut h = header();
  h[NUMNP] = 2;
  h[NMSPH] = 2;
  h[NGPSPH] = 1;
  let mut w = Writer::native();
  w.control("particles", &h)
    .ints(&[10, 1, 0, 0, 0, 0, 0, 0, 0, 0])
    .floats(&coords(2))
    .ints(&[1, 1, 2, 1]);
  w.float(0.0).floats(&[1.0, 0.5, 0.0, 0.7]).float(EOF_MARKER);
  w.save(&dir.join("d3plot"));
}

#[test]
fn test_particles() {
  let dir = tempfile::tempdir().unwrap();
  write_particles(dir.path());
  let mut db = open(&dir);
  let dict = db.control(0).unwrap();
  assert_eq!(dict.sph_data_words, 2);
  assert_eq!(dict.cell_count(CellType::Particle), 2);
  assert_eq!(dict.state_words(), 1 + 4);
  assert_state_sizes_fit(&db);
  let parts = db.list_parts();
  assert_eq!(parts.len(), 1);
  assert_eq!((parts[0].cell_type, parts[0].cells, parts[0].points), (CellType::Particle, 2, 2));
  assert_eq!(db.part_topology(0).unwrap().kinds, vec![CellKind::Vertex, CellKind::Vertex]);
  db.load_timestep(0).unwrap();
  assert_eq!(db.part(0).unwrap().deleted, Some(vec![false, true]));
  assert_eq!(db.compacted_part(0).unwrap().topology.cell_count(), 2);
  let options = OpenOptions { deleted_cells: DeletedCells::Remove, ..Default::default() };
  let mut db = D3plotDatabase::open(&dir.path().join("d3plot"), options).unwrap();
  db.load_timestep(0).unwrap();
  let alive = db.compacted_part(0).unwrap();
  assert_eq!(alive.topology.cell_count(), 1);
  assert_eq!(alive.point_globals, vec![0]);
  // ignoring deletion reads no flags at all
  let options = OpenOptions { deleted_cells: DeletedCells::Ignore, ..Default::default() };
  let mut db = D3plotDatabase::open(&dir.path().join("d3plot"), options).unwrap();
  db.load_timestep(0).unwrap();
  assert!(db.part(0).unwrap().deleted.is_none());
}

#[test]
fn test_sph_attribute_count() {
  let dir = tempfile::tempdir().unwrap();
  let mut h = header();
  h[NUMNP] = 1;
  h[NMSPH] = 1;
  let mut w = Writer::native();
  w.control("few attributes", &h)
    .ints(&[5, 1, 0, 0, 0])
    .floats(&coords(1))
    .ints(&[1, 1])
    .float(EOF_MARKER);
  w.save(&dir.path().join("d3plot"));
  let err = D3plotDatabase::open(&dir.path().join("d3plot"), OpenOptions::default())
    .unwrap_err();
  assert!(matches!(err, D3plotError::CorruptHeader(_)));
}

#[test]
fn test_beams_and_thick_shells() {
  let dir = tempfile::tempdir().unwrap();
  let mut h = header();
  h[NUMNP] = 8;
  h[NEL2] = 1;
  h[NUMMAT2] = 1;
  h[NV1D] = 6;
  h[NELT] = 1;
  h[NUMMATT] = 1;
  h[NV3DT] = 26;
  h[MAXINT] = 2;
  h[IOSHL1] = 1000;
  h[IOSHL2] = 1000;
  let mut w = Writer::native();
  w.control("beams", &h)
    .floats(&coords(8))
    .ints(&[1, 2, 3, 4, 5, 6, 7, 8, 1])
    .ints(&[1, 2, 3, 0, 0, 2]);
  let thick: Vec<f64> = (1..=26).map(|v| v as f64).collect();
  w.float(0.0).floats(&thick).floats(&[31.0, 32.0, 33.0, 34.0, 35.0, 36.0]);
  w.float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let mut db = open(&dir);
  let dict = db.control(0).unwrap();
  assert!(dict.derived.strain);
  assert_eq!(dict.state_words(), 1 + 26 + 6);
  assert_state_sizes_fit(&db);
  let names = |ct: CellType| db.cell_arrays(ct).iter()
    .map(|b| (b.name.clone(), b.offset, b.components))
    .collect::<Vec<(String, usize, usize)>>();
  let owned = |v: &[(&str, usize, usize)]| v.iter()
    .map(|(n, o, c)| (n.to_string(), *o, *c))
    .collect::<Vec<(String, usize, usize)>>();
  assert_eq!(names(CellType::Beam), owned(&[
    ("AxialForce", 0, 1),
    ("ShearResultant", 1, 2),
    ("BendingResultant", 3, 2),
    ("TorsionResultant", 5, 1)
  ]));
  assert_eq!(names(CellType::ThickShell), owned(&[
    ("Stress", 0, 6),
    ("EffPlastStrn", 6, 1),
    ("StressIntPt2", 7, 6),
    ("EffPlastStrnIntPt2", 13, 1),
    ("StrainInnerSurf", 14, 6),
    ("StrainOuterSurf", 20, 6)
  ]));
  let parts = db.list_parts();
  assert_eq!((parts[0].cell_type, parts[0].material), (CellType::Beam, 2));
  assert_eq!((parts[1].cell_type, parts[1].material), (CellType::ThickShell, 1));
  assert_eq!(db.part_topology(0).unwrap().kinds, vec![CellKind::Line]);
  assert_eq!(db.part_topology(0).unwrap().cell(0), &[0, 1]);
  assert_eq!(db.part_topology(1).unwrap().kinds, vec![CellKind::QuadraticQuad]);
  db.load_timestep(0).unwrap();
  let beam = db.part(0).unwrap();
  assert_eq!(beam.cell_columns["AxialForce"].values, vec![31.0]);
  assert_eq!(beam.cell_columns["ShearResultant"].values, vec![32.0, 33.0]);
  assert_eq!(beam.cell_columns["BendingResultant"].values, vec![34.0, 35.0]);
  assert_eq!(beam.cell_columns["TorsionResultant"].values, vec![36.0]);
  let shell = db.part(1).unwrap();
  assert_eq!(shell.cell_columns["Stress"].values, thick[0..6].to_vec());
  assert_eq!(shell.cell_columns["EffPlastStrnIntPt2"].values, vec![14.0]);
  assert_eq!(shell.cell_columns["StrainInnerSurf"].values, thick[14..20].to_vec());
  assert_eq!(shell.cell_columns["StrainOuterSurf"].values, thick[20..26].to_vec());
}

#[test]
fn test_road_surfaces() {
  let dir = tempfile::tempdir().unwrap();
  let mut h = header();
  h[NDIM] = 7;
  let mut w = Writer::native();
  w.control("road", &h)
    .ints(&[0, 0])
    .ints(&[4, 2, 1, 0])
    .ints(&[11, 12, 13, 14])
    .floats(&coords(4))
    .ints(&[7, 2])
    .ints(&[11, 12, 13, 14])
    .ints(&[14, 13, 12, 11]);
  w.float(0.0).float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let mut db = open(&dir);
  let dict = db.control(0).unwrap();
  assert_eq!(dict.cell_count(CellType::RoadSurface), 2);
  assert_eq!(dict.state_words(), 1);
  assert_state_sizes_fit(&db);
  let parts = db.list_parts();
  assert_eq!(parts.len(), 1);
  assert_eq!(parts[0].name, "RoadSurface1");
  assert_eq!((parts[0].cells, parts[0].points), (2, 4));
  let topology = db.part_topology(0).unwrap();
  assert_eq!(topology.kinds, vec![CellKind::Quad, CellKind::Quad]);
  assert_eq!(topology.cell(1), &[3, 2, 1, 0]);
  assert_eq!(db.part(0).unwrap().coordinates.tuple(1), &[1.0, 2.0, 3.0]);
  let arrays: Vec<String> = db.cell_arrays(CellType::RoadSurface).into_iter().map(|b| b.name).collect();
  assert_eq!(arrays, vec!["SegmentID".to_owned()]);
  db.load_timestep(0).unwrap();
  assert_eq!(db.part(0).unwrap().cell_columns["SegmentID"].values, vec![1.0, 2.0]);
}

#[test]
fn test_user_ids() {
  let dir = tempfile::tempdir().unwrap();
  write_two_materials(dir.path(), 0, None, true);
  let mut db = open(&dir);
  let tables = db.control(0).unwrap().user_id_tables.clone().unwrap();
  assert_eq!(tables.nodes.len(), 12);
  assert_eq!(tables.cells[&CellType::Solid], vec![501, 502]);
  assert!(db.point_arrays().iter().any(|b| b.name == "UserID"));
  assert!(db.cell_arrays(CellType::Solid).iter().any(|b| b.name == "UserID"));
  db.load_timestep(0).unwrap();
  let part = db.part(1).unwrap();
  let numbers: Vec<f64> = (1005..=1012).map(|n| n as f64).collect();
  assert_eq!(part.point_columns["UserID"].values, numbers);
  assert_eq!(part.cell_columns["UserID"].values, vec![502.0]);
  assert_eq!(part.cell_columns["Stress"].tuple(0), &[11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
  assert_eq!(db.part(0).unwrap().cell_columns["UserID"].values, vec![501.0]);
  db.set_array_enabled(ArrayScope::Cell(CellType::Solid), "UserID", false).unwrap();
  db.load_timestep(0).unwrap();
  assert!(!db.part(1).unwrap().cell_columns.contains_key("UserID"));
  assert!(db.part(1).unwrap().point_columns.contains_key("UserID"));
}

#[test]
fn test_deflection_toggle() {
  let dir = tempfile::tempdir().unwrap();
  let mut w = write_single_solid(StorageModel::default(), &[0.0, 0.5]);
  w.float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let mut db = open(&dir);
  assert!(db.point_arrays().iter().any(|b| b.name == "Deflection"));
  db.set_array_enabled(ArrayScope::Point, "DeflectedCoordinates", false).unwrap();
  db.load_timestep(1).unwrap();
  let part = db.part(0).unwrap();
  assert!(!part.point_columns.contains_key("DeflectedCoordinates"));
  assert_eq!(part.point_columns["Deflection"].values, vec![0.25; 24]);
  db.set_array_enabled(ArrayScope::Point, "DeflectedCoordinates", true).unwrap();
  db.set_array_enabled(ArrayScope::Point, "Deflection", false).unwrap();
  db.load_timestep(1).unwrap();
  let part = db.part(0).unwrap();
  assert!(part.point_columns.contains_key("DeflectedCoordinates"));
  assert!(!part.point_columns.contains_key("Deflection"));
}

#[test]
fn test_chunk_across_files() {
  let dir = tempfile::tempdir().unwrap();
  Writer::native().ints(&[1, 2, 3]).save(&dir.path().join("words"));
  Writer::native().ints(&[4, 5]).save(&dir.path().join("words01"));
  let mut family = Family::open(dir.path(), "words").unwrap();
  assert_eq!(family.files().len(), 2);
  assert_eq!(family.read_ints(5).unwrap(), vec![1, 2, 3, 4, 5]);
  assert!(family.at_end_of_file());
  family.seek(SectionMark { file: 0, offset: 2 }).unwrap();
  family.buffer_chunk(WordKind::Int, 2).unwrap();
  assert_eq!(family.next_int().unwrap(), 3);
  assert_eq!(family.next_int().unwrap(), 4);
  // offsets past the first file land in the second
  family.seek(SectionMark { file: 0, offset: 4 }).unwrap();
  assert_eq!(family.read_ints(1).unwrap(), vec![5]);
  assert!(family.read_ints(1).is_err());
}

#[test]
fn test_state_sizes_fit() {
  let dir = tempfile::tempdir().unwrap();
  let mut w = write_single_solid(StorageModel::default(), &[0.0, 0.5, 1.0]);
  w.float(EOF_MARKER).save(&dir.path().join("d3plot"));
  let db = open(&dir);
  assert_eq!(db.time_step_count(), 3);
  assert_state_sizes_fit(&db);
  let dir = tempfile::tempdir().unwrap();
  write_two_materials(dir.path(), 10003, Some([1.0, 1.0]), true);
  let db = open(&dir);
  assert_eq!(db.time_step_count(), 1);
  assert_eq!(db.control(0).unwrap().derived.state.deletion_words, 2);
  assert_state_sizes_fit(&db);
}
