//! A command-line application to convert one timestep of a d3plot database
//! to CSV.

#![allow(clippy::needless_return)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use convert_case::{Case, Casing};
use d3plot::prelude::*;
use itertools::Itertools;
use log::*;

/// What each CSV record describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
enum Rows {
  /// One record per point of every part.
  Points,
  /// One record per cell of every part.
  Cells
}

/// The arguments passed to the converter.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about)]
struct Cli {
  /// Timestep to convert. Negative values count from the end.
  #[arg(short = 's', long = "step", default_value_t = -1, allow_negative_numbers = true)]
  step: i64,
  /// Only output these parts. Can be specified more than once, or
  /// comma-separated. If absent, all parts are written.
  #[arg(short = 'p', long = "parts", num_args = 0.., value_delimiter = ',')]
  parts: Vec<usize>,
  /// Only output parts of these cell types. Can be specified more than once,
  /// or comma-separated. If absent, no cell type filter is applied.
  #[arg(short = 't', long = "types", num_args = 0.., value_delimiter = ',')]
  types: Vec<CellType>,
  /// Write records per point or per cell.
  #[arg(short = 'r', long = "rows", value_enum, default_value_t = Rows::Points)]
  rows: Rows,
  /// Leave out cells the solver deleted (and the points only they use).
  #[arg(short = 'D', long = "drop-deleted")]
  drop_deleted: bool,
  /// The delimiter used in the CSV.
  #[arg(short = 'd', long = "delim", default_value = ",")]
  delim: char,
  /// Enable writing CSV headers. They're written every time the columns
  /// change.
  #[arg(short = 'H', long = "headers")]
  headers: bool,
  /// Output extra/debug info while reading and converting.
  #[arg(short = 'v', long = "verbose")]
  verbose: bool,
  /// Path to write output to. If absent, writes to standard output.
  #[arg(short = 'o')]
  output: Option<PathBuf>,
  /// Any file of the family, or an input deck next to it.
  input: PathBuf
}

/// Component suffixes for common tuple widths.
fn component_names(components: usize) -> Vec<String> {
  return match components {
    1 => vec![String::new()],
    3 => ["x", "y", "z"].iter().map(|s| format!("_{}", s)).collect(),
    6 => ["xx", "yy", "zz", "xy", "yz", "zx"].iter().map(|s| format!("_{}", s)).collect(),
    n => (0..n).map(|i| format!("_{}", i)).collect()
  };
}

/// Column headers for a set of named columns.
fn column_headers<'a>(columns: impl Iterator<Item = (&'a String, &'a Column)>) -> Vec<String> {
  return columns
    .flat_map(|(name, col)| {
      let base = name.to_case(Case::Snake);
      component_names(col.components).into_iter().map(move |s| format!("{}{}", base, s))
    })
    .collect();
}

fn main() -> io::Result<()> {
  // init cli stuff
  let args = Cli::parse();
  let log_level = if args.verbose {
    LevelFilter::Debug
  } else {
    LevelFilter::Info
  };
  env_logger::builder().filter_level(log_level).init();
  // open the database and load the step
  let options = OpenOptions {
    deleted_cells: if args.drop_deleted { DeletedCells::Remove } else { DeletedCells::Flag },
    ..Default::default()
  };
  let mut db = match D3plotDatabase::open(&args.input, options) {
    Ok(db) => db,
    Err(e) => {
      error!("Could not open {}: {}", args.input.display(), e);
      std::process::exit(1);
    }
  };
  let count = db.time_step_count() as i64;
  let step = if args.step < 0 { count + args.step } else { args.step };
  if step < 0 || step >= count {
    error!("Timestep {} requested, but there are {}.", args.step, count);
    std::process::exit(1);
  }
  if let Err(e) = db.load_timestep(step as usize) {
    error!("Could not load timestep {}: {}", step, e);
    std::process::exit(1);
  }
  info!("Loaded timestep {} (t={}).", step, db.time_values()[step as usize]);
  // init the csv writer
  let output: BufWriter<Box<dyn Write>> = BufWriter::new(
    if let Some(ref op) = args.output {
      Box::new(File::create(op)?)
    } else {
      Box::new(io::stdout())
    }
  );
  let delim_byte: u8 = match args.delim.try_into() {
    Ok(b) => b,
    Err(_) => {
      error!("Delimiter must be a single-byte character!");
      std::process::exit(1);
    }
  };
  let mut wtr = csv::WriterBuilder::new()
    .delimiter(delim_byte)
    .flexible(true)
    .from_writer(output);
  // write parts
  info!("Writing CSV records...");
  let mut last_header: Option<Vec<String>> = None;
  let selected = db.list_parts()
    .into_iter()
    .filter(|p| args.parts.is_empty() || args.parts.contains(&p.id))
    .filter(|p| args.types.is_empty() || args.types.contains(&p.cell_type))
    .collect::<Vec<PartInfo>>();
  for listed in selected.iter() {
    let part = match db.compacted_part(listed.id) {
      Ok(p) => p,
      Err(e) => {
        warn!("Skipping part {}: {}", listed.id, e);
        continue;
      }
    };
    let ((id_name, header), rows) = match args.rows {
      Rows::Points => {
        let mut cols: Vec<(&String, &Column)> = Vec::new();
        let coord_name = "Coordinates".to_owned();
        cols.push((&coord_name, &part.coordinates));
        cols.extend(part.point_columns.iter());
        let header = column_headers(cols.iter().copied());
        let rows = (0..part.point_globals.len())
          .map(|i| {
            let values = cols.iter().flat_map(|(_, c)| c.tuple(i).iter().map(|v| v.to_string()));
            [part.point_globals[i].to_string()].into_iter().chain(values).collect::<Vec<String>>()
          })
          .collect::<Vec<Vec<String>>>();
        (("point", header), rows)
      },
      Rows::Cells => {
        let header = column_headers(part.cell_columns.iter());
        let rows = (0..part.topology.cell_count())
          .map(|c| {
            let values = part.cell_columns.values()
              .flat_map(|col| col.tuple(c).iter().map(|v| v.to_string()));
            let points = part.topology.cell(c).iter()
              .map(|p| part.point_globals[*p] + 1)
              .join(" ");
            [part.topology.block_ids[c].to_string(), points]
              .into_iter()
              .chain(values)
              .collect::<Vec<String>>()
          })
          .collect::<Vec<Vec<String>>>();
        (("cell", header), rows)
      }
    };
    if args.headers {
      let mut full = vec!["part".to_owned(), "name".to_owned(), id_name.to_owned()];
      if args.rows == Rows::Cells {
        full.push("points".to_owned());
      }
      full.extend(header);
      if last_header.as_ref() != Some(&full) {
        wtr.write_record(&full)?;
        last_header = Some(full);
      }
    }
    debug!("Part {}: {} records.", listed.id, rows.len());
    for row in rows {
      wtr.write_record([listed.id.to_string(), listed.name.clone()].iter().cloned().chain(row))?;
    }
  }
  wtr.flush()?;
  info!("All done.");
  // done
  return Ok(());
}
