//! Dumps information on a d3plot database, such as its arrays, parts, etc.

#![allow(clippy::needless_return)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::io;
use std::path::PathBuf;

use clap::Parser;
use d3plot::prelude::*;
use log::{LevelFilter, info, error};

/// The arguments passed to the dumper.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
  /// Print the summary as JSON to standard output instead of logging it.
  #[arg(short, long)]
  json: bool,
  /// Output extra/debug info while reading.
  #[arg(short, long)]
  verbose: bool,
  /// Any file of the family, or an input deck next to it.
  path: PathBuf
}

/// Indentation for nested listings.
const INDENT: &str = "  ";

fn main() -> io::Result<()> {
  // init cli stuff
  let args = Cli::parse();
  let log_level = if args.verbose {
    LevelFilter::Debug
  } else {
    LevelFilter::Info
  };
  env_logger::builder().filter_level(log_level).init();
  // open the database
  let db = match D3plotDatabase::open(&args.path, OpenOptions::default()) {
    Ok(db) => db,
    Err(e) => {
      error!("Could not open {}: {}", args.path.display(), e);
      std::process::exit(1);
    }
  };
  let summary = db.summary();
  if args.json {
    serde_json::to_writer_pretty(io::stdout(), &summary)?;
    println!();
    return Ok(());
  }
  // print header info
  info!("Title: \"{}\".", summary.title);
  info!("Written by release {} (version {}).", summary.release, summary.version);
  info!(
    "{} files over {} adaptation levels, {}-byte words{}.",
    summary.files,
    summary.levels,
    summary.word_bytes,
    if summary.swapped { ", byte-swapped" } else { "" }
  );
  info!(
    "{} nodes in {} dimensions, {} materials.",
    summary.nodes, summary.dimension, summary.materials
  );
  for (ct, n) in summary.cells.iter().filter(|(_, n)| **n > 0) {
    info!("{}- {}: {} cells", INDENT, ct, n);
  }
  // print timesteps
  match summary.time_range {
    Some((lo, hi)) => info!("{} timesteps, from t={} to t={}.", summary.timesteps, lo, hi),
    None => info!("No timesteps found.")
  }
  if summary.truncated_tail {
    info!("The last state was cut short and ignored.");
  }
  // print arrays
  if summary.point_arrays.is_empty() {
    info!("No node arrays.");
  } else {
    info!("Node arrays:");
    for b in summary.point_arrays.iter() {
      info!("{}- {} ({} components)", INDENT, b.name, b.components);
    }
  }
  for (ct, bindings) in summary.cell_arrays.iter().filter(|(_, b)| !b.is_empty()) {
    info!("{} arrays:", ct);
    for b in bindings.iter() {
      info!("{}- {} ({} components, word {})", INDENT, b.name, b.components, b.offset);
    }
  }
  // print parts
  if summary.parts.is_empty() {
    info!("No parts.");
  } else {
    info!("Parts:");
    for p in summary.parts.iter() {
      info!(
        "{}- {}: \"{}\" ({}, material {}): {} cells, {} points",
        INDENT, p.id, p.name, p.cell_type, p.user_material, p.cells, p.points
      );
    }
  }
  return Ok(());
}
