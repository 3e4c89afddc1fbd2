//! This module implements the error type shared by everything that reads a
//! d3plot family.

use std::error::Error;
use std::fmt::Display;
use std::io;
use std::path::PathBuf;

use crate::family::{Section, WordKind};

/// Everything that can go wrong while opening or reading a database.
#[derive(Debug)]
pub enum D3plotError {
  /// No file in the directory matches the family naming convention.
  NoFilesFound {
    /// The directory that was scanned.
    directory: PathBuf,
    /// The base name that was looked for.
    base_name: String
  },
  /// No combination of word size and endianness yields a sane version.
  UnrecognizedFormat(PathBuf),
  /// The dimensionality code in the control section is not supported.
  UnsupportedGeometry(i64),
  /// A header field holds a value that breaks a known invariant.
  CorruptHeader(String),
  /// The offset model asks for words beyond what the files hold.
  TruncatedRead {
    /// Index of the file the read started in.
    file: usize,
    /// Word offset in that file.
    offset: u64,
    /// Number of words that were asked for.
    wanted: u64
  },
  /// A timestep index outside of the scanned range was requested.
  InvalidTimeStep {
    /// The requested index.
    index: usize,
    /// How many steps the database holds.
    count: usize
  },
  /// A section was resolved before its start was ever recorded.
  UnmarkedSection {
    /// The adaptation level.
    level: usize,
    /// The section.
    section: Section
  },
  /// More words were consumed than were buffered.
  BufferExhausted {
    /// How many words the live chunk holds.
    buffered: usize
  },
  /// A buffered word was consumed as a different kind than it was read as.
  WordKindMismatch {
    /// What the caller asked for.
    wanted: WordKind,
    /// What the chunk holds.
    found: WordKind
  },
  /// No part with this index exists.
  NoSuchPart(usize),
  /// No array with this name exists in the requested scope.
  NoSuchArray(String),
  /// An I/O error from the operating system.
  Io(io::Error)
}

impl Display for D3plotError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match self {
      Self::NoFilesFound { directory, base_name } => write!(
        f,
        "no files named \"{}\" found in {}",
        base_name,
        directory.display()
      ),
      Self::UnrecognizedFormat(path) => write!(
        f,
        "could not detect word size and endianness of {}",
        path.display()
      ),
      Self::UnsupportedGeometry(ndim) => write!(
        f,
        "unsupported dimensionality code {}",
        ndim
      ),
      Self::CorruptHeader(why) => write!(f, "corrupt header: {}", why),
      Self::TruncatedRead { file, offset, wanted } => write!(
        f,
        "truncated read: {} words wanted at word {} of file {}",
        wanted,
        offset,
        file
      ),
      Self::InvalidTimeStep { index, count } => write!(
        f,
        "timestep {} requested, but there are only {}",
        index,
        count
      ),
      Self::UnmarkedSection { level, section } => write!(
        f,
        "section {:?} was never marked for adaptation level {}",
        section,
        level
      ),
      Self::BufferExhausted { buffered } => write!(
        f,
        "read past the end of a {}-word chunk",
        buffered
      ),
      Self::WordKindMismatch { wanted, found } => write!(
        f,
        "wanted a {:?} word, but the chunk holds {:?} words",
        wanted,
        found
      ),
      Self::NoSuchPart(index) => write!(f, "no part with index {}", index),
      Self::NoSuchArray(name) => write!(f, "no array named \"{}\"", name),
      Self::Io(e) => write!(f, "I/O error: {}", e)
    };
  }
}

impl Error for D3plotError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    return match self {
      Self::Io(e) => Some(e),
      _ => None
    };
  }
}

impl From<io::Error> for D3plotError {
  fn from(value: io::Error) -> Self {
    return Self::Io(value);
  }
}

/// Result alias used throughout the crate.
pub type D3Result<T> = Result<T, D3plotError>;
