//! This module implements the word-addressable view over the files of a
//! d3plot family: a set of size-padded binary files that, read in order, form
//! one logical stream of fixed-width words.
//!
//! Reading is strictly sequential. A caller positions the cursor (by section
//! mark or by skipping), buffers a chunk of words of one kind, and consumes
//! that chunk word by word before buffering the next one.

mod word;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

pub use word::*;

use crate::prelude::*;
use crate::util::family_file_path;

/// The float stored where a time word is expected once a file holds no
/// further states.
pub const EOF_MARKER: f64 = -999999.0;

/// Word index, within the control section, of the code version.
const VERSION_WORD: usize = 14;

/// How many bytes of the root file are looked at when detecting the storage
/// model.
const DETECTION_PREFIX_BYTES: usize = 512;

/// Versions accepted as plausible by the detector (exclusive bounds).
const VERSION_RANGE: (f64, f64) = (900.0, 1000.0);

/// Upper bound on the number of words held by one chunk when large blocks are
/// read piecewise.
pub const MAX_CHUNK_WORDS: usize = 1 << 20;

/// Named sections of the static part of each adaptation level, plus the
/// state section.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
  Hash
)]
pub enum Section {
  /// The fixed 64-word control header.
  Control,
  /// Rigid body shell count and rigid material list.
  MaterialTypeData,
  /// ALE fluid material ids.
  FluidMaterialIdData,
  /// SPH attribute flags.
  SphElementData,
  /// Node coordinates and connectivity blocks.
  GeometryData,
  /// User ids of nodes, elements and materials.
  UserIdData,
  /// Parents of adapted elements.
  AdaptedParentData,
  /// SPH node and material lists.
  SphNodeData,
  /// Rigid road surface nodes and segments.
  RigidSurfaceData,
  /// The word right after the static data.
  EndOfStatic,
  /// The first state record of the level.
  State
}

/// A bookmark: a file index and a word offset within that file.
#[derive(
  Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq,
  PartialOrd, Ord, Hash
)]
pub struct SectionMark {
  /// Index of the file in the family.
  pub file: usize,
  /// Offset in words from the start of that file.
  pub offset: u64
}

/// A file belonging to the family.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FamilyFile {
  /// Where the file lives.
  pub path: PathBuf,
  /// Its length in bytes.
  pub bytes: u64,
  /// The adaptation level it belongs to.
  pub level: usize
}

/// Bookkeeping for one adaptation level.
#[derive(Clone, Debug, Default)]
struct LevelInfo {
  /// Section starts recorded so far.
  marks: BTreeMap<Section, SectionMark>,
  /// Size of one state record in words.
  state_words: u64
}

/// The open file and the index it corresponds to.
type OpenFile = (usize, BufReader<File>);

/// A d3plot family, read as one stream of words.
#[derive(Debug)]
pub struct Family {
  /// Directory holding the files.
  directory: PathBuf,
  /// Base name of the files.
  base_name: String,
  /// Every file, in stream order.
  files: Vec<FamilyFile>,
  /// Discovered word size and endianness.
  storage: StorageModel,
  /// Per-level bookkeeping.
  levels: Vec<LevelInfo>,
  /// Bookmarks of the time words of every state, in order.
  steps: Vec<SectionMark>,
  /// Where the next read happens.
  cursor: SectionMark,
  /// The currently open file, if any.
  open: Option<OpenFile>,
  /// Whether the open file must seek before its next read.
  needs_seek: bool,
  /// The live chunk.
  chunk: Vec<Word>,
  /// How many words of the chunk were consumed.
  consumed: usize
}

impl Family {
  /// Enumerates the files of a family: level by level, file by file, until a
  /// level has no files at all.
  pub fn open(directory: &Path, base_name: &str) -> D3Result<Self> {
    let mut files: Vec<FamilyFile> = Vec::new();
    let mut level = 0;
    loop {
      let mut number = 0;
      loop {
        let path = family_file_path(directory, base_name, level, number);
        let meta = match std::fs::metadata(&path) {
          Ok(m) if m.is_file() => m,
          _ => break
        };
        debug!("Found {} ({} bytes, level {}).", path.display(), meta.len(), level);
        files.push(FamilyFile { path, bytes: meta.len(), level });
        number += 1;
      }
      if number == 0 {
        break;
      }
      level += 1;
    }
    if files.is_empty() {
      return Err(D3plotError::NoFilesFound {
        directory: directory.to_path_buf(),
        base_name: base_name.to_owned()
      });
    }
    info!("Found {} files over {} adaptation levels.", files.len(), level);
    return Ok(Self {
      directory: directory.to_path_buf(),
      base_name: base_name.to_owned(),
      files,
      storage: StorageModel::default(),
      levels: vec![LevelInfo::default(); level],
      steps: Vec::new(),
      cursor: SectionMark::default(),
      open: None,
      needs_seek: true,
      chunk: Vec::new(),
      consumed: 0
    });
  }

  /// Tries every candidate storage model on a prefix of the root file and
  /// adopts the first one under which the version word is plausible.
  pub fn detect_storage_model(&mut self) -> D3Result<StorageModel> {
    let root = &self.files[0].path;
    let mut prefix: Vec<u8> = Vec::with_capacity(DETECTION_PREFIX_BYTES);
    File::open(root)?
      .take(DETECTION_PREFIX_BYTES as u64)
      .read_to_end(&mut prefix)?;
    for model in StorageModel::candidates() {
      let ws = model.word_bytes();
      let at = VERSION_WORD * ws;
      if prefix.len() < at + ws {
        continue;
      }
      if let Word::Float(v) = model.decode(WordKind::Float, &prefix[at..at + ws]) {
        if v > VERSION_RANGE.0 && v < VERSION_RANGE.1 {
          debug!("Detected {:?} (version {}).", model, v);
          self.set_storage_model(model);
          return Ok(model);
        }
      }
    }
    return Err(D3plotError::UnrecognizedFormat(root.clone()));
  }

  /// Adopts a storage model, resetting the cursor.
  pub fn set_storage_model(&mut self, model: StorageModel) {
    self.storage = model;
    self.cursor = SectionMark::default();
    self.needs_seek = true;
    self.chunk.clear();
    self.consumed = 0;
  }

  /// The adopted storage model.
  pub fn storage_model(&self) -> StorageModel {
    return self.storage;
  }

  /// Number of bytes in a word.
  pub fn word_bytes(&self) -> usize {
    return self.storage.word_bytes();
  }

  /// Directory holding the family.
  pub fn directory(&self) -> &Path {
    return &self.directory;
  }

  /// Base name of the family.
  pub fn base_name(&self) -> &str {
    return &self.base_name;
  }

  /// Every file of the family.
  pub fn files(&self) -> &[FamilyFile] {
    return &self.files;
  }

  /// Number of adaptation levels found on disk.
  pub fn level_count(&self) -> usize {
    return self.levels.len();
  }

  /// Adaptation level of a file.
  pub fn file_level(&self, file: usize) -> Option<usize> {
    return self.files.get(file).map(|f| f.level);
  }

  /// Length of a file in whole words.
  pub fn file_words(&self, file: usize) -> u64 {
    return self.files.get(file)
      .map_or(0, |f| f.bytes / self.word_bytes() as u64);
  }

  /// Index of the first file of an adaptation level.
  pub fn first_file_of_level(&self, level: usize) -> Option<usize> {
    return self.files.iter().position(|f| f.level == level);
  }

  /// Total number of words in the files of one adaptation level.
  pub fn level_words(&self, level: usize) -> u64 {
    return (0..self.files.len())
      .filter(|i| self.files[*i].level == level)
      .map(|i| self.file_words(i))
      .sum();
  }

  /// Where the next read happens.
  pub fn position(&self) -> SectionMark {
    return self.cursor;
  }

  /// Adaptation level of the file under the cursor.
  pub fn current_level(&self) -> usize {
    return self.file_level(self.cursor.file).unwrap_or(0);
  }

  /// Records the cursor as the start of a section for a level. Marks are
  /// immutable: recording one twice keeps the first.
  pub fn mark_section_start(&mut self, level: usize, section: Section) {
    if level >= self.levels.len() {
      self.levels.resize(level + 1, LevelInfo::default());
    }
    let here = self.cursor;
    let marks = &mut self.levels[level].marks;
    if let Some(old) = marks.get(&section) {
      debug!(
        "Keeping {:?} mark of level {} at {:?}, not moving it to {:?}.",
        section, level, old, here
      );
      return;
    }
    debug!("Marked {:?} of level {} at {:?}.", section, level, here);
    marks.insert(section, here);
  }

  /// Returns a recorded section mark.
  pub fn section_mark(&self, level: usize, section: Section) -> D3Result<SectionMark> {
    return self.levels.get(level)
      .and_then(|l| l.marks.get(&section))
      .copied()
      .ok_or(D3plotError::UnmarkedSection { level, section });
  }

  /// Sets the size of one state record of a level, in words.
  pub fn set_state_size(&mut self, level: usize, words: u64) {
    if level >= self.levels.len() {
      self.levels.resize(level + 1, LevelInfo::default());
    }
    self.levels[level].state_words = words;
  }

  /// Size of one state record of a level, in words.
  pub fn state_size(&self, level: usize) -> u64 {
    return self.levels.get(level).map_or(0, |l| l.state_words);
  }

  /// Records the bookmark of the time word of a newly found state.
  pub fn mark_time_step(&mut self, mark: SectionMark) {
    self.steps.push(mark);
  }

  /// Forgets every state bookmark, before a rescan.
  pub fn clear_time_steps(&mut self) {
    self.steps.clear();
  }

  /// Number of state records bookmarked so far.
  pub fn time_step_count(&self) -> usize {
    return self.steps.len();
  }

  /// Moves the cursor to `offset` words past a mark. For the state section,
  /// `id` is a timestep index and the mark is that state's time word; for
  /// every other section `id` is the adaptation level.
  pub fn skip_to_word(
    &mut self,
    section: Section,
    id: usize,
    offset: u64
  ) -> D3Result<()> {
    let mark = if section == Section::State {
      *self.steps.get(id).ok_or(D3plotError::InvalidTimeStep {
        index: id,
        count: self.steps.len()
      })?
    } else {
      self.section_mark(id, section)?
    };
    return self.seek(SectionMark { file: mark.file, offset: mark.offset + offset });
  }

  /// Moves the cursor to a position, normalizing offsets that run past the
  /// end of their file into the following files.
  pub fn seek(&mut self, to: SectionMark) -> D3Result<()> {
    let normalized = self.normalize(to)?;
    if normalized != self.cursor {
      self.needs_seek = true;
    }
    self.cursor = normalized;
    return Ok(());
  }

  /// Moves the cursor forward without reading.
  pub fn skip_words(&mut self, count: u64) -> D3Result<()> {
    let to = SectionMark {
      file: self.cursor.file,
      offset: self.cursor.offset + count
    };
    return self.seek(to);
  }

  /// Moves the cursor to the start of the next file, returning false if this
  /// was the last one.
  pub fn advance_file(&mut self) -> bool {
    if self.cursor.file + 1 >= self.files.len() {
      return false;
    }
    self.cursor = SectionMark { file: self.cursor.file + 1, offset: 0 };
    self.needs_seek = true;
    debug!("Advanced to file {}.", self.cursor.file);
    return true;
  }

  /// Whether the cursor sits at (or past) the end of its file.
  pub fn at_end_of_file(&self) -> bool {
    return self.cursor.offset >= self.file_words(self.cursor.file);
  }

  /// Words between the cursor and the end of its adaptation level.
  pub fn words_left_in_level(&self) -> u64 {
    let level = self.current_level();
    let here = self.file_words(self.cursor.file)
      .saturating_sub(self.cursor.offset);
    let after: u64 = (self.cursor.file + 1..self.files.len())
      .take_while(|i| self.files[*i].level == level)
      .map(|i| self.file_words(i))
      .sum();
    return here + after;
  }

  /// Pushes a position that overflows its file into the following ones.
  fn normalize(&self, mut to: SectionMark) -> D3Result<SectionMark> {
    let start = to;
    while to.file + 1 < self.files.len() && to.offset >= self.file_words(to.file) {
      to.offset -= self.file_words(to.file);
      to.file += 1;
    }
    if to.file >= self.files.len() || to.offset > self.file_words(to.file) {
      return Err(D3plotError::TruncatedRead {
        file: start.file,
        offset: start.offset,
        wanted: 0
      });
    }
    return Ok(to);
  }

  /// Returns a reader for the file under the cursor, positioned at the cursor.
  fn reader(&mut self) -> D3Result<&mut BufReader<File>> {
    let file = self.cursor.file;
    let is_open = matches!(self.open, Some((f, _)) if f == file);
    if !is_open {
      let handle = File::open(&self.files[file].path)?;
      debug!("Opened {}.", self.files[file].path.display());
      self.open = Some((file, BufReader::new(handle)));
      self.needs_seek = true;
    }
    let byte_offset = self.cursor.offset * self.word_bytes() as u64;
    let needs_seek = std::mem::replace(&mut self.needs_seek, false);
    return match self.open.as_mut() {
      Some((_, reader)) => {
        if needs_seek {
          reader.seek(SeekFrom::Start(byte_offset))?;
        }
        Ok(reader)
      },
      None => Err(D3plotError::TruncatedRead {
        file,
        offset: self.cursor.offset,
        wanted: 0
      })
    };
  }

  /// Reads `count` words of one kind into the chunk, replacing whatever was
  /// there. Reads continue into the following files as needed.
  pub fn buffer_chunk(&mut self, kind: WordKind, count: usize) -> D3Result<()> {
    self.chunk.clear();
    self.consumed = 0;
    let ws = self.word_bytes();
    let start = self.cursor;
    let mut remaining = count as u64;
    let mut raw: Vec<u8> = Vec::new();
    while remaining > 0 {
      if self.at_end_of_file() && !self.advance_file() {
        return Err(D3plotError::TruncatedRead {
          file: start.file,
          offset: start.offset,
          wanted: count as u64
        });
      }
      let left = self.file_words(self.cursor.file) - self.cursor.offset;
      if left == 0 {
        continue;
      }
      let take = left.min(remaining);
      raw.resize(take as usize * ws, 0);
      self.reader()?.read_exact(&mut raw)?;
      let model = self.storage;
      self.chunk.extend(raw.chunks_exact(ws).map(|b| model.decode(kind, b)));
      self.cursor.offset += take;
      remaining -= take;
    }
    return Ok(());
  }

  /// Number of words of the live chunk that were not consumed yet.
  pub fn words_buffered(&self) -> usize {
    return self.chunk.len() - self.consumed;
  }

  /// Consumes one word of the live chunk.
  fn next_word(&mut self, kind: WordKind) -> D3Result<Word> {
    let word = *self.chunk.get(self.consumed)
      .ok_or(D3plotError::BufferExhausted { buffered: self.chunk.len() })?;
    if word.kind() != kind {
      return Err(D3plotError::WordKindMismatch { wanted: kind, found: word.kind() });
    }
    self.consumed += 1;
    return Ok(word);
  }

  /// Consumes one integer word.
  pub fn next_int(&mut self) -> D3Result<i64> {
    return match self.next_word(WordKind::Int)? {
      Word::Int(i) => Ok(i),
      other => Err(D3plotError::WordKindMismatch {
        wanted: WordKind::Int,
        found: other.kind()
      })
    };
  }

  /// Consumes one float word.
  pub fn next_float(&mut self) -> D3Result<f64> {
    return match self.next_word(WordKind::Float)? {
      Word::Float(x) => Ok(x),
      other => Err(D3plotError::WordKindMismatch {
        wanted: WordKind::Float,
        found: other.kind()
      })
    };
  }

  /// Consumes one character word, returning its meaningful bytes.
  pub fn next_chars(&mut self) -> D3Result<Vec<u8>> {
    let ws = self.word_bytes();
    return match self.next_word(WordKind::Char)? {
      Word::Chars(c) => Ok(c[..ws].to_vec()),
      other => Err(D3plotError::WordKindMismatch {
        wanted: WordKind::Char,
        found: other.kind()
      })
    };
  }

  /// Consumes `words` character words and joins them into a trimmed string.
  pub fn next_string(&mut self, words: usize) -> D3Result<String> {
    let mut bytes: Vec<u8> = Vec::with_capacity(words * self.word_bytes());
    for _ in 0..words {
      bytes.extend(self.next_chars()?);
    }
    return Ok(crate::util::trim_padded(&bytes));
  }

  /// Buffers and consumes `count` integers, a bounded chunk at a time.
  pub fn read_ints(&mut self, count: usize) -> D3Result<Vec<i64>> {
    let mut out: Vec<i64> = Vec::with_capacity(count);
    for size in chunk_sizes(count, 1) {
      self.buffer_chunk(WordKind::Int, size)?;
      for _ in 0..size {
        out.push(self.next_int()?);
      }
    }
    return Ok(out);
  }

  /// Buffers and consumes `count` floats, a bounded chunk at a time.
  pub fn read_floats(&mut self, count: usize) -> D3Result<Vec<f64>> {
    let mut out: Vec<f64> = Vec::with_capacity(count);
    for size in chunk_sizes(count, 1) {
      self.buffer_chunk(WordKind::Float, size)?;
      for _ in 0..size {
        out.push(self.next_float()?);
      }
    }
    return Ok(out);
  }
}

/// Splits `items` records of `words_per_item` words into chunk sizes (in
/// words) that hold whole records and stay under the chunk bound.
pub fn chunk_sizes(items: usize, words_per_item: usize) -> Vec<usize> {
  if items == 0 || words_per_item == 0 {
    return Vec::new();
  }
  let per_chunk = (MAX_CHUNK_WORDS / words_per_item).max(1);
  let mut sizes: Vec<usize> = Vec::new();
  let mut left = items;
  while left > 0 {
    let n = left.min(per_chunk);
    sizes.push(n * words_per_item);
    left -= n;
  }
  return sizes;
}
