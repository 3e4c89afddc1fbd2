//! This module implements the decoding of single on-disk words into typed
//! values, according to the storage model of a database.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// How a word is to be interpreted when it is buffered.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord
)]
pub enum WordKind {
  /// Raw characters.
  Char,
  /// A signed integer.
  Int,
  /// An IEEE float.
  Float
}

/// A decoded word. Four-byte values are widened.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Word {
  /// An integer word.
  Int(i64),
  /// A floating-point word.
  Float(f64),
  /// A character word; only the first `word_size` bytes are meaningful.
  Chars([u8; 8])
}

impl Word {
  /// Returns the kind this word was decoded as.
  pub const fn kind(&self) -> WordKind {
    return match self {
      Self::Int(_) => WordKind::Int,
      Self::Float(_) => WordKind::Float,
      Self::Chars(_) => WordKind::Char
    };
  }
}

/// The width of a word on disk.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord
)]
pub enum WordSize {
  /// Single precision.
  Four,
  /// Double precision.
  Eight
}

impl WordSize {
  /// Number of bytes in a word.
  pub const fn bytes(&self) -> usize {
    return match self {
      Self::Four => 4,
      Self::Eight => 8
    };
  }
}

/// The byte order of words on disk.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord
)]
pub enum Endian {
  /// Least significant byte first.
  Little,
  /// Most significant byte first.
  Big
}

impl Endian {
  /// The byte order of the machine we're running on.
  pub const fn native() -> Self {
    if cfg!(target_endian = "big") {
      return Self::Big;
    }
    return Self::Little;
  }

  /// The byte order opposite to ours.
  pub const fn swapped() -> Self {
    return match Self::native() {
      Self::Little => Self::Big,
      Self::Big => Self::Little
    };
  }
}

/// Word size and byte order of a database, discovered once when opening it.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord
)]
pub struct StorageModel {
  /// Width of every word.
  pub word_size: WordSize,
  /// Byte order of every word.
  pub endian: Endian
}

impl Default for StorageModel {
  fn default() -> Self {
    return Self { word_size: WordSize::Four, endian: Endian::native() };
  }
}

impl StorageModel {
  /// Candidate models in the order they are tried during detection.
  pub const fn candidates() -> [Self; 4] {
    return [
      Self { word_size: WordSize::Four, endian: Endian::native() },
      Self { word_size: WordSize::Eight, endian: Endian::native() },
      Self { word_size: WordSize::Four, endian: Endian::swapped() },
      Self { word_size: WordSize::Eight, endian: Endian::swapped() },
    ];
  }

  /// Number of bytes in a word.
  pub const fn word_bytes(&self) -> usize {
    return self.word_size.bytes();
  }

  /// Whether words must be byte-swapped on this machine.
  pub fn is_swapped(&self) -> bool {
    return self.endian != Endian::native();
  }

  /// Decodes exactly one word worth of bytes.
  pub fn decode(&self, kind: WordKind, bytes: &[u8]) -> Word {
    return match self.endian {
      Endian::Little => decode_with::<LittleEndian>(self.word_size, kind, bytes),
      Endian::Big => decode_with::<BigEndian>(self.word_size, kind, bytes)
    };
  }
}

/// Decodes a word with a given byte order.
fn decode_with<B: ByteOrder>(size: WordSize, kind: WordKind, b: &[u8]) -> Word {
  return match (kind, size) {
    (WordKind::Int, WordSize::Four) => Word::Int(B::read_i32(b) as i64),
    (WordKind::Int, WordSize::Eight) => Word::Int(B::read_i64(b)),
    (WordKind::Float, WordSize::Four) => Word::Float(B::read_f32(b) as f64),
    (WordKind::Float, WordSize::Eight) => Word::Float(B::read_f64(b)),
    (WordKind::Char, _) => {
      let mut chars = [b' '; 8];
      let n = size.bytes().min(b.len());
      chars[..n].copy_from_slice(&b[..n]);
      Word::Chars(chars)
    }
  };
}
