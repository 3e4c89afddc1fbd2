//! This module implements the point-usage sets of parts: which global points
//! a part uses, and the local number each of them gets.
//!
//! Local numbers always follow increasing global ids, so both
//! representations produce the same renumbering for the same points.

use std::fmt::Debug;

/// Dense sets are chosen when `unique * word_bytes / span` reaches this. A
/// dense set costs one bit per id in its span plus a rank word every 64 ids
/// (1.5 bits per id), a sparse one costs a word per used id.
pub const DENSE_THRESHOLD: f64 = 0.1875;

/// Bits per block of a dense set.
const BLOCK: usize = 64;

/// The points a part uses, and their local numbering.
pub trait PointSet: Debug + Send + Sync {
  /// Whether a global point is used.
  fn contains(&self, global: usize) -> bool;
  /// The local number of a global point, if used.
  fn local(&self, global: usize) -> Option<usize>;
  /// Number of used points.
  fn len(&self) -> usize;
  /// Smallest and largest used global id.
  fn bounds(&self) -> Option<(usize, usize)>;
  /// Used global ids, in local order.
  fn globals(&self) -> Vec<usize>;
  /// Short name of the representation.
  fn representation(&self) -> &'static str;

  /// Whether no point is used.
  fn is_empty(&self) -> bool {
    return self.len() == 0;
  }
}

/// A bit per id over `[min, max]`, with per-block ranks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenseRange {
  /// First id of the range.
  min: usize,
  /// Last id of the range.
  max: usize,
  /// Usage bits, relative to `min`.
  bits: Vec<u64>,
  /// Number of used ids before each block.
  ranks: Vec<usize>,
  /// Number of used ids.
  count: usize
}

impl DenseRange {
  /// Builds from usage bits over the whole global range.
  fn from_marks(marks: &[u64], min: usize, max: usize) -> Self {
    let span = max - min + 1;
    let mut bits = vec![0u64; span.div_ceil(BLOCK)];
    for g in min..=max {
      if marks[g / BLOCK] >> (g % BLOCK) & 1 == 1 {
        let r = g - min;
        bits[r / BLOCK] |= 1 << (r % BLOCK);
      }
    }
    let mut ranks = Vec::with_capacity(bits.len());
    let mut count = 0;
    for b in bits.iter() {
      ranks.push(count);
      count += b.count_ones() as usize;
    }
    return Self { min, max, bits, ranks, count };
  }
}

impl PointSet for DenseRange {
  fn contains(&self, global: usize) -> bool {
    if global < self.min || global > self.max {
      return false;
    }
    let r = global - self.min;
    return self.bits[r / BLOCK] >> (r % BLOCK) & 1 == 1;
  }

  fn local(&self, global: usize) -> Option<usize> {
    if !self.contains(global) {
      return None;
    }
    let r = global - self.min;
    let below = self.bits[r / BLOCK] & ((1u64 << (r % BLOCK)) - 1);
    return Some(self.ranks[r / BLOCK] + below.count_ones() as usize);
  }

  fn len(&self) -> usize {
    return self.count;
  }

  fn bounds(&self) -> Option<(usize, usize)> {
    return Some((self.min, self.max));
  }

  fn globals(&self) -> Vec<usize> {
    return (self.min..=self.max).filter(|g| self.contains(*g)).collect();
  }

  fn representation(&self) -> &'static str {
    return "dense";
  }
}

/// A sorted list of used ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseSet {
  /// Used ids, sorted.
  ids: Vec<usize>
}

impl PointSet for SparseSet {
  fn contains(&self, global: usize) -> bool {
    return self.ids.binary_search(&global).is_ok();
  }

  fn local(&self, global: usize) -> Option<usize> {
    return self.ids.binary_search(&global).ok();
  }

  fn len(&self) -> usize {
    return self.ids.len();
  }

  fn bounds(&self) -> Option<(usize, usize)> {
    return Some((*self.ids.first()?, *self.ids.last()?));
  }

  fn globals(&self) -> Vec<usize> {
    return self.ids.clone();
  }

  fn representation(&self) -> &'static str {
    return "sparse";
  }
}

/// The result of building the unique points of a part.
#[derive(Debug)]
pub struct UniquePoints {
  /// Which points are used.
  pub set: Box<dyn PointSet>,
  /// Local connectivity, entry for entry.
  pub local: Vec<usize>
}

impl UniquePoints {
  /// Marks every global id referenced by `global_conn` in a bit-vector sized
  /// to the pool, picks a representation by density, and renumbers the
  /// connectivity. Ids beyond the pool are clamped out with the pool size.
  pub fn build(global_conn: &[usize], pool_size: usize, word_bytes: usize) -> Self {
    let mut marks = vec![0u64; pool_size.div_ceil(BLOCK).max(1)];
    let mut unique = 0;
    let mut bounds: Option<(usize, usize)> = None;
    for g in global_conn.iter().copied().filter(|g| *g < pool_size) {
      let (word, bit) = (g / BLOCK, g % BLOCK);
      if marks[word] >> bit & 1 == 0 {
        marks[word] |= 1 << bit;
        unique += 1;
        bounds = Some(bounds.map_or((g, g), |(lo, hi)| (lo.min(g), hi.max(g))));
      }
    }
    let set: Box<dyn PointSet> = match bounds {
      None => Box::new(SparseSet { ids: Vec::new() }),
      Some((min, max)) if prefers_dense(unique, word_bytes, min, max) => {
        Box::new(DenseRange::from_marks(&marks, min, max))
      },
      Some((min, max)) => {
        let ids = (min..=max)
          .filter(|g| marks[g / BLOCK] >> (g % BLOCK) & 1 == 1)
          .collect();
        Box::new(SparseSet { ids })
      }
    };
    let local = global_conn.iter()
      .map(|g| set.local(*g).unwrap_or(0))
      .collect();
    return Self { set, local };
  }
}

/// Whether a dense set is the cheaper representation.
pub fn prefers_dense(unique: usize, word_bytes: usize, min: usize, max: usize) -> bool {
  let span = (max - min).max(1) as f64;
  return (unique * word_bytes) as f64 / span >= DENSE_THRESHOLD;
}
