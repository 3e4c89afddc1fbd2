//! This module implements the timestep index: a single forward scan over the
//! state records of every adaptation level that bookmarks each state's time
//! word.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::control::ControlDictionary;
use crate::family::{Family, Section, SectionMark, WordKind, EOF_MARKER};
use crate::prelude::*;

/// One state record found during the scan.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimeStepRecord {
  /// Position in the index.
  pub index: usize,
  /// Simulation time of the state.
  pub time: f64,
  /// Bookmark of the state's time word.
  pub mark: SectionMark,
  /// Adaptation level the state belongs to.
  pub level: usize
}

/// Every state record of a database, in order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeStepIndex {
  /// The records, densely indexed.
  records: Vec<TimeStepRecord>,
  /// Whether the scan stopped at a state that does not fit in its files.
  truncated_tail: bool
}

impl TimeStepIndex {
  /// Scans the states of every level. `dictionaries` must hold the level 0
  /// dictionary; dictionaries of later levels are parsed (or, failing that,
  /// borrowed from the previous level) and appended as levels are reached.
  pub fn scan(
    family: &mut Family,
    dictionaries: &mut Vec<ControlDictionary>
  ) -> D3Result<Self> {
    let mut index = Self::default();
    family.clear_time_steps();
    let mut level = 0;
    family.seek(family.section_mark(level, Section::State)?)?;
    loop {
      if family.at_end_of_file() && !family.advance_file() {
        break;
      }
      let file_level = family.current_level();
      if file_level != level {
        level = file_level;
        enter_level(family, dictionaries, level)?;
        continue;
      }
      let here = family.position();
      let left = family.words_left_in_level();
      family.buffer_chunk(WordKind::Float, 1)?;
      let time = family.next_float()?;
      if time == EOF_MARKER {
        debug!("End of states in file {}.", here.file);
        if !family.advance_file() {
          break;
        }
        continue;
      }
      let words = family.state_size(level);
      if words > left {
        warn!(
          "State at t={} needs {} words but level {} only has {} left, ignoring it.",
          time, words, level, left
        );
        index.truncated_tail = true;
        break;
      }
      family.mark_time_step(here);
      index.records.push(TimeStepRecord {
        index: index.records.len(),
        time,
        mark: here,
        level
      });
      family.skip_words(words - 1)?;
    }
    info!("Found {} states.", index.records.len());
    return Ok(index);
  }

  /// The records, in order.
  pub fn records(&self) -> &[TimeStepRecord] {
    return &self.records;
  }

  /// Number of states.
  pub fn len(&self) -> usize {
    return self.records.len();
  }

  /// Whether no state was found.
  pub fn is_empty(&self) -> bool {
    return self.records.is_empty();
  }

  /// A single record, by index.
  pub fn get(&self, index: usize) -> D3Result<&TimeStepRecord> {
    return self.records.get(index).ok_or(D3plotError::InvalidTimeStep {
      index,
      count: self.records.len()
    });
  }

  /// Times of every state.
  pub fn times(&self) -> Vec<f64> {
    return self.records.iter().map(|r| r.time).collect();
  }

  /// Smallest and largest time, if there are states.
  pub fn time_range(&self) -> Option<(f64, f64)> {
    let mut times = self.records.iter().map(|r| r.time);
    let first = times.next()?;
    return Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))));
  }

  /// Whether the last state was cut short and ignored.
  pub fn truncated_tail(&self) -> bool {
    return self.truncated_tail;
  }
}

/// Parses the static section of a newly reached level and moves to its first
/// state. When that fails, the previous dictionary is reused and its static
/// size assumed.
fn enter_level(
  family: &mut Family,
  dictionaries: &mut Vec<ControlDictionary>,
  level: usize
) -> D3Result<()> {
  debug!("Entering adaptation level {}.", level);
  let dict = match ControlDictionary::parse(family, level) {
    Ok(d) => d,
    Err(e) => {
      let mut fallback = dictionaries.last()
        .cloned()
        .ok_or(D3plotError::CorruptHeader("no dictionary to fall back on".to_owned()))?;
      warn!(
        "Could not read the header of adaptation level {} ({}), reusing level {}.",
        level, e, fallback.level
      );
      fallback.level = level;
      let first = family.first_file_of_level(level).unwrap_or(0);
      family.seek(SectionMark { file: first, offset: 0 })?;
      family.skip_words(fallback.derived.pre_state_words)?;
      family.mark_section_start(level, Section::State);
      family.set_state_size(level, fallback.state_words());
      fallback
    }
  };
  family.seek(family.section_mark(level, Section::State)?)?;
  while dictionaries.len() < level {
    // levels are entered in order, but keep indices aligned regardless
    match dictionaries.last().cloned() {
      Some(d) => dictionaries.push(d),
      None => break
    }
  }
  if dictionaries.len() == level {
    dictionaries.push(dict);
  } else {
    dictionaries[level] = dict;
  }
  return Ok(());
}
