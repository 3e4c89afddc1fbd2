//! This module implements utility functions without much need for defining
//! context or not enough of it to warrant them having their own modules.

use std::path::{Path, PathBuf};

/// Returns the two-or-more-letter suffix for an adaptation level. Level 0 has
/// none, level 1 is "aa", level 2 is "ab", and so on in base 26.
pub fn adaptation_suffix(level: usize) -> String {
  if level == 0 {
    return String::new();
  }
  let mut a = level - 1;
  let mut letters: Vec<char> = Vec::new();
  while a > 0 {
    letters.push((b'a' + (a % 26) as u8) as char);
    a /= 26;
  }
  while letters.len() < 2 {
    letters.push('a');
  }
  return letters.into_iter().rev().collect();
}

/// Returns the file name for the `number`-th file of an adaptation level.
pub fn family_file_name(base_name: &str, level: usize, number: usize) -> String {
  let mut name = format!("{}{}", base_name, adaptation_suffix(level));
  if number > 0 {
    name.push_str(&format!("{:02}", number));
  }
  return name;
}

/// Returns the full path for the `number`-th file of an adaptation level.
pub fn family_file_path(
  directory: &Path,
  base_name: &str,
  level: usize,
  number: usize
) -> PathBuf {
  return directory.join(family_file_name(base_name, level, number));
}

/// Turns space- or NUL-padded bytes into a string without the padding.
pub(crate) fn trim_padded(bytes: &[u8]) -> String {
  let end = bytes.iter()
    .rposition(|b| *b != b' ' && *b != 0)
    .map_or(0, |p| p + 1);
  return String::from_utf8_lossy(&bytes[..end]).into_owned();
}

/// Splits a path given by a user into the family's directory and base name.
/// Input decks (".k", ".key", ".lsdyna") point at a "d3plot" family next to
/// them, and sequence numbers or adaptation suffixes are stripped.
pub fn split_family_path(path: &Path) -> (PathBuf, String) {
  let directory = path.parent()
    .map(|p| p.to_path_buf())
    .unwrap_or_default();
  let file_name = path.file_name()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  let is_deck = path.extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| matches!(e, "k" | "key" | "lsdyna"));
  if is_deck || file_name.is_empty() {
    return (directory, "d3plot".to_owned());
  }
  // suffixes are only stripped when the shorter family file is actually there
  let mut base = file_name.as_str();
  let unnumbered = base.trim_end_matches(|c: char| c.is_ascii_digit());
  if unnumbered.len() < base.len()
    && !unnumbered.is_empty()
    && directory.join(unnumbered).is_file() {
    base = unnumbered;
  }
  if base.len() > 2 && base.is_char_boundary(base.len() - 2) {
    let (head, tail) = base.split_at(base.len() - 2);
    let lettered = tail.chars().all(|c| c.is_ascii_lowercase());
    if lettered && directory.join(head).is_file() {
      return (directory, head.to_owned());
    }
  }
  return (directory, base.to_owned());
}
