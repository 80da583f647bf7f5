//! Character inventories accumulated while shards are decoded.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rustc_hash::FxHashSet;

use crate::error::{PrepError, Result};

/// Set of distinct Unicode scalar values observed in decoded text.
///
/// Each worker owns its own set; sets are only combined through [`CharSet::union_with`] at merge
/// time, so no locking is needed while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharSet {
    chars: FxHashSet<char>,
}

impl CharSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds every character of `text` into the set.
    pub fn extend_from_str(&mut self, text: &str) {
        self.chars.extend(text.chars());
    }

    /// Moves every character of `other` into `self`.
    pub fn union_with(&mut self, other: CharSet) {
        if self.chars.is_empty() {
            self.chars = other.chars;
        } else {
            self.chars.extend(other.chars);
        }
    }

    /// Returns whether `ch` has been observed.
    #[must_use]
    pub fn contains(&self, ch: char) -> bool {
        self.chars.contains(&ch)
    }

    /// Number of distinct characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Returns `true` when no character has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Returns the characters sorted by code point.
    #[must_use]
    pub fn sorted(&self) -> Vec<char> {
        let mut chars: Vec<char> = self.chars.iter().copied().collect();
        chars.sort_unstable();
        chars
    }

    /// Writes the sorted characters to `path`, one per line.
    pub fn write_vocab<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let to_err = |err: std::io::Error| PrepError::io(err, Some(path.to_path_buf()));
        let mut writer = BufWriter::new(File::create(path).map_err(to_err)?);
        let mut buf = [0u8; 4];
        for ch in self.sorted() {
            writer
                .write_all(ch.encode_utf8(&mut buf).as_bytes())
                .map_err(to_err)?;
            writer.write_all(b"\n").map_err(to_err)?;
        }
        writer.flush().map_err(to_err)?;
        Ok(())
    }
}

impl FromIterator<char> for CharSet {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Self {
            chars: iter.into_iter().collect(),
        }
    }
}

impl Extend<char> for CharSet {
    fn extend<I: IntoIterator<Item = char>>(&mut self, iter: I) {
        self.chars.extend(iter);
    }
}
