//! Facilities for discovering compressed shards in a source directory.

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{PrepError, Result};

/// Identifier of one compressed shard: its file name inside the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId {
    name: String,
    codec: Codec,
}

impl ShardId {
    /// Builds an identifier from a file name, returning `None` for unrecognised suffixes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let codec = Codec::from_name(&name)?;
        Some(Self { name, codec })
    }

    /// File name of the shard.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Codec used to decompress the shard.
    #[must_use]
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Full path of the shard inside `source_dir`.
    #[must_use]
    pub fn path_in(&self, source_dir: &Path) -> PathBuf {
        source_dir.join(&self.name)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lists the shards stored directly inside `dir`, sorted by file name.
///
/// Only regular files whose name ends in a recognised [`Codec`] suffix are returned; nested
/// directories are not traversed.  A missing directory yields [`PrepError::MissingSource`] and an
/// empty listing yields [`PrepError::NoShards`].
pub fn discover_shards(dir: &Path) -> Result<Vec<ShardId>> {
    if !dir.is_dir() {
        return Err(PrepError::MissingSource(dir.to_path_buf()));
    }
    let mut shards = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|err| PrepError::io(err, Some(dir.to_path_buf())))?
    {
        let entry = entry.map_err(|err| PrepError::io(err, Some(dir.to_path_buf())))?;
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            debug!("skipping non UTF-8 file name {entry_path:?}");
            continue;
        };
        if let Some(shard) = ShardId::new(name) {
            shards.push(shard);
        }
    }
    if shards.is_empty() {
        return Err(PrepError::NoShards(dir.to_path_buf()));
    }
    shards.sort();
    Ok(shards)
}
