//! Compression formats recognised for corpus shards.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use xz2::read::XzDecoder;

/// Streaming decoder selected from a shard's filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Codec {
    /// XZ/LZMA2 container (`.xz`).
    Xz,
    /// Gzip member stream (`.gz`).
    Gzip,
}

impl Codec {
    /// Every codec understood by the extractor.
    pub const ALL: [Codec; 2] = [Codec::Xz, Codec::Gzip];

    /// Filename suffix, including the leading dot.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Xz => ".xz",
            Self::Gzip => ".gz",
        }
    }

    /// Selects the codec whose suffix terminates `name`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|codec| name.len() > codec.suffix().len() && name.ends_with(codec.suffix()))
    }

    /// Selects the codec for the file name component of `path`.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::from_name)
    }

    /// Wraps an opened shard in the matching decompressor.
    pub fn decoder(self, file: File) -> Box<dyn Read + Send> {
        match self {
            Self::Xz => Box::new(XzDecoder::new_multi_decoder(file)),
            Self::Gzip => Box::new(MultiGzDecoder::new(file)),
        }
    }
}
