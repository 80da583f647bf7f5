//! Decoding of a single compressed shard into private scratch storage.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::charset::CharSet;
use crate::config::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::corpus::ShardId;
use crate::error::{PrepError, Result};

/// One unit of work: a shard to decode and the scratch file it decodes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTask {
    shard: ShardId,
    source_path: PathBuf,
    scratch_path: PathBuf,
}

impl ShardTask {
    /// Creates a task reading `shard` from `source_dir` into `scratch_path`.
    #[must_use]
    pub fn new(shard: ShardId, source_dir: &Path, scratch_path: PathBuf) -> Self {
        let source_path = shard.path_in(source_dir);
        Self {
            shard,
            source_path,
            scratch_path,
        }
    }

    /// Identifier of the shard being decoded.
    #[must_use]
    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    /// Location of the compressed input.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Location of the decoded scratch output.
    #[must_use]
    pub fn scratch_path(&self) -> &Path {
        &self.scratch_path
    }
}

/// Outcome of decoding one [`ShardTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardResult {
    /// The shard decoded completely into `scratch_path`.
    Success {
        /// Scratch file holding the decoded text; owned by the receiver from now on.
        scratch_path: PathBuf,
        /// Distinct characters seen in the decoded text.
        chars: CharSet,
        /// Number of decoded bytes written.
        bytes: u64,
    },
    /// The shard could not be decoded; no scratch file remains.
    Failure {
        /// Human-readable failure description.
        reason: String,
    },
}

impl ShardResult {
    /// Returns `true` for [`ShardResult::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Streams a shard through its decompressor in bounded chunks.
#[derive(Debug, Clone, Copy)]
pub struct ShardReader {
    chunk_size: usize,
}

impl Default for ShardReader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ShardReader {
    /// Creates a reader decoding `chunk_size` bytes at a time.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(MIN_CHUNK_SIZE),
        }
    }

    /// Decodes `task`, converting every error into [`ShardResult::Failure`].
    ///
    /// On failure any partially written scratch file is removed.
    pub fn read(&self, task: &ShardTask) -> ShardResult {
        match self.extract(task) {
            Ok((chars, bytes)) => ShardResult::Success {
                scratch_path: task.scratch_path().to_path_buf(),
                chars,
                bytes,
            },
            Err(err) => {
                discard_scratch(task.scratch_path());
                ShardResult::Failure {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn extract(&self, task: &ShardTask) -> Result<(CharSet, u64)> {
        let source = task.source_path();
        let decode_err = |reason: String| PrepError::Decode {
            path: source.to_path_buf(),
            reason,
        };
        let file =
            File::open(source).map_err(|err| PrepError::io(err, Some(source.to_path_buf())))?;
        let mut decoder = task.shard().codec().decoder(file);

        let scratch = task.scratch_path();
        let write_err = |err: io::Error| PrepError::io(err, Some(scratch.to_path_buf()));
        let mut writer = BufWriter::new(File::create(scratch).map_err(write_err)?);

        let mut chars = CharSet::new();
        let mut written = 0u64;
        let mut buf = vec![0u8; self.chunk_size];
        let mut carry = 0usize;
        loop {
            let (read, eof) = fill_buffer(&mut decoder, &mut buf[carry..])
                .map_err(|err| decode_err(err.to_string()))?;
            let filled = carry + read;
            let valid = match std::str::from_utf8(&buf[..filled]) {
                Ok(_) => filled,
                Err(err) if err.error_len().is_none() && !eof => err.valid_up_to(),
                Err(err) => {
                    return Err(decode_err(format!(
                        "invalid UTF-8 at decoded offset {}",
                        written + err.valid_up_to() as u64
                    )))
                }
            };
            let text = std::str::from_utf8(&buf[..valid])
                .map_err(|err| PrepError::Internal(err.to_string()))?;
            writer.write_all(text.as_bytes()).map_err(write_err)?;
            chars.extend_from_str(text);
            written += valid as u64;

            buf.copy_within(valid..filled, 0);
            carry = filled - valid;
            if eof {
                break;
            }
        }
        writer.flush().map_err(write_err)?;
        debug!(
            "decoded {} into {:?} ({} bytes, {} distinct chars)",
            task.shard(),
            scratch,
            written,
            chars.len()
        );
        Ok((chars, written))
    }
}

/// Reads until `buf` is full or the stream ends; the flag reports end of stream.
fn fill_buffer<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<(usize, bool)> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok((filled, true)),
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok((filled, false))
}

pub(crate) fn discard_scratch(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => debug!("could not remove partial scratch file {path:?}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_xz(path: &Path, text: &[u8]) {
        let mut encoder = xz2::write::XzEncoder::new(File::create(path).expect("create"), 6);
        encoder.write_all(text).expect("encode");
        encoder.finish().expect("finish");
    }

    fn task_for(dir: &Path, name: &str) -> ShardTask {
        let shard = ShardId::new(name).expect("recognised suffix");
        ShardTask::new(shard, dir, dir.join(format!("{name}.txt")))
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let dir = tempdir().expect("tempdir");
        let text = "añ€😀b".repeat(7);
        write_xz(&dir.path().join("mixed.xz"), text.as_bytes());
        let task = task_for(dir.path(), "mixed.xz");

        let result = ShardReader::new(5).read(&task);
        let ShardResult::Success {
            scratch_path,
            chars,
            bytes,
        } = result
        else {
            panic!("expected the shard to decode");
        };
        assert_eq!(fs::read_to_string(&scratch_path).expect("scratch"), text);
        assert_eq!(bytes, text.len() as u64);
        assert_eq!(chars.sorted(), vec!['a', 'b', 'ñ', '€', '😀']);
    }

    #[test]
    fn corrupt_shard_fails_without_scratch_file() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("broken.xz"), b"definitely not xz").expect("write");
        let task = task_for(dir.path(), "broken.xz");

        let result = ShardReader::default().read(&task);
        assert!(matches!(
            result,
            ShardResult::Failure { ref reason } if reason.contains("broken.xz")
        ));
        assert!(!task.scratch_path().exists());
    }

    #[test]
    fn invalid_utf8_is_a_decode_failure() {
        let dir = tempdir().expect("tempdir");
        write_xz(&dir.path().join("latin1.xz"), b"caf\xe9 au lait");
        let task = task_for(dir.path(), "latin1.xz");

        let result = ShardReader::new(4).read(&task);
        assert!(matches!(
            result,
            ShardResult::Failure { ref reason } if reason.contains("invalid UTF-8")
        ));
        assert!(!task.scratch_path().exists());
    }

    #[test]
    fn truncated_multibyte_sequence_at_eof_fails() {
        let dir = tempdir().expect("tempdir");
        write_xz(&dir.path().join("cut.xz"), &"€".as_bytes()[..2]);
        let task = task_for(dir.path(), "cut.xz");

        assert!(!ShardReader::default().read(&task).is_success());
    }

    #[test]
    fn empty_shard_succeeds_with_no_characters() {
        let dir = tempdir().expect("tempdir");
        write_xz(&dir.path().join("empty.xz"), b"");
        let task = task_for(dir.path(), "empty.xz");

        let result = ShardReader::default().read(&task);
        assert!(matches!(
            result,
            ShardResult::Success { bytes: 0, ref chars, .. } if chars.is_empty()
        ));
    }

    #[test]
    fn gzip_shards_are_decoded() {
        let dir = tempdir().expect("tempdir");
        let mut encoder = flate2::write::GzEncoder::new(
            File::create(dir.path().join("part.gz")).expect("create"),
            flate2::Compression::default(),
        );
        encoder.write_all(b"gzip text").expect("encode");
        encoder.finish().expect("finish");
        let task = task_for(dir.path(), "part.gz");

        let result = ShardReader::default().read(&task);
        assert!(matches!(result, ShardResult::Success { bytes: 9, .. }));
    }
}
