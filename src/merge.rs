//! Sequential reassembly of decoded shards into a run's output stream.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::charset::CharSet;
use crate::error::{PrepError, Result};
use crate::pool::IndexedResult;
use crate::shard::{discard_scratch, ShardResult, ShardTask};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of appending one scratch file.
enum Appended {
    Complete(u64),
    /// The scratch file failed before any of its bytes reached the output.
    Unreadable(io::Error),
}

/// A shard that contributed nothing to the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    /// Submission index of the shard.
    pub index: usize,
    /// File name of the shard.
    pub shard: String,
    /// Why the shard was skipped.
    pub reason: String,
}

/// Totals accumulated while merging one run.
#[derive(Debug, Clone, Default)]
pub struct MergeSummary {
    /// Shards whose text was appended.
    pub succeeded: usize,
    /// Shards that were skipped.
    pub failed: usize,
    /// Bytes appended to the output stream.
    pub bytes_written: u64,
    /// Union of the character sets of all appended shards.
    pub chars: CharSet,
    /// Details of every skipped shard, in submission order.
    pub failures: Vec<ShardFailure>,
}

/// Appends decoded shards to an output stream in submission order.
///
/// The coordinator is the only writer of `output`; it runs on the calling thread after the worker
/// pool has returned every result.
#[derive(Debug)]
pub struct MergeCoordinator<W: Write> {
    output: W,
    label: String,
}

impl<W: Write> MergeCoordinator<W> {
    /// Creates a coordinator writing to `output`; `label` names the run in log messages.
    pub fn new(output: W, label: impl Into<String>) -> Self {
        Self {
            output,
            label: label.into(),
        }
    }

    /// Merges `results` produced for `tasks` and returns the run totals.
    ///
    /// Results are sorted by submission index before anything is written, so the output is
    /// identical whatever order the workers finished in.  Successful scratch files are copied and
    /// then deleted; failures are counted and logged.  A scratch file that cannot be opened or
    /// read before any of its bytes are written counts as a failed shard.  Errors writing to
    /// `output`, and scratch read errors after part of the file was already appended, abort the
    /// merge.
    pub fn merge(
        &mut self,
        tasks: &[ShardTask],
        mut results: Vec<IndexedResult>,
    ) -> Result<MergeSummary> {
        if results.len() != tasks.len() {
            return Err(PrepError::Internal(format!(
                "{} results for {} tasks",
                results.len(),
                tasks.len()
            )));
        }
        results.sort_by_key(|(index, _)| *index);

        let mut summary = MergeSummary::default();
        for (index, result) in results {
            let task = tasks.get(index).ok_or_else(|| {
                PrepError::Internal(format!("result index {index} has no matching task"))
            })?;
            match result {
                ShardResult::Success {
                    scratch_path,
                    chars,
                    bytes,
                } => {
                    let mut scratch = match File::open(&scratch_path) {
                        Ok(file) => file,
                        Err(err) => {
                            self.record_failure(
                                &mut summary,
                                index,
                                task,
                                format!("scratch file {scratch_path:?} unavailable: {err}"),
                            );
                            continue;
                        }
                    };
                    let copied = match self.append(&mut scratch, &scratch_path)? {
                        Appended::Complete(copied) => copied,
                        Appended::Unreadable(err) => {
                            drop(scratch);
                            discard_scratch(&scratch_path);
                            self.record_failure(
                                &mut summary,
                                index,
                                task,
                                format!("scratch file {scratch_path:?} unreadable: {err}"),
                            );
                            continue;
                        }
                    };
                    if copied != bytes {
                        debug!(
                            "{}: scratch file for {} held {copied} bytes, decoder reported {bytes}",
                            self.label,
                            task.shard()
                        );
                    }
                    drop(scratch);
                    if let Err(err) = fs::remove_file(&scratch_path) {
                        debug!("could not remove scratch file {scratch_path:?}: {err}");
                    }
                    summary.chars.union_with(chars);
                    summary.bytes_written += copied;
                    summary.succeeded += 1;
                }
                ShardResult::Failure { reason } => {
                    self.record_failure(&mut summary, index, task, reason);
                }
            }
        }
        self.output
            .flush()
            .map_err(|err| PrepError::io(err, None))?;

        info!(
            "{}: processing complete: {} shards succeeded, {} shards failed",
            self.label, summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    /// Returns the underlying output stream.
    pub fn into_inner(self) -> W {
        self.output
    }

    fn append(&mut self, scratch: &mut File, scratch_path: &Path) -> Result<Appended> {
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            let read = match scratch.read(&mut buffer) {
                Ok(0) => return Ok(Appended::Complete(copied)),
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if copied == 0 => return Ok(Appended::Unreadable(err)),
                Err(err) => return Err(PrepError::io(err, Some(scratch_path.to_path_buf()))),
            };
            self.output
                .write_all(&buffer[..read])
                .map_err(|err| PrepError::io(err, None))?;
            copied += read as u64;
        }
    }

    fn record_failure(
        &self,
        summary: &mut MergeSummary,
        index: usize,
        task: &ShardTask,
        reason: String,
    ) {
        warn!(
            "{}: error processing {:?}: {reason}",
            self.label,
            task.source_path()
        );
        summary.failed += 1;
        summary.failures.push(ShardFailure {
            index,
            shard: task.shard().name().to_owned(),
            reason,
        });
    }
}
