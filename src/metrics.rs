//! Reports describing what an extraction run produced.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::merge::{MergeSummary, ShardFailure};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunState {
    /// Tasks built, nothing dispatched yet.
    Idle,
    /// Shards are being decoded by the worker pool.
    Dispatching,
    /// Decoded shards are being appended to the output stream.
    Merging,
    /// Output stream flushed and scratch area released.
    Done,
}

/// Totals for one run (train or validation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    /// Name of the run.
    pub label: String,
    /// Destination text file.
    pub output: PathBuf,
    /// Shards submitted to the worker pool.
    pub shards: usize,
    /// Shards appended to the output.
    pub succeeded: usize,
    /// Shards skipped because of decode or IO errors.
    pub failed: usize,
    /// Bytes appended to the output.
    pub bytes_written: u64,
    /// Distinct characters contributed by this run.
    pub distinct_chars: usize,
    /// Wall-clock duration of dispatch and merge.
    pub elapsed: Duration,
    /// Resident set size sampled after the merge, on Linux.
    pub rss_kb: Option<usize>,
    /// Skipped shards with their reasons.
    pub failures: Vec<ShardFailure>,
}

impl RunReport {
    /// Builds a report from a merge summary.
    #[must_use]
    pub fn from_summary(
        label: impl Into<String>,
        output: PathBuf,
        shards: usize,
        summary: &MergeSummary,
        elapsed: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            output,
            shards,
            succeeded: summary.succeeded,
            failed: summary.failed,
            bytes_written: summary.bytes_written,
            distinct_chars: summary.chars.len(),
            elapsed,
            rss_kb: sample_rss_kb(),
            failures: summary.failures.clone(),
        }
    }

    /// Decoded throughput in MiB/s.
    #[must_use]
    pub fn throughput_mib_s(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            bytes_to_mebibytes(self.bytes_written) / secs
        } else {
            0.0
        }
    }
}

/// Totals for a full pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineReport {
    /// Shards discovered in the source directory.
    pub discovered: usize,
    /// Training run totals.
    pub train: RunReport,
    /// Validation run totals.
    pub validation: RunReport,
    /// Location of the vocabulary file.
    pub vocab_output: PathBuf,
    /// Number of characters written to the vocabulary.
    pub vocab_size: usize,
    /// Total wall-clock duration.
    pub total_duration: Duration,
}

impl PipelineReport {
    /// Shards that succeeded across both runs.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.train.succeeded + self.validation.succeeded
    }

    /// Shards that failed across both runs.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.train.failed + self.validation.failed
    }
}

/// Converts a byte count to mebibytes.
#[must_use]
pub fn bytes_to_mebibytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(target_os = "linux")]
fn current_rss_kb() -> Option<usize> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open("/proc/self/status").ok()?;
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let value = rest
                .split_whitespace()
                .find_map(|part| part.parse::<usize>().ok());
            return value;
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn current_rss_kb() -> Option<usize> {
    None
}

/// Samples the current resident set size (RSS) on supported platforms.
pub fn sample_rss_kb() -> Option<usize> {
    current_rss_kb()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_handles_zero_duration() {
        let report = RunReport::from_summary(
            "train",
            PathBuf::from("out.txt"),
            0,
            &MergeSummary::default(),
            Duration::ZERO,
        );
        assert_eq!(report.throughput_mib_s(), 0.0);
    }

    #[test]
    fn throughput_uses_mebibytes() {
        let summary = MergeSummary {
            bytes_written: 4 * 1024 * 1024,
            ..MergeSummary::default()
        };
        let report = RunReport::from_summary(
            "train",
            PathBuf::from("out.txt"),
            1,
            &summary,
            Duration::from_secs(2),
        );
        assert!((report.throughput_mib_s() - 2.0).abs() < f64::EPSILON);
    }
}
