//! Bounded parallel execution of shard decoding.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::config::{ExtractConfig, DEFAULT_PARALLELISM};
use crate::error::{PrepError, Result};
use crate::shard::{discard_scratch, ShardReader, ShardResult, ShardTask};

/// Result of one task paired with the task's submission index.
pub type IndexedResult = (usize, ShardResult);

/// Runs shard tasks on a dedicated thread pool capped at a fixed number of workers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    parallelism: usize,
    show_progress: bool,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLELISM)
    }
}

impl WorkerPool {
    /// Creates a pool running at most `parallelism` tasks at once.
    #[must_use]
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
            show_progress: false,
        }
    }

    /// Creates a pool from the extraction settings.
    #[must_use]
    pub fn from_config(cfg: &ExtractConfig) -> Self {
        Self::new(cfg.parallelism).with_progress(cfg.show_progress)
    }

    /// Enables or disables the progress bar.
    #[must_use]
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Maximum number of concurrently running tasks.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Decodes every task with `reader`.
    pub fn run(&self, tasks: &[ShardTask], reader: &ShardReader) -> Result<Vec<IndexedResult>> {
        self.run_with(tasks, |task| reader.read(task))
    }

    /// Executes `work` exactly once per task and returns every result tagged with its index.
    ///
    /// Results are gathered only after all tasks finish.  A panic raised by `work` is caught and
    /// reported as a [`ShardResult::Failure`] for that task alone.  The only error returned is a
    /// failure to spawn the worker threads.
    pub fn run_with<F>(&self, tasks: &[ShardTask], work: F) -> Result<Vec<IndexedResult>>
    where
        F: Fn(&ShardTask) -> ShardResult + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .thread_name(|index| format!("shard-worker-{index}"))
            .build()
            .map_err(|err| PrepError::Internal(format!("failed to build worker pool: {err}")))?;

        let pb = self.progress_bar(tasks.len());
        let results = pool.install(|| {
            tasks
                .par_iter()
                .with_max_len(1)
                .enumerate()
                .map(|(index, task)| {
                    let result = isolate(task, &work);
                    pb.inc(1);
                    (index, result)
                })
                .collect::<Vec<_>>()
        });
        pb.finish_and_clear();
        debug!(
            "worker pool finished {} tasks on {} threads",
            results.len(),
            self.parallelism
        );
        Ok(results)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}/{len} shards ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        pb.set_style(style);
        pb
    }
}

fn isolate<F>(task: &ShardTask, work: &F) -> ShardResult
where
    F: Fn(&ShardTask) -> ShardResult,
{
    match panic::catch_unwind(AssertUnwindSafe(|| work(task))) {
        Ok(result) => result,
        Err(payload) => {
            discard_scratch(task.scratch_path());
            ShardResult::Failure {
                reason: format!(
                    "worker panicked while decoding {}: {}",
                    task.shard(),
                    panic_message(payload.as_ref())
                ),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharSet;
    use crate::corpus::ShardId;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn tasks(count: usize) -> Vec<ShardTask> {
        (0..count)
            .map(|i| {
                let shard = ShardId::new(format!("shard{i:02}.xz")).expect("valid name");
                ShardTask::new(shard, Path::new("src"), format!("scratch{i}").into())
            })
            .collect()
    }

    fn success(task: &ShardTask) -> ShardResult {
        ShardResult::Success {
            scratch_path: task.scratch_path().to_path_buf(),
            chars: CharSet::new(),
            bytes: 0,
        }
    }

    #[test]
    fn every_task_runs_once_and_keeps_its_index() {
        let tasks = tasks(12);
        let calls = AtomicUsize::new(0);
        let results = WorkerPool::new(3)
            .run_with(&tasks, |task| {
                calls.fetch_add(1, Ordering::SeqCst);
                // later submissions finish first
                let index: u64 = task.shard().name()[5..7].parse().expect("index");
                thread::sleep(Duration::from_millis(24 - 2 * index));
                success(task)
            })
            .expect("pool runs");

        assert_eq!(calls.load(Ordering::SeqCst), 12);
        assert_eq!(results.len(), 12);
        for (index, result) in &results {
            let ShardResult::Success { scratch_path, .. } = result else {
                panic!("unexpected failure");
            };
            assert_eq!(scratch_path, tasks[*index].scratch_path());
        }
    }

    #[test]
    fn concurrency_never_exceeds_limit() {
        let tasks = tasks(16);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        WorkerPool::new(2)
            .run_with(&tasks, |task| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
                success(task)
            })
            .expect("pool runs");
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn panicking_task_becomes_failure() {
        let tasks = tasks(4);
        let results = WorkerPool::new(2)
            .run_with(&tasks, |task| {
                if task.shard().name() == "shard02.xz" {
                    panic!("decoder exploded");
                }
                success(task)
            })
            .expect("pool runs");

        let failures: Vec<_> = results
            .iter()
            .filter_map(|(index, result)| match result {
                ShardResult::Failure { reason } => Some((*index, reason.clone())),
                ShardResult::Success { .. } => None,
            })
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 2);
        assert!(failures[0].1.contains("decoder exploded"));
    }
}
