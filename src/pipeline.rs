//! End-to-end driver: discovery, split, parallel extraction, merge, and vocabulary output.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::charset::CharSet;
use crate::config::PipelineConfig;
use crate::corpus::{discover_shards, ShardId};
use crate::error::{PrepError, Result};
use crate::merge::MergeCoordinator;
use crate::metrics::{PipelineReport, RunReport, RunState};
use crate::pool::WorkerPool;
use crate::scratch::ScratchArea;
use crate::shard::ShardReader;
use crate::split::{RatioSplit, ShardSplit, SplitPolicy};

/// Shards discovered in the source directory and the subsets chosen for each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionPlan {
    /// Every shard found, in discovery order.
    pub discovered: Vec<ShardId>,
    /// Subsets handed to the train and validation runs.
    pub split: ShardSplit,
}

/// Drives the train and validation runs described by a [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    cfg: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline for `cfg`.
    #[must_use]
    pub fn new(cfg: PipelineConfig) -> Self {
        Self { cfg }
    }

    /// Returns the configuration driving this pipeline.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Discovers shards and applies `policy` without touching any output file.
    pub fn plan<P: SplitPolicy + ?Sized>(&self, policy: &P) -> Result<ExtractionPlan> {
        self.cfg.validate()?;
        let source = &self.cfg.source_dir;
        info!("scanning for shards in {source:?}");
        let discovered = discover_shards(source)?;
        info!("found {} shards", discovered.len());
        let split = policy.split(&discovered);
        info!(
            "selected {} training shards and {} validation shards",
            split.train.len(),
            split.validation.len()
        );
        Ok(ExtractionPlan { discovered, split })
    }

    /// Runs the pipeline with the [`RatioSplit`] built from the configured split settings.
    pub fn run(&self) -> Result<PipelineReport> {
        self.run_with_policy(&RatioSplit::new(self.cfg.split.clone()))
    }

    /// Runs the pipeline with a caller-supplied split policy.
    ///
    /// Structural errors (invalid config, missing source directory, no shards) are returned
    /// before any output file is created.  Both text outputs are truncated before the first run
    /// starts, so repeated invocations overwrite earlier results.
    pub fn run_with_policy<P: SplitPolicy + ?Sized>(&self, policy: &P) -> Result<PipelineReport> {
        let started = Instant::now();
        let plan = self.plan(policy)?;

        let train_file = create_output(&self.cfg.train_output)?;
        let validation_file = create_output(&self.cfg.validation_output)?;

        let (train, mut chars) = self.run_split(
            "train",
            &plan.split.train,
            &self.cfg.train_output,
            train_file,
        )?;
        let (validation, validation_chars) = self.run_split(
            "validation",
            &plan.split.validation,
            &self.cfg.validation_output,
            validation_file,
        )?;
        chars.union_with(validation_chars);

        info!(
            "writing vocabulary with {} unique characters to {:?}",
            chars.len(),
            self.cfg.vocab_output
        );
        chars.write_vocab(&self.cfg.vocab_output)?;

        let report = PipelineReport {
            discovered: plan.discovered.len(),
            train,
            validation,
            vocab_output: self.cfg.vocab_output.clone(),
            vocab_size: chars.len(),
            total_duration: started.elapsed(),
        };
        info!(
            "data extraction complete: {} shards succeeded, {} failed in {:.2?}",
            report.succeeded(),
            report.failed(),
            report.total_duration
        );
        Ok(report)
    }

    fn run_split(
        &self,
        label: &str,
        shards: &[ShardId],
        output_path: &Path,
        output: File,
    ) -> Result<(RunReport, CharSet)> {
        let started = Instant::now();
        let mut state = RunState::Idle;
        debug!("{label}: {state:?}");

        let scratch = ScratchArea::create(self.cfg.scratch_root.as_deref(), label)?;
        let tasks = scratch.tasks(shards, &self.cfg.source_dir);
        let reader = ShardReader::new(self.cfg.extract.chunk_size);
        let pool = WorkerPool::from_config(&self.cfg.extract);

        state = RunState::Dispatching;
        debug!("{label}: {state:?}");
        info!(
            "{label}: processing {} shards with {} workers",
            tasks.len(),
            pool.parallelism()
        );
        let results = pool.run(&tasks, &reader)?;

        state = RunState::Merging;
        debug!("{label}: {state:?}");
        let mut merger = MergeCoordinator::new(BufWriter::new(output), label);
        let summary = merger.merge(&tasks, results)?;
        drop(merger);

        let leftover = scratch.remaining_files()?;
        if leftover > 0 {
            debug!("{label}: removing {leftover} leftover scratch files");
        }
        scratch.close()?;
        state = RunState::Done;
        debug!("{label}: {state:?}");

        let report = RunReport::from_summary(
            label,
            output_path.to_path_buf(),
            tasks.len(),
            &summary,
            started.elapsed(),
        );
        Ok((report, summary.chars))
    }
}

fn create_output(path: &Path) -> Result<File> {
    File::create(path).map_err(|err| PrepError::io(err, Some(path.to_path_buf())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractConfig, SplitConfig};
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_xz(path: &Path, text: &str) {
        let mut encoder = xz2::write::XzEncoder::new(File::create(path).expect("create"), 6);
        encoder.write_all(text.as_bytes()).expect("encode");
        encoder.finish().expect("finish");
    }

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .source_dir(root.join("shards"))
            .train_output(root.join("train.txt"))
            .validation_output(root.join("val.txt"))
            .vocab_output(root.join("vocab.txt"))
            .scratch_root(Some(root.join("scratch")))
            .extract(
                ExtractConfig::builder()
                    .parallelism(2)
                    .show_progress(false)
                    .build()
                    .expect("extract config"),
            )
            .split(SplitConfig {
                train_ratio: 0.5,
                sample_rate: 1.0,
                seed: Some(1),
            })
            .build()
            .expect("pipeline config")
    }

    #[test]
    fn runs_train_and_validation_and_writes_vocab() {
        let root = tempdir().expect("tempdir");
        let shards = root.path().join("shards");
        fs::create_dir(&shards).expect("shards dir");
        write_xz(&shards.join("a.xz"), "hi");
        write_xz(&shards.join("b.xz"), "yo");

        let report = Pipeline::new(config(root.path())).run().expect("pipeline");
        assert_eq!(report.discovered, 2);
        assert_eq!(fs::read_to_string(root.path().join("train.txt")).unwrap(), "hi");
        assert_eq!(fs::read_to_string(root.path().join("val.txt")).unwrap(), "yo");
        assert_eq!(
            fs::read_to_string(root.path().join("vocab.txt")).unwrap(),
            "h\ni\no\ny\n"
        );
        assert_eq!(report.vocab_size, 4);
    }

    #[test]
    fn plan_does_not_create_outputs() {
        let root = tempdir().expect("tempdir");
        let shards = root.path().join("shards");
        fs::create_dir(&shards).expect("shards dir");
        write_xz(&shards.join("a.xz"), "hi");

        let pipeline = Pipeline::new(config(root.path()));
        let plan = pipeline
            .plan(&RatioSplit::new(pipeline.config().split.clone()))
            .expect("plan");
        assert_eq!(plan.discovered.len(), 1);
        assert!(!root.path().join("train.txt").exists());
    }
}
