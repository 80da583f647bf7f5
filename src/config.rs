//! Configuration builders controlling extraction, splitting, and pipeline artefacts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Default number of concurrent shard workers.
pub const DEFAULT_PARALLELISM: usize = 4;
/// Default size of decoded text chunks read from a shard (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
/// Smallest chunk able to hold any UTF-8 encoded scalar value.
pub const MIN_CHUNK_SIZE: usize = 4;

/// Configuration for the parallel extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractConfig {
    /// Maximum number of shards decoded concurrently.
    pub parallelism: usize,
    /// Size in bytes of each decoded chunk written to scratch storage.
    pub chunk_size: usize,
    /// Renders an indicatif progress bar while shards are decoded.
    pub show_progress: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            chunk_size: DEFAULT_CHUNK_SIZE,
            show_progress: true,
        }
    }
}

impl ExtractConfig {
    /// Returns a builder initialised with [`ExtractConfig::default`].
    #[must_use]
    pub fn builder() -> ExtractBuilder {
        ExtractBuilder::default()
    }

    /// Validates the invariants required for extraction.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(PrepError::InvalidConfig(
                "parallelism must be greater than zero".into(),
            ));
        }
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(PrepError::InvalidConfig(format!(
                "chunk_size ({}) must be at least {MIN_CHUNK_SIZE} bytes",
                self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Builder for [`ExtractConfig`].
#[derive(Debug, Default, Clone)]
pub struct ExtractBuilder {
    cfg: ExtractConfig,
}

impl ExtractBuilder {
    /// Creates a builder with [`ExtractConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent workers.
    #[must_use]
    pub fn parallelism(mut self, value: usize) -> Self {
        self.cfg.parallelism = value;
        self
    }

    /// Sets the decoded chunk size in bytes.
    #[must_use]
    pub fn chunk_size(mut self, value: usize) -> Self {
        self.cfg.chunk_size = value;
        self
    }

    /// Enables or disables the progress bar.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`ExtractConfig`].
    pub fn build(self) -> Result<ExtractConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Ratios used by [`crate::split::RatioSplit`] to partition and sample discovered shards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of discovered shards assigned to the training partition.
    pub train_ratio: f64,
    /// Fraction of each partition that is actually extracted.
    pub sample_rate: f64,
    /// Seed for reproducible sampling; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.9,
            sample_rate: 0.01,
            seed: None,
        }
    }
}

impl SplitConfig {
    /// Validates ratio bounds.
    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(PrepError::InvalidConfig(format!(
                "train_ratio ({}) must lie strictly between 0 and 1",
                self.train_ratio
            )));
        }
        if !(self.sample_rate > 0.0 && self.sample_rate <= 1.0) {
            return Err(PrepError::InvalidConfig(format!(
                "sample_rate ({}) must lie in (0, 1]",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Top-level configuration for a full extraction run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned (non-recursively) for compressed shards.
    pub source_dir: PathBuf,
    /// Destination of the concatenated training text.
    pub train_output: PathBuf,
    /// Destination of the concatenated validation text.
    pub validation_output: PathBuf,
    /// Destination of the character vocabulary.
    pub vocab_output: PathBuf,
    /// Parent directory for scratch areas; `None` uses the system temp dir.
    pub scratch_root: Option<PathBuf>,
    /// Extraction settings shared by both runs.
    pub extract: ExtractConfig,
    /// Split and sampling ratios.
    pub split: SplitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("openwebtext"),
            train_output: PathBuf::from("output_train.txt"),
            validation_output: PathBuf::from("output_val.txt"),
            vocab_output: PathBuf::from("vocab.txt"),
            scratch_root: None,
            extract: ExtractConfig::default(),
            split: SplitConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Returns a builder initialised with [`PipelineConfig::default`].
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Loads a configuration from a JSON document; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw =
            fs::read_to_string(path).map_err(|err| PrepError::io(err, Some(path.to_path_buf())))?;
        let cfg: Self = serde_json::from_str(&raw)?;
        Ok(cfg)
    }

    /// Validates nested configs and rejects colliding artefact paths.
    pub fn validate(&self) -> Result<()> {
        self.extract.validate()?;
        self.split.validate()?;
        let outputs = [
            &self.train_output,
            &self.validation_output,
            &self.vocab_output,
        ];
        for (i, left) in outputs.iter().enumerate() {
            for right in &outputs[i + 1..] {
                if left == right {
                    return Err(PrepError::InvalidConfig(format!(
                        "output path {left:?} is used for more than one artefact"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default, Clone)]
pub struct PipelineBuilder {
    cfg: PipelineConfig,
}

impl PipelineBuilder {
    /// Creates a builder with [`PipelineConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source directory.
    #[must_use]
    pub fn source_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.source_dir = path.into();
        self
    }

    /// Sets the training text destination.
    #[must_use]
    pub fn train_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.train_output = path.into();
        self
    }

    /// Sets the validation text destination.
    #[must_use]
    pub fn validation_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.validation_output = path.into();
        self
    }

    /// Sets the vocabulary destination.
    #[must_use]
    pub fn vocab_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.vocab_output = path.into();
        self
    }

    /// Places scratch areas under `path` instead of the system temp dir.
    #[must_use]
    pub fn scratch_root(mut self, path: Option<PathBuf>) -> Self {
        self.cfg.scratch_root = path;
        self
    }

    /// Overrides the extraction settings.
    #[must_use]
    pub fn extract(mut self, extract: ExtractConfig) -> Self {
        self.cfg.extract = extract;
        self
    }

    /// Overrides the split settings.
    #[must_use]
    pub fn split(mut self, split: SplitConfig) -> Self {
        self.cfg.split = split;
        self
    }

    /// Finalises the builder, returning a validated [`PipelineConfig`].
    pub fn build(self) -> Result<PipelineConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}
