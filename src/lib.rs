//! Parallel extraction of compressed text shards into training corpora.
//!
//! The crate exposes both a library API and a `shardprep` command line interface.  A run
//! discovers `.xz`/`.gz` shards in a source directory, splits and samples them into training and
//! validation subsets, decodes each subset on a bounded worker pool, concatenates the decoded
//! text in submission order, and writes the sorted character vocabulary seen across both runs.
//!
//! ```no_run
//! use shardprep::{ExtractConfig, Pipeline, PipelineConfig};
//!
//! # fn main() -> shardprep::Result<()> {
//! let cfg = PipelineConfig::builder()
//!     .source_dir("openwebtext")
//!     .extract(ExtractConfig::builder().parallelism(8).build()?)
//!     .build()?;
//! let report = Pipeline::new(cfg).run()?;
//! println!("vocabulary has {} characters", report.vocab_size);
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the library portion
//! only can disable default features to avoid the CLI dependencies.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod charset;
pub mod codec;
pub mod config;
pub mod corpus;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod scratch;
pub mod shard;
pub mod split;

pub use charset::CharSet;
pub use codec::Codec;
pub use config::{ExtractConfig, PipelineConfig, SplitConfig};
pub use corpus::{discover_shards, ShardId};
pub use error::{PrepError, Result};
pub use merge::{MergeCoordinator, MergeSummary, ShardFailure};
pub use metrics::{PipelineReport, RunReport, RunState};
pub use pipeline::{ExtractionPlan, Pipeline};
pub use pool::{IndexedResult, WorkerPool};
pub use scratch::ScratchArea;
pub use shard::{ShardReader, ShardResult, ShardTask};
pub use split::{RatioSplit, ShardSplit, SplitPolicy};
