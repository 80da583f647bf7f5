//! Run-scoped scratch storage holding one decoded file per shard task.

use std::fs;
use std::path::Path;

use log::debug;
use tempfile::{Builder, TempDir};

use crate::corpus::ShardId;
use crate::error::{PrepError, Result};
use crate::shard::ShardTask;

/// Temporary directory owning every scratch file of a run.
///
/// The directory and anything left inside it are removed when the area is dropped, so early
/// returns and panics still release scratch storage.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Creates a fresh area under `root`, or under the system temp dir when `root` is `None`.
    pub fn create(root: Option<&Path>, label: &str) -> Result<Self> {
        let prefix = format!("shardprep-{label}-");
        let mut builder = Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)
                    .map_err(|err| PrepError::io(err, Some(root.to_path_buf())))?;
                builder
                    .tempdir_in(root)
                    .map_err(|err| PrepError::io(err, Some(root.to_path_buf())))?
            }
            None => builder
                .tempdir()
                .map_err(|err| PrepError::io(err, None))?,
        };
        debug!("created scratch area {:?}", dir.path());
        Ok(Self { dir })
    }

    /// Location of the area on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Builds one task per shard, each writing to `{index:06}_{name}.txt` inside the area.
    #[must_use]
    pub fn tasks(&self, shards: &[ShardId], source_dir: &Path) -> Vec<ShardTask> {
        shards
            .iter()
            .enumerate()
            .map(|(index, shard)| {
                let scratch = self.path().join(format!("{index:06}_{}.txt", shard.name()));
                ShardTask::new(shard.clone(), source_dir, scratch)
            })
            .collect()
    }

    /// Counts the files still present in the area.
    pub fn remaining_files(&self) -> Result<usize> {
        let entries = fs::read_dir(self.path())
            .map_err(|err| PrepError::io(err, Some(self.path().to_path_buf())))?;
        Ok(entries.filter_map(std::result::Result::ok).count())
    }

    /// Removes the area and reports any teardown error.
    pub fn close(self) -> Result<()> {
        let path = self.path().to_path_buf();
        self.dir
            .close()
            .map_err(|err| PrepError::io(err, Some(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_get_distinct_scratch_paths() {
        let root = tempfile::tempdir().expect("tempdir");
        let area = ScratchArea::create(Some(root.path()), "train").expect("area");
        let shards = vec![
            ShardId::new("a.xz").expect("valid"),
            ShardId::new("a.xz").expect("valid"),
        ];
        let tasks = area.tasks(&shards, Path::new("corpus"));
        assert_ne!(tasks[0].scratch_path(), tasks[1].scratch_path());
        assert!(tasks[0].scratch_path().starts_with(area.path()));
        assert_eq!(tasks[1].source_path(), Path::new("corpus/a.xz"));
    }

    #[test]
    fn dropping_the_area_removes_leftovers() {
        let root = tempfile::tempdir().expect("tempdir");
        let area = ScratchArea::create(Some(root.path()), "val").expect("area");
        let path = area.path().to_path_buf();
        fs::write(path.join("left.txt"), b"x").expect("write leftover");
        assert_eq!(area.remaining_files().expect("count"), 1);
        drop(area);
        assert!(!path.exists());
    }
}
