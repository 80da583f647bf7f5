//! Train/validation partitioning and shard sampling.

use log::warn;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::SplitConfig;
use crate::corpus::ShardId;

/// Shards selected for the training and validation runs, each in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSplit {
    /// Shards extracted into the training output.
    pub train: Vec<ShardId>,
    /// Shards extracted into the validation output.
    pub validation: Vec<ShardId>,
}

/// Decides which discovered shards each run processes.
pub trait SplitPolicy {
    /// Partitions `shards` (already in discovery order) into train and validation subsets.
    fn split(&self, shards: &[ShardId]) -> ShardSplit;
}

impl<F> SplitPolicy for F
where
    F: Fn(&[ShardId]) -> ShardSplit,
{
    fn split(&self, shards: &[ShardId]) -> ShardSplit {
        self(shards)
    }
}

/// Head/tail split by ratio followed by uniform sampling of each partition.
#[derive(Debug, Clone)]
pub struct RatioSplit {
    cfg: SplitConfig,
}

impl RatioSplit {
    /// Creates the policy from split settings.
    #[must_use]
    pub fn new(cfg: SplitConfig) -> Self {
        Self { cfg }
    }

    fn rng(&self, salt: u64) -> StdRng {
        match self.cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(salt)),
            None => StdRng::from_entropy(),
        }
    }

    fn sample_partition(&self, partition: &[ShardId], rng: &mut StdRng) -> Vec<ShardId> {
        let rate = self.cfg.sample_rate.clamp(0.0, 1.0);
        let wanted = ((partition.len() as f64 * rate).floor() as usize)
            .max(1)
            .min(partition.len());
        let mut picked = sample(rng, partition.len(), wanted).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|i| partition[i].clone()).collect()
    }
}

impl Default for RatioSplit {
    fn default() -> Self {
        Self::new(SplitConfig::default())
    }
}

impl SplitPolicy for RatioSplit {
    fn split(&self, shards: &[ShardId]) -> ShardSplit {
        match shards.len() {
            0 => ShardSplit::default(),
            1 => {
                warn!("only one shard available; using it for both train and validation");
                ShardSplit {
                    train: shards.to_vec(),
                    validation: shards.to_vec(),
                }
            }
            total => {
                let ratio = self.cfg.train_ratio.clamp(0.0, 1.0);
                let split_index = ((total as f64 * ratio).floor() as usize).clamp(1, total - 1);
                let (train, validation) = shards.split_at(split_index);
                ShardSplit {
                    train: self.sample_partition(train, &mut self.rng(0)),
                    validation: self.sample_partition(validation, &mut self.rng(1)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards(count: usize) -> Vec<ShardId> {
        (0..count)
            .map(|i| ShardId::new(format!("urlsf_{i:04}.xz")).expect("valid name"))
            .collect()
    }

    fn seeded(train_ratio: f64, sample_rate: f64) -> RatioSplit {
        RatioSplit::new(SplitConfig {
            train_ratio,
            sample_rate,
            seed: Some(7),
        })
    }

    #[test]
    fn full_sample_keeps_head_and_tail() {
        let all = shards(10);
        let split = seeded(0.9, 1.0).split(&all);
        assert_eq!(split.train, all[..9].to_vec());
        assert_eq!(split.validation, all[9..].to_vec());
    }

    #[test]
    fn sampling_takes_at_least_one_and_preserves_order() {
        let all = shards(1000);
        let split = seeded(0.9, 0.01).split(&all);
        assert_eq!(split.train.len(), 9);
        assert_eq!(split.validation.len(), 1);
        assert!(split.train.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(split.train.iter().all(|shard| all[..900].contains(shard)));
        assert!(all[900..].contains(&split.validation[0]));
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let all = shards(500);
        assert_eq!(seeded(0.8, 0.05).split(&all), seeded(0.8, 0.05).split(&all));
    }

    #[test]
    fn tiny_corpora_still_fill_both_runs() {
        let two = shards(2);
        let split = seeded(0.9, 0.01).split(&two);
        assert_eq!(split.train, vec![two[0].clone()]);
        assert_eq!(split.validation, vec![two[1].clone()]);

        let one = shards(1);
        let split = seeded(0.9, 0.01).split(&one);
        assert_eq!(split.train, one);
        assert_eq!(split.validation, one);
    }

    #[test]
    fn closures_act_as_policies() {
        let all = shards(3);
        let policy = |shards: &[ShardId]| ShardSplit {
            train: shards.to_vec(),
            validation: shards[..1].to_vec(),
        };
        let split = policy.split(&all);
        assert_eq!(split.train.len(), 3);
        assert_eq!(split.validation.len(), 1);
    }
}
