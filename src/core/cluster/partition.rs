// src/core/cluster/partition.rs

//! Splits the global shard space into contiguous, equal-length blocks, one
//! per cluster slot. Computed once at startup and never revised.

use crate::core::errors::OperatorError;
use serde::{Deserialize, Serialize};

/// The contiguous range of shard IDs owned by a single slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub shards: Vec<u32>,
    pub total: u32,
}

impl Block {
    pub fn first_shard_id(&self) -> u32 {
        self.shards[0]
    }

    /// Last-inclusive: the final shard index this block actually owns.
    ///
    /// The historical Go implementation returned `last + 1` here; we pick
    /// last-inclusive instead, since "last shard id" reading as "one past
    /// the last" is the more surprising of the two and nothing downstream
    /// relies on the off-by-one.
    pub fn last_shard_id(&self) -> u32 {
        *self.shards.last().expect("a Block is never empty")
    }
}

/// Splits `shards` shards evenly across `clusters` slots.
///
/// `avg = shards / clusters` (integer division). Block `k` covers
/// `[k*avg, (k+1)*avg)`. Requires `shards % clusters == 0`; a non-even split
/// is refused rather than silently producing a short final block or an
/// out-of-bounds slice (both of which the original implementation could hit
/// depending on its historical variant).
pub fn partition(shards: u32, clusters: u32) -> Result<Vec<Block>, OperatorError> {
    if clusters == 0 {
        return Err(OperatorError::Partition(
            "cluster count must be greater than zero".into(),
        ));
    }
    if shards == 0 {
        return Err(OperatorError::Partition(
            "shard count must be greater than zero".into(),
        ));
    }
    if shards % clusters != 0 {
        return Err(OperatorError::Partition(format!(
            "shard count {shards} is not evenly divisible by cluster count {clusters}"
        )));
    }

    let avg = shards / clusters;
    Ok((0..clusters)
        .map(|k| Block {
            shards: (k * avg..(k + 1) * avg).collect(),
            total: shards,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_partition_16_shards_4_clusters() {
        let blocks = partition(16, 4).unwrap();
        assert_eq!(
            blocks.iter().map(|b| b.shards.clone()).collect::<Vec<_>>(),
            vec![
                vec![0, 1, 2, 3],
                vec![4, 5, 6, 7],
                vec![8, 9, 10, 11],
                vec![12, 13, 14, 15],
            ]
        );
    }

    #[test]
    fn partition_completeness_for_various_sizes() {
        for (shards, clusters) in [(16, 4), (100, 10), (6, 3), (1, 1), (64, 8)] {
            let blocks = partition(shards, clusters).unwrap();
            assert_eq!(blocks.len(), clusters as usize);
            let mut seen: Vec<u32> = blocks.iter().flat_map(|b| b.shards.clone()).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..shards).collect::<Vec<_>>());
            let expected_len = (shards / clusters) as usize;
            assert!(blocks.iter().all(|b| b.shards.len() == expected_len));
        }
    }

    #[test]
    fn rejects_uneven_division() {
        let err = partition(10, 3).unwrap_err();
        assert!(matches!(err, OperatorError::Partition(_)));
    }

    #[test]
    fn rejects_zero_clusters() {
        assert!(partition(10, 0).is_err());
    }

    #[test]
    fn last_shard_id_is_inclusive() {
        let blocks = partition(16, 4).unwrap();
        assert_eq!(blocks[0].first_shard_id(), 0);
        assert_eq!(blocks[0].last_shard_id(), 3);
        assert_eq!(blocks[3].last_shard_id(), 15);
    }
}
