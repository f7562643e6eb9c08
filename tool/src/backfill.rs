//! Parallel computation of the intermediate state roots of pre-etrog blocks.
//!
//! The root of block `n` lives in storage of the system contract, at a slot
//! derived from `n`, in the state of block `n`. Blocks missing from the cache
//! are split into contiguous partitions, one worker task per partition. Workers
//! send `(block, root)` pairs to a single collector that owns the map.

use std::{ops::RangeInclusive, sync::Arc};

use ds_common::{system_sc_position, SYSTEM_SC, ZERO_HASH};
use ethereum_types::H256;
use futures::future::try_join_all;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{cache::ImRootCache, chain::ChainState};

const ROOT_CHANNEL_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error("failed to read the intermediate state root of block {block}: {source}")]
    ChainState {
        block: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("root collector stopped before worker {0} finished")]
    CollectorGone(usize),
    #[error("backfill worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// What one worker did with its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOutcome {
    pub range: RangeInclusive<u64>,
    pub computed: u64,
    /// First block found with a zero root, where the worker gave up.
    pub stopped_at: Option<u64>,
}

#[derive(Debug)]
pub struct Backfill {
    pub roots: ImRootCache,
    pub partitions: Vec<PartitionOutcome>,
}

/// Splits `start..=end` into at most `workers` contiguous ranges. Every range
/// holds `remaining / parts` blocks except the last, which also takes the
/// remainder.
pub fn partition(start: u64, end: u64, workers: usize) -> Vec<RangeInclusive<u64>> {
    if workers == 0 || start > end {
        return Vec::new();
    }
    let remaining = end - start + 1;
    let parts = remaining.min(workers as u64);
    let size = remaining / parts;

    (0..parts)
        .map(|part| {
            let first = start + part * size;
            let last = if part == parts - 1 {
                end
            } else {
                first + size - 1
            };
            first..=last
        })
        .collect()
}

/// Fills `cache` up to and including `max_block` using `workers` concurrent
/// tasks, resuming after the blocks the cache already holds.
///
/// A zero root for any block but 0 marks the end of valid data: the worker
/// that reads it stops, and the result keeps only the gap-free prefix.
pub async fn backfill<C>(
    chain: Arc<C>,
    max_block: u64,
    workers: usize,
    cache: ImRootCache,
) -> Result<Backfill, BackfillError>
where
    C: ChainState + Send + Sync + 'static,
{
    let start = cache.len() as u64;
    let ranges = partition(start, max_block, workers);
    info!(
        cached = start,
        max_block,
        partitions = ranges.len(),
        "computing intermediate state roots"
    );
    if ranges.is_empty() {
        return Ok(Backfill {
            roots: cache,
            partitions: Vec::new(),
        });
    }

    let (root_tx, mut root_rx) = mpsc::channel::<(u64, H256)>(ROOT_CHANNEL_SIZE);
    let tasks = ranges
        .into_iter()
        .enumerate()
        .map(|(worker, range)| {
            let chain = chain.clone();
            let root_tx = root_tx.clone();
            tokio::spawn(async move { compute_partition(worker, range, chain.as_ref(), root_tx).await })
        })
        .collect::<Vec<_>>();
    drop(root_tx);

    let mut roots = cache.into_map();
    while let Some((block, root)) = root_rx.recv().await {
        // cached roots are never overwritten
        roots.entry(block).or_insert(root);
    }

    let partitions = try_join_all(tasks)
        .await?
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let roots = ImRootCache::from_prefix(roots);
    info!(len = roots.len(), "intermediate state roots computed");
    Ok(Backfill { roots, partitions })
}

async fn compute_partition<C>(
    worker: usize,
    range: RangeInclusive<u64>,
    chain: &C,
    root_tx: mpsc::Sender<(u64, H256)>,
) -> Result<PartitionOutcome, BackfillError>
where
    C: ChainState,
{
    info!(worker, start = range.start(), end = range.end(), "worker started");
    let mut outcome = PartitionOutcome {
        range: range.clone(),
        computed: 0,
        stopped_at: None,
    };

    for block in range {
        let root = intermediate_state_root(chain, block)
            .await
            .map_err(|source| BackfillError::ChainState { block, source })?;
        if root == ZERO_HASH && block != 0 {
            debug!(worker, block, "zero root, stopping");
            outcome.stopped_at = Some(block);
            break;
        }
        root_tx
            .send((block, root))
            .await
            .map_err(|_| BackfillError::CollectorGone(worker))?;
        outcome.computed += 1;
    }

    debug!(worker, computed = outcome.computed, "worker finished");
    Ok(outcome)
}

/// Reads the intermediate state root of `block` from the system contract.
pub async fn intermediate_state_root<C>(chain: &C, block: u64) -> anyhow::Result<H256>
where
    C: ChainState,
{
    let header = chain.block_by_number(block).await?;
    chain
        .storage_at(SYSTEM_SC, system_sc_position(block), block, header.state_root)
        .await
}
