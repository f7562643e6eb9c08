//! What the tool needs to know about the chain, independent of where it comes
//! from.

use std::future::Future;

use ds_common::FORK_ID_ETROG;
use ethereum_types::{Address, H256};
use stream_decoder::{RawBlock, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct L2BlockHeader {
    pub number: u64,
    pub hash: H256,
    pub state_root: H256,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub coinbase: Address,
}

/// Read access to blocks and state.
pub trait ChainState {
    fn last_block_number(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    fn block_by_number(
        &self,
        number: u64,
    ) -> impl Future<Output = anyhow::Result<L2BlockHeader>> + Send;

    /// Reads storage `slot` of `address` in the state committed to by
    /// `state_root`, the state root of block `block`.
    fn storage_at(
        &self,
        address: Address,
        slot: H256,
        block: u64,
        state_root: H256,
    ) -> impl Future<Output = anyhow::Result<H256>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceBatch {
    pub number: u64,
    pub fork_id: u64,
    pub forced: bool,
    pub coinbase: Address,
    pub global_exit_root: H256,
    pub local_exit_root: H256,
    pub state_root: H256,
    pub timestamp: u64,
    pub blocks: Vec<SourceBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceBlock {
    pub header: L2BlockHeader,
    pub delta_timestamp: u32,
    pub l1_info_tree_index: u32,
    pub global_exit_root: H256,
    pub block_info_root: H256,
    pub transactions: Vec<Transaction>,
}

/// Pairs the blocks of a batch with the blocks split out of its raw data.
///
/// Pre-etrog batch data has no block headers, so the delta timestamp of each
/// block is taken from the header timestamps, the first one relative to
/// `parent_timestamp`. A batch without data (genesis) yields blocks without
/// transactions.
pub fn assemble_blocks(
    fork_id: u64,
    headers: Vec<L2BlockHeader>,
    raw_blocks: Vec<RawBlock>,
    parent_timestamp: u64,
    global_exit_root: H256,
) -> Vec<SourceBlock> {
    let mut raw_blocks = raw_blocks.into_iter();
    let mut previous = parent_timestamp;
    headers
        .into_iter()
        .map(|header| {
            let raw = raw_blocks.next().unwrap_or_default();
            let delta_timestamp = if fork_id >= FORK_ID_ETROG {
                raw.delta_timestamp
            } else {
                u32::try_from(header.timestamp.saturating_sub(previous)).unwrap_or(u32::MAX)
            };
            previous = header.timestamp;
            SourceBlock {
                header,
                delta_timestamp,
                l1_info_tree_index: raw.l1_info_tree_index,
                global_exit_root,
                block_info_root: H256::zero(),
                transactions: raw.transactions,
            }
        })
        .collect()
}

/// Sequenced batches, the input of the generator.
pub trait BatchSource {
    fn last_batch_number(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    fn batch(&self, number: u64) -> impl Future<Output = anyhow::Result<SourceBatch>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64, timestamp: u64) -> L2BlockHeader {
        L2BlockHeader {
            number,
            timestamp,
            ..Default::default()
        }
    }

    #[test]
    fn pre_etrog_deltas_follow_header_timestamps() {
        let blocks = assemble_blocks(
            6,
            vec![header(10, 1_005), header(11, 1_005), header(12, 1_012)],
            vec![RawBlock::default(); 3],
            1_000,
            H256::zero(),
        );
        let deltas: Vec<_> = blocks.iter().map(|block| block.delta_timestamp).collect();
        assert_eq!(deltas, [5, 0, 7]);
    }

    #[test]
    fn etrog_deltas_come_from_batch_data() {
        let raw = RawBlock {
            delta_timestamp: 3,
            l1_info_tree_index: 9,
            transactions: vec![],
        };
        let blocks = assemble_blocks(7, vec![header(10, 5_000)], vec![raw], 1_000, H256::zero());
        assert_eq!(blocks[0].delta_timestamp, 3);
        assert_eq!(blocks[0].l1_info_tree_index, 9);
    }

    #[test]
    fn genesis_blocks_have_no_transactions() {
        let blocks = assemble_blocks(1, vec![header(0, 1_000)], vec![], 1_000, H256::zero());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].delta_timestamp, 0);
        assert!(blocks[0].transactions.is_empty());
    }
}
