//! The reconstructed batch → block → transaction hierarchy.

use ethereum_types::{Address, H256};

use crate::{
    proto::{self, BatchType},
    tx::LegacyTransaction,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub number: u64,
    pub chain_id: u64,
    pub fork_id: u64,
    pub batch_type: BatchType,
    pub coinbase: Address,
    pub global_exit_root: H256,
    pub l1_info_tree_index: u32,
    pub local_exit_root: H256,
    pub state_root: H256,
    pub blocks: Vec<Block>,
    /// Exit root updates recorded between the batch boundaries.
    pub ger_updates: Vec<GerUpdate>,
}

impl Batch {
    pub fn open(start: &proto::BatchStart) -> Self {
        Self {
            number: start.number,
            chain_id: start.chain_id,
            fork_id: start.fork_id,
            batch_type: BatchType::from_raw(start.r#type),
            coinbase: Address::zero(),
            global_exit_root: H256::zero(),
            l1_info_tree_index: 0,
            local_exit_root: H256::zero(),
            state_root: H256::zero(),
            blocks: Vec::new(),
            ger_updates: Vec::new(),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.transactions.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub number: u64,
    pub delta_timestamp: u32,
    pub l1_info_tree_index: u32,
    pub transactions: Vec<Transaction>,
    /// Whether an `L2BlockEnd` entry was seen for this block.
    pub ended: bool,
}

impl Block {
    pub fn open(header: &proto::L2Block) -> Self {
        Self {
            number: header.number,
            delta_timestamp: header.delta_timestamp,
            l1_info_tree_index: header.l1_infotree_index,
            transactions: Vec::new(),
            ended: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub tx: LegacyTransaction,
    pub effective_gas_price_percentage: u8,
    /// When set, `raw` is copied into batch data instead of re-encoding `tx`.
    pub already_encoded: bool,
    pub raw: Vec<u8>,
}

impl Transaction {
    pub fn new(tx: LegacyTransaction, effective_gas_price_percentage: u8) -> Self {
        Self {
            tx,
            effective_gas_price_percentage,
            already_encoded: false,
            raw: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GerUpdate {
    pub timestamp: u64,
    pub global_exit_root: H256,
    pub coinbase: Address,
    pub state_root: H256,
}

impl From<&proto::UpdateGer> for GerUpdate {
    fn from(update: &proto::UpdateGer) -> Self {
        Self {
            timestamp: update.timestamp,
            global_exit_root: hash_from_bytes(&update.global_exit_root),
            coinbase: address_from_bytes(&update.coinbase),
            state_root: hash_from_bytes(&update.state_root),
        }
    }
}

/// Interprets up to 32 trailing bytes as a hash, left padding short input.
pub fn hash_from_bytes(bytes: &[u8]) -> H256 {
    let mut hash = H256::zero();
    let take = bytes.len().min(32);
    hash.0[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    hash
}

/// Interprets up to 20 trailing bytes as an address, left padding short input.
pub fn address_from_bytes(bytes: &[u8]) -> Address {
    let mut address = Address::zero();
    let take = bytes.len().min(20);
    address.0[20 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    address
}
