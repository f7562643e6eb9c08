//! Raw batch data (`batchL2Data`): the byte form a batch takes on L1.
//!
//! From the etrog fork on, batch data is a sequence of blocks, each a
//! `0x0b | deltaTimestamp (u32 BE) | l1InfoTreeIndex (u32 BE)` header followed
//! by its transactions, every transaction followed by its effective gas price
//! percentage. Earlier forks carry a flat transaction list, one transaction
//! per block, with the percentage byte present from the dragonfruit fork on.

use ds_common::{FORK_ID_DRAGONFRUIT, FORK_ID_ETROG};

use crate::{
    batch::{Batch, Block, Transaction},
    error::{BatchDataError, EncodeError},
    tx::LegacyTransaction,
};

/// Marker opening a block in etrog batch data.
pub const CHANGE_L2_BLOCK_MARKER: u8 = 0x0b;

const BLOCK_HEADER_LEN: usize = 9;

/// Percentage assumed when the batch data carries none.
pub const MAX_EFFICIENCY_PERCENTAGE: u8 = 255;

/// One block as carried by raw batch data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBlock {
    pub delta_timestamp: u32,
    pub l1_info_tree_index: u32,
    pub transactions: Vec<Transaction>,
}

impl From<&Block> for RawBlock {
    fn from(block: &Block) -> Self {
        Self {
            delta_timestamp: block.delta_timestamp,
            l1_info_tree_index: block.l1_info_tree_index,
            transactions: block.transactions.clone(),
        }
    }
}

/// Encodes a closed batch into etrog batch data.
pub fn encode_batch(batch: &Batch) -> Result<Vec<u8>, EncodeError> {
    if batch.blocks.is_empty() {
        return Err(EncodeError::EmptyBatch(batch.number));
    }
    let mut out = Vec::new();
    for block in &batch.blocks {
        encode_block(
            &mut out,
            block.delta_timestamp,
            block.l1_info_tree_index,
            &block.transactions,
        );
    }
    Ok(out)
}

/// Encodes blocks taken from raw batch data.
pub fn encode_raw_blocks(blocks: &[RawBlock]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        encode_block(
            &mut out,
            block.delta_timestamp,
            block.l1_info_tree_index,
            &block.transactions,
        );
    }
    out
}

fn encode_block(
    out: &mut Vec<u8>,
    delta_timestamp: u32,
    l1_info_tree_index: u32,
    transactions: &[Transaction],
) {
    out.push(CHANGE_L2_BLOCK_MARKER);
    out.extend_from_slice(&delta_timestamp.to_be_bytes());
    out.extend_from_slice(&l1_info_tree_index.to_be_bytes());
    for tx in transactions {
        if tx.already_encoded {
            out.extend_from_slice(&tx.raw);
        } else {
            tx.tx.encode_batch(out);
        }
        out.push(tx.effective_gas_price_percentage);
    }
}

/// Splits raw batch data of fork `fork_id` into blocks.
pub fn decode_batch_l2_data(data: &[u8], fork_id: u64) -> Result<Vec<RawBlock>, BatchDataError> {
    if fork_id >= FORK_ID_ETROG {
        decode_blocks(data)
    } else {
        decode_flat(data, fork_id >= FORK_ID_DRAGONFRUIT)
    }
}

fn decode_blocks(data: &[u8]) -> Result<Vec<RawBlock>, BatchDataError> {
    let mut blocks: Vec<RawBlock> = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        if data[offset] == CHANGE_L2_BLOCK_MARKER {
            let header = data
                .get(offset + 1..offset + BLOCK_HEADER_LEN)
                .ok_or(BatchDataError::Truncated(offset))?;
            blocks.push(RawBlock {
                delta_timestamp: u32::from_be_bytes([header[0], header[1], header[2], header[3]]),
                l1_info_tree_index: u32::from_be_bytes([
                    header[4], header[5], header[6], header[7],
                ]),
                transactions: Vec::new(),
            });
            offset += BLOCK_HEADER_LEN;
            continue;
        }

        let block = blocks
            .last_mut()
            .ok_or(BatchDataError::TxBeforeBlock(offset))?;
        let (tx, used) = decode_tx(data, offset)?;
        offset += used;
        let percentage = *data.get(offset).ok_or(BatchDataError::Truncated(offset))?;
        offset += 1;
        block.transactions.push(Transaction::new(tx, percentage));
    }

    Ok(blocks)
}

fn decode_flat(data: &[u8], with_percentage: bool) -> Result<Vec<RawBlock>, BatchDataError> {
    let mut blocks = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (tx, used) = decode_tx(data, offset)?;
        offset += used;
        let percentage = if with_percentage {
            let percentage = *data.get(offset).ok_or(BatchDataError::Truncated(offset))?;
            offset += 1;
            percentage
        } else {
            MAX_EFFICIENCY_PERCENTAGE
        };
        blocks.push(RawBlock {
            transactions: vec![Transaction::new(tx, percentage)],
            ..Default::default()
        });
    }

    Ok(blocks)
}

fn decode_tx(data: &[u8], offset: usize) -> Result<(LegacyTransaction, usize), BatchDataError> {
    LegacyTransaction::decode_batch_encoded(&data[offset..])
        .map_err(|source| BatchDataError::Tx { offset, source })
}
