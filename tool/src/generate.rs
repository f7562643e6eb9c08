//! Writes the data stream of a chain into an entry log.

use ds_common::FORK_ID_ETROG;
use ethereum_types::H256;
use prost::Message as _;
use stream_decoder::{
    decode, proto, BookMark, DecodeError, DomainMessage, EntryReader, EntryType, EntryWriter,
    StreamError,
};
use tracing::{debug, info};

use crate::{
    cache::ImRootCache,
    chain::{BatchSource, ChainState, SourceBatch, SourceBlock},
};

/// First stream version with `L2BlockEnd` entries.
pub const STREAM_VERSION_L2_BLOCK_END: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    pub chain_id: u64,
    pub version: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("existing stream is unreadable: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to fetch batch {batch}: {source}")]
    Source {
        batch: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to fetch the last batch number: {0}")]
    LastBatch(#[source] anyhow::Error),
}

/// Drops everything after the last `BatchEnd` of `stream` and returns the
/// number of the batch to write next.
pub fn resume_point<W>(stream: &mut W) -> Result<u64, GenerateError>
where
    W: EntryReader + EntryWriter,
{
    for number in (0..stream.total_entries()).rev() {
        let entry = stream.get_entry(number)?;
        if entry.entry_type != EntryType::BatchEnd {
            continue;
        }
        let DomainMessage::BatchEnd(end) = decode(&entry)? else {
            continue;
        };
        if number + 1 < stream.total_entries() {
            info!(
                keep = number + 1,
                total = stream.total_entries(),
                "dropping the partial batch at the end of the stream"
            );
        }
        stream.truncate(number + 1)?;
        return Ok(end.number + 1);
    }

    stream.truncate(0)?;
    Ok(0)
}

/// Appends every batch of `source` that `stream` does not hold yet. Returns
/// the number of batches written.
pub async fn generate<S, W>(
    source: &S,
    stream: &mut W,
    im_roots: &ImRootCache,
    options: GenerateOptions,
) -> Result<u64, GenerateError>
where
    S: BatchSource,
    W: EntryReader + EntryWriter,
{
    let first = resume_point(stream)?;
    let last = source
        .last_batch_number()
        .await
        .map_err(GenerateError::LastBatch)?;
    info!(first, last, "generating data stream");

    let mut written = 0;
    for number in first..=last {
        let batch = source
            .batch(number)
            .await
            .map_err(|source| GenerateError::Source {
                batch: number,
                source,
            })?;
        write_batch(stream, &batch, im_roots, options)?;
        stream.commit()?;
        written += 1;

        debug!(
            batch = number,
            blocks = batch.blocks.len(),
            entries = stream.total_entries(),
            "batch committed"
        );
        if number % 1000 == 0 {
            info!(batch = number, last, "progress");
        }
    }

    info!(written, entries = stream.total_entries(), "data stream generated");
    Ok(written)
}

fn write_batch<W>(
    stream: &mut W,
    batch: &SourceBatch,
    im_roots: &ImRootCache,
    options: GenerateOptions,
) -> Result<(), StreamError>
where
    W: EntryWriter,
{
    let batch_type = if batch.forced {
        proto::BatchType::Forced
    } else {
        proto::BatchType::Regular
    };

    stream.append_bookmark(BookMark::batch(batch.number).encode())?;
    stream.append_entry(
        EntryType::BatchStart,
        proto::BatchStart {
            number: batch.number,
            r#type: batch_type as i32,
            fork_id: batch.fork_id,
            chain_id: options.chain_id,
            debug: None,
        }
        .encode_to_vec(),
    )?;

    if batch.blocks.is_empty() {
        stream.append_entry(
            EntryType::UpdateGer,
            proto::UpdateGer {
                batch_number: batch.number,
                timestamp: batch.timestamp,
                global_exit_root: batch.global_exit_root.as_bytes().to_vec(),
                coinbase: batch.coinbase.as_bytes().to_vec(),
                fork_id: batch.fork_id,
                chain_id: options.chain_id,
                state_root: batch.state_root.as_bytes().to_vec(),
                debug: None,
            }
            .encode_to_vec(),
        )?;
    }

    for block in &batch.blocks {
        write_block(stream, batch, block, im_roots, options)?;
    }

    stream.append_entry(
        EntryType::BatchEnd,
        proto::BatchEnd {
            number: batch.number,
            local_exit_root: batch.local_exit_root.as_bytes().to_vec(),
            state_root: batch.state_root.as_bytes().to_vec(),
            debug: None,
        }
        .encode_to_vec(),
    )?;
    Ok(())
}

fn write_block<W>(
    stream: &mut W,
    batch: &SourceBatch,
    block: &SourceBlock,
    im_roots: &ImRootCache,
    options: GenerateOptions,
) -> Result<(), StreamError>
where
    W: EntryWriter,
{
    let header = &block.header;
    stream.append_bookmark(BookMark::l2_block(header.number).encode())?;
    stream.append_entry(
        EntryType::L2Block,
        proto::L2Block {
            number: header.number,
            batch_number: batch.number,
            timestamp: header.timestamp,
            delta_timestamp: block.delta_timestamp,
            min_timestamp: batch.timestamp,
            l1_blockhash: H256::zero().as_bytes().to_vec(),
            l1_infotree_index: block.l1_info_tree_index,
            hash: header.hash.as_bytes().to_vec(),
            state_root: header.state_root.as_bytes().to_vec(),
            global_exit_root: block.global_exit_root.as_bytes().to_vec(),
            coinbase: header.coinbase.as_bytes().to_vec(),
            block_gas_limit: header.gas_limit,
            block_info_root: block.block_info_root.as_bytes().to_vec(),
            debug: None,
        }
        .encode_to_vec(),
    )?;

    let im_state_root = intermediate_root(batch.fork_id, header.number, header.state_root, im_roots);
    for (index, tx) in (0u64..).zip(&block.transactions) {
        stream.append_entry(
            EntryType::Transaction,
            proto::Transaction {
                l2block_number: header.number,
                index,
                is_valid: true,
                encoded: tx.tx.encode(),
                effective_gas_price_percentage: u32::from(tx.effective_gas_price_percentage),
                im_state_root: im_state_root.as_bytes().to_vec(),
                debug: None,
            }
            .encode_to_vec(),
        )?;
    }

    if options.version >= STREAM_VERSION_L2_BLOCK_END {
        stream.append_entry(
            EntryType::L2BlockEnd,
            proto::L2BlockEnd {
                number: header.number,
            }
            .encode_to_vec(),
        )?;
    }
    Ok(())
}

/// Before etrog, the intermediate state root of a transaction is the root
/// computed by the backfill. From etrog on, it is the state root of the block.
fn intermediate_root(fork_id: u64, block: u64, state_root: H256, im_roots: &ImRootCache) -> H256 {
    if fork_id < FORK_ID_ETROG {
        im_roots.get(block).unwrap_or(state_root)
    } else {
        state_root
    }
}

/// The last block that needs an intermediate state root: the block before the
/// first etrog block, or the head of the chain when the etrog batch is unknown.
pub async fn max_backfill_block<S, C>(
    source: &S,
    chain: &C,
    upgrade_etrog_batch_number: u64,
) -> anyhow::Result<u64>
where
    S: BatchSource,
    C: ChainState,
{
    if upgrade_etrog_batch_number == 0 {
        return chain.last_block_number().await;
    }

    let batch = source.batch(upgrade_etrog_batch_number).await?;
    let first = batch.blocks.first().ok_or_else(|| {
        anyhow::anyhow!("etrog upgrade batch {upgrade_etrog_batch_number} has no blocks")
    })?;
    first.header.number.checked_sub(1).ok_or_else(|| {
        anyhow::anyhow!("etrog upgrade batch {upgrade_etrog_batch_number} starts at genesis")
    })
}
