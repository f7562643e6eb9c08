//! [`ChainState`] and [`BatchSource`] over the JSON-RPC interface of a zkEVM
//! node.

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;

use alloy::primitives::{Address as RpcAddress, Bytes, B256, U256, U64};
use alloy::rpc::types::{Block, BlockId, BlockTransactionsKind};
use alloy::{providers::Provider, transports::Transport};
use anyhow::{ensure, Context as _};
use ds_common::FORK_ID_ETROG;
use ethereum_types::{Address, H256};
use serde::Deserialize;
use stream_decoder::decode_batch_l2_data;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::trace;

use crate::chain::{assemble_blocks, BatchSource, ChainState, L2BlockHeader, SourceBatch};

const CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(size) => size,
    None => panic!("cache size must be non-zero"),
};
const MAX_NUMBER_OF_PARALLEL_REQUESTS: usize = 128;
const NO_PARAMS: [(); 0] = [];

/// Wrapper around an alloy provider that caches block headers and bounds the
/// number of requests in flight, so that many backfill workers can share it.
pub struct ZkEvmProvider<ProviderT, TransportT> {
    provider: Arc<ProviderT>,
    semaphore: Arc<Semaphore>,
    headers_by_number: Arc<Mutex<lru::LruCache<u64, L2BlockHeader>>>,
    numbers_by_hash: Arc<Mutex<lru::LruCache<B256, u64>>>,
    _phantom: PhantomData<TransportT>,
}

/// `zkevm_getBatchByNumber` without full transactions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBatch {
    number: U64,
    coinbase: RpcAddress,
    state_root: B256,
    global_exit_root: B256,
    #[serde(default)]
    local_exit_root: B256,
    timestamp: U64,
    #[serde(default)]
    blocks: Vec<B256>,
    #[serde(default)]
    batch_l2_data: Bytes,
    #[serde(default)]
    forced_batch_number: Option<U64>,
}

impl<ProviderT, TransportT> ZkEvmProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub fn new(provider: ProviderT) -> Self {
        Self {
            provider: provider.into(),
            semaphore: Arc::new(Semaphore::new(MAX_NUMBER_OF_PARALLEL_REQUESTS)),
            headers_by_number: Arc::new(Mutex::new(lru::LruCache::new(CACHE_SIZE))),
            numbers_by_hash: Arc::new(Mutex::new(lru::LruCache::new(CACHE_SIZE))),
            _phantom: PhantomData,
        }
    }

    async fn permit(&self) -> anyhow::Result<SemaphorePermit<'_>> {
        Ok(self.semaphore.acquire().await?)
    }

    async fn cached(&self, id: BlockId) -> Option<L2BlockHeader> {
        let number = match id {
            BlockId::Hash(hash) => self
                .numbers_by_hash
                .lock()
                .await
                .get(&hash.block_hash)
                .copied()?,
            BlockId::Number(alloy::rpc::types::BlockNumberOrTag::Number(number)) => number,
            _ => return None,
        };
        self.headers_by_number.lock().await.get(&number).cloned()
    }

    /// Retrieves a block header by number or hash, caching it.
    pub async fn header(&self, id: BlockId) -> anyhow::Result<L2BlockHeader> {
        if let Some(header) = self.cached(id).await {
            return Ok(header);
        }

        let block = {
            let _permit = self.permit().await?;
            self.provider
                .get_block(id, BlockTransactionsKind::Hashes)
                .await?
                .with_context(|| format!("block {id:?} does not exist"))?
        };
        let header = header_from(&block);

        self.headers_by_number
            .lock()
            .await
            .put(header.number, header.clone());
        self.numbers_by_hash
            .lock()
            .await
            .put(block.header.hash, header.number);

        Ok(header)
    }
}

fn header_from(block: &Block) -> L2BlockHeader {
    let header = &block.header;
    L2BlockHeader {
        number: header.number,
        hash: H256(header.hash.0),
        state_root: H256(header.state_root.0),
        timestamp: header.timestamp,
        gas_limit: u64::try_from(header.gas_limit).unwrap_or(u64::MAX),
        coinbase: Address::from_slice(header.miner.as_slice()),
    }
}

impl<ProviderT, TransportT> ChainState for ZkEvmProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    async fn last_block_number(&self) -> anyhow::Result<u64> {
        let _permit = self.permit().await?;
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_by_number(&self, number: u64) -> anyhow::Result<L2BlockHeader> {
        self.header(BlockId::number(number)).await
    }

    /// Queried by block number, which the node resolves to `_state_root`.
    async fn storage_at(
        &self,
        address: Address,
        slot: H256,
        block: u64,
        _state_root: H256,
    ) -> anyhow::Result<H256> {
        let _permit = self.permit().await?;
        let value = self
            .provider
            .raw_request::<_, U256>(
                "eth_getStorageAt".into(),
                (
                    RpcAddress::from_slice(address.as_bytes()),
                    B256::from(slot.0),
                    format!("{block:#x}"),
                ),
            )
            .await
            .with_context(|| format!("eth_getStorageAt failed at block {block}"))?;
        trace!(block, %value, "storage read");
        Ok(H256(value.to_be_bytes::<32>()))
    }
}

impl<ProviderT, TransportT> BatchSource for ZkEvmProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    async fn last_batch_number(&self) -> anyhow::Result<u64> {
        let _permit = self.permit().await?;
        let number = self
            .provider
            .raw_request::<_, U64>("zkevm_batchNumber".into(), NO_PARAMS)
            .await?;
        Ok(number.to::<u64>())
    }

    async fn batch(&self, number: u64) -> anyhow::Result<SourceBatch> {
        let (batch, fork_id) = {
            let _permit = self.permit().await?;
            let batch = self
                .provider
                .raw_request::<_, RpcBatch>(
                    "zkevm_getBatchByNumber".into(),
                    (U64::from(number), false),
                )
                .await
                .with_context(|| format!("zkevm_getBatchByNumber failed for batch {number}"))?;
            let fork_id = self
                .provider
                .raw_request::<_, U64>(
                    "zkevm_getForkIdByBatchNumber".into(),
                    [U64::from(number)],
                )
                .await?
                .to::<u64>();
            (batch, fork_id)
        };

        let raw_blocks = decode_batch_l2_data(&batch.batch_l2_data, fork_id)
            .with_context(|| format!("undecodable batch data in batch {number}"))?;
        // the genesis batch carries blocks but no batch data
        ensure!(
            raw_blocks.is_empty() || raw_blocks.len() == batch.blocks.len(),
            "batch {number} lists {} blocks but its data holds {}",
            batch.blocks.len(),
            raw_blocks.len()
        );

        let mut headers = Vec::with_capacity(batch.blocks.len());
        for hash in &batch.blocks {
            headers.push(self.header(BlockId::hash(*hash)).await?);
        }
        // pre-etrog deltas are measured from the block before the batch
        let parent_timestamp = match headers.first() {
            Some(first) if fork_id < FORK_ID_ETROG && first.number > 0 => {
                self.header(BlockId::number(first.number - 1))
                    .await?
                    .timestamp
            }
            Some(first) => first.timestamp,
            None => 0,
        };

        let global_exit_root = H256(batch.global_exit_root.0);
        let blocks = assemble_blocks(
            fork_id,
            headers,
            raw_blocks,
            parent_timestamp,
            global_exit_root,
        );

        Ok(SourceBatch {
            number: batch.number.to::<u64>(),
            fork_id,
            forced: batch.forced_batch_number.is_some(),
            coinbase: Address::from_slice(batch.coinbase.as_slice()),
            global_exit_root,
            local_exit_root: H256(batch.local_exit_root.0),
            state_root: H256(batch.state_root.0),
            timestamp: batch.timestamp.to::<u64>(),
            blocks,
        })
    }
}
