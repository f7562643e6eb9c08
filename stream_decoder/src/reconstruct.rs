//! Folding a run of entries into a [`Batch`].
//!
//! [`ScanState::step`] is the pure transition function. [`scan_batch`] drives
//! it over an [`EntryReader`], reading strictly forward and never past the
//! `BatchEnd` that closes the batch.

use tracing::{debug, trace};

use crate::{
    batch::{address_from_bytes, hash_from_bytes, Batch, Block, GerUpdate, Transaction},
    bookmark::{locate, BookMark},
    entry::EntryType,
    error::{DecodeError, SequenceError},
    message::{decode, DomainMessage},
    stream::{EntryReader, StreamError},
};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    AwaitingFirstBlock(Batch),
    /// `block` is open and not yet part of `batch.blocks`.
    InBlock { batch: Batch, block: Block },
    Closed(Batch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Continue,
    Stop,
}

impl ScanState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingFirstBlock(_) => "awaiting the first block",
            Self::InBlock { .. } => "in a block",
            Self::Closed(_) => "closed",
        }
    }

    /// Applies entry `number`, decoded as `message`, to the state.
    pub fn step(
        self,
        number: u64,
        message: DomainMessage,
    ) -> Result<(Self, Effect), SequenceError> {
        use DomainMessage as M;

        let unexpected = |state: &Self, entry_type| SequenceError::Unexpected {
            number,
            entry_type,
            state: state.name(),
        };

        let next = match (self, message) {
            (state @ Self::Closed(_), message) => {
                return Err(unexpected(&state, entry_type_of(&message)))
            }

            (state, M::BookMark(_) | M::Unknown(_)) => state,

            (Self::Idle, M::BatchStart(start)) => Self::AwaitingFirstBlock(Batch::open(&start)),
            (state @ Self::Idle, message) => {
                return Err(unexpected(&state, entry_type_of(&message)))
            }

            (state, M::BatchStart(_)) => return Err(unexpected(&state, EntryType::BatchStart)),

            (Self::AwaitingFirstBlock(mut batch), M::L2Block(header)) => {
                apply_block_header(&mut batch, &header);
                Self::InBlock {
                    batch,
                    block: Block::open(&header),
                }
            }
            (Self::InBlock { mut batch, block }, M::L2Block(header)) => {
                if header.number <= block.number {
                    return Err(SequenceError::BlockOrder {
                        previous: block.number,
                        found: header.number,
                    });
                }
                trace!(block = block.number, "sealing block");
                batch.blocks.push(block);
                apply_block_header(&mut batch, &header);
                Self::InBlock {
                    batch,
                    block: Block::open(&header),
                }
            }

            (Self::InBlock { batch, mut block }, M::Transaction(entry)) => {
                block
                    .transactions
                    .push(Transaction::new(entry.tx, entry.effective_gas_price_percentage));
                Self::InBlock { batch, block }
            }
            (state @ Self::AwaitingFirstBlock(_), M::Transaction(_)) => {
                return Err(unexpected(&state, EntryType::Transaction))
            }

            (Self::InBlock { batch, mut block }, M::L2BlockEnd(end)) => {
                if end.number == block.number {
                    block.ended = true;
                } else {
                    debug!(block = block.number, end = end.number, "ignoring L2BlockEnd of another block");
                }
                Self::InBlock { batch, block }
            }
            (state @ Self::AwaitingFirstBlock(_), M::L2BlockEnd(end)) => {
                debug!(end = end.number, "ignoring L2BlockEnd outside of a block");
                state
            }

            (Self::AwaitingFirstBlock(mut batch), M::UpdateGer(update)) => {
                batch.ger_updates.push(GerUpdate::from(&update));
                Self::AwaitingFirstBlock(batch)
            }
            (Self::InBlock { mut batch, block }, M::UpdateGer(update)) => {
                batch.ger_updates.push(GerUpdate::from(&update));
                Self::InBlock { batch, block }
            }

            (Self::AwaitingFirstBlock(mut batch), M::BatchEnd(end)) => {
                close(&mut batch, &end);
                return Ok((Self::Closed(batch), Effect::Stop));
            }
            (Self::InBlock { mut batch, block }, M::BatchEnd(end)) => {
                trace!(block = block.number, "sealing block");
                batch.blocks.push(block);
                close(&mut batch, &end);
                return Ok((Self::Closed(batch), Effect::Stop));
            }
        };

        Ok((next, Effect::Continue))
    }
}

fn entry_type_of(message: &DomainMessage) -> EntryType {
    match message {
        DomainMessage::BookMark(_) => EntryType::BookMark,
        DomainMessage::BatchStart(_) => EntryType::BatchStart,
        DomainMessage::BatchEnd(_) => EntryType::BatchEnd,
        DomainMessage::L2Block(_) => EntryType::L2Block,
        DomainMessage::L2BlockEnd(_) => EntryType::L2BlockEnd,
        DomainMessage::Transaction(_) => EntryType::Transaction,
        DomainMessage::UpdateGer(_) => EntryType::UpdateGer,
        DomainMessage::Unknown(value) => EntryType::Unknown(*value),
    }
}

fn apply_block_header(batch: &mut Batch, header: &crate::proto::L2Block) {
    batch.coinbase = address_from_bytes(&header.coinbase);
    batch.global_exit_root = hash_from_bytes(&header.global_exit_root);
    batch.l1_info_tree_index = header.l1_infotree_index;
}

fn close(batch: &mut Batch, end: &crate::proto::BatchEnd) {
    batch.state_root = hash_from_bytes(&end.state_root);
    batch.local_exit_root = hash_from_bytes(&end.local_exit_root);
}

/// Reads entries from `start` onwards until the batch they describe is
/// closed.
///
/// `start` is a `BatchStart` entry or a bookmark preceding one. Partial
/// results are dropped on any error.
pub fn scan_batch<R>(reader: &R, start: u64) -> Result<Batch, ScanError>
where
    R: EntryReader + ?Sized,
{
    let mut state = ScanState::Idle;
    let mut expected = start;

    loop {
        let entry = match reader.get_entry(expected) {
            Ok(entry) => entry,
            Err(StreamError::EntryNotFound(next)) => {
                return Err(SequenceError::Unterminated { next }.into())
            }
            Err(e) => return Err(e.into()),
        };
        if entry.number != expected {
            return Err(SequenceError::Gap {
                expected,
                found: entry.number,
            }
            .into());
        }

        let message = decode(&entry)?;
        match state.step(entry.number, message)? {
            (ScanState::Closed(batch), Effect::Stop) => {
                debug!(
                    batch = batch.number,
                    blocks = batch.blocks.len(),
                    txs = batch.transaction_count(),
                    "batch reconstructed"
                );
                return Ok(batch);
            }
            (next, _) => state = next,
        }
        expected += 1;
    }
}

/// Locates batch `number` through its bookmark and reconstructs it.
pub fn reconstruct_batch<R>(reader: &R, number: u64) -> Result<Batch, ScanError>
where
    R: EntryReader + ?Sized,
{
    let start = locate(reader, BookMark::batch(number))?;
    let batch = scan_batch(reader, start)?;
    if batch.number != number {
        return Err(SequenceError::WrongBatch {
            expected: number,
            found: batch.number,
        }
        .into());
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use ethereum_types::{Address, H256};
    use mockall::predicate::eq;
    use prost::Message as _;

    use super::*;
    use crate::{
        entry::Entry,
        message::TransactionEntry,
        proto,
        stream::MockEntryReader,
        tx::tests::{sample, SAMPLE_SIGNED},
    };

    fn batch_start(number: u64) -> DomainMessage {
        DomainMessage::BatchStart(proto::BatchStart {
            number,
            fork_id: 7,
            chain_id: 1000,
            r#type: proto::BatchType::Regular as i32,
            ..Default::default()
        })
    }

    fn l2_block(number: u64) -> DomainMessage {
        DomainMessage::L2Block(proto::L2Block {
            number,
            batch_number: 1,
            delta_timestamp: number as u32,
            l1_infotree_index: 0,
            coinbase: Address::repeat_byte(0xcc).as_bytes().to_vec(),
            global_exit_root: H256::repeat_byte(number as u8).as_bytes().to_vec(),
            ..Default::default()
        })
    }

    fn tx() -> DomainMessage {
        DomainMessage::Transaction(TransactionEntry {
            payload: proto::Transaction {
                encoded: SAMPLE_SIGNED.to_vec(),
                effective_gas_price_percentage: 255,
                is_valid: true,
                ..Default::default()
            },
            tx: sample(),
            effective_gas_price_percentage: 255,
        })
    }

    fn batch_end(number: u64) -> DomainMessage {
        DomainMessage::BatchEnd(proto::BatchEnd {
            number,
            state_root: H256::repeat_byte(0x55).as_bytes().to_vec(),
            local_exit_root: H256::repeat_byte(0x66).as_bytes().to_vec(),
            ..Default::default()
        })
    }

    fn fold(messages: Vec<DomainMessage>) -> Result<(ScanState, Effect), SequenceError> {
        let mut state = ScanState::Idle;
        let mut effect = Effect::Continue;
        for (number, message) in (0u64..).zip(messages) {
            (state, effect) = state.step(number, message)?;
        }
        Ok((state, effect))
    }

    #[test]
    fn blocks_are_sealed_one_behind() {
        let mut state = ScanState::Idle;
        let messages = [batch_start(1), l2_block(1), tx(), tx(), l2_block(2), tx()];
        for (number, message) in (0u64..).zip(messages) {
            (state, _) = state.step(number, message).unwrap();
        }

        // block 2 is still open
        let ScanState::InBlock { batch, block } = &state else {
            panic!("expected an open block, got {state:?}");
        };
        assert_eq!(batch.blocks.len(), 1);
        assert_eq!(block.number, 2);

        let (state, effect) = state.step(6, batch_end(1)).unwrap();
        assert_eq!(effect, Effect::Stop);
        let ScanState::Closed(batch) = state else {
            panic!("expected a closed batch");
        };
        assert_eq!(batch.blocks.len(), 2);
        assert_eq!(batch.blocks[0].transactions.len(), 2);
        assert_eq!(batch.blocks[1].transactions.len(), 1);
        assert_eq!(batch.state_root, H256::repeat_byte(0x55));
        assert_eq!(batch.local_exit_root, H256::repeat_byte(0x66));
        assert_eq!(batch.global_exit_root, H256::repeat_byte(2));
        assert_eq!(batch.coinbase, Address::repeat_byte(0xcc));
    }

    #[test]
    fn bookmarks_and_unknown_entries_do_not_change_state() {
        let (state, _) = fold(vec![
            DomainMessage::BookMark(BookMark::batch(1)),
            batch_start(1),
            DomainMessage::Unknown(99),
            l2_block(1),
            DomainMessage::Unknown(100),
            tx(),
            batch_end(1),
        ])
        .unwrap();
        let ScanState::Closed(batch) = state else {
            panic!("expected a closed batch");
        };
        assert_eq!(batch.blocks.len(), 1);
        assert_eq!(batch.transaction_count(), 1);
    }

    #[test]
    fn block_end_and_ger_updates_are_recorded() {
        let (state, _) = fold(vec![
            batch_start(3),
            DomainMessage::UpdateGer(proto::UpdateGer {
                batch_number: 3,
                global_exit_root: vec![1],
                ..Default::default()
            }),
            l2_block(1),
            DomainMessage::L2BlockEnd(proto::L2BlockEnd { number: 1 }),
            batch_end(3),
        ])
        .unwrap();
        let ScanState::Closed(batch) = state else {
            panic!("expected a closed batch");
        };
        assert!(batch.blocks[0].ended);
        assert_eq!(batch.ger_updates.len(), 1);
        assert_eq!(
            batch.ger_updates[0].global_exit_root,
            H256::from_low_u64_be(1)
        );
    }

    #[test]
    fn empty_batch_closes() {
        let (state, effect) = fold(vec![batch_start(1), batch_end(1)]).unwrap();
        assert_eq!(effect, Effect::Stop);
        assert!(matches!(state, ScanState::Closed(batch) if batch.blocks.is_empty()));
    }

    #[test]
    fn order_violations_are_sequence_errors() {
        assert!(matches!(
            fold(vec![tx()]),
            Err(SequenceError::Unexpected {
                number: 0,
                entry_type: EntryType::Transaction,
                ..
            })
        ));
        assert!(matches!(
            fold(vec![batch_start(1), tx()]),
            Err(SequenceError::Unexpected { number: 1, .. })
        ));
        assert!(matches!(
            fold(vec![batch_start(1), l2_block(1), batch_start(2)]),
            Err(SequenceError::Unexpected {
                entry_type: EntryType::BatchStart,
                ..
            })
        ));
        assert!(matches!(
            fold(vec![batch_start(1), l2_block(2), l2_block(2)]),
            Err(SequenceError::BlockOrder {
                previous: 2,
                found: 2
            })
        ));
        assert!(matches!(
            fold(vec![batch_start(1), batch_end(1), l2_block(2)]),
            Err(SequenceError::Unexpected {
                state: "closed",
                ..
            })
        ));
    }

    fn entry(number: u64, entry_type: EntryType, data: Vec<u8>) -> Entry {
        Entry::new(number, entry_type, data)
    }

    #[test]
    fn scan_stops_at_batch_end() {
        let entries = vec![
            entry(
                10,
                EntryType::BatchStart,
                proto::BatchStart {
                    number: 1,
                    fork_id: 7,
                    ..Default::default()
                }
                .encode_to_vec(),
            ),
            entry(
                11,
                EntryType::L2Block,
                proto::L2Block {
                    number: 1,
                    ..Default::default()
                }
                .encode_to_vec(),
            ),
            entry(
                12,
                EntryType::BatchEnd,
                proto::BatchEnd {
                    number: 1,
                    ..Default::default()
                }
                .encode_to_vec(),
            ),
        ];

        let mut reader = MockEntryReader::new();
        for entry in entries {
            reader
                .expect_get_entry()
                .with(eq(entry.number))
                .times(1)
                .returning(move |_| Ok(entry.clone()));
        }
        // entry 13 exists but must never be requested
        reader.expect_get_entry().with(eq(13)).never();

        let batch = scan_batch(&reader, 10).unwrap();
        assert_eq!(batch.number, 1);
        assert_eq!(batch.blocks.len(), 1);
    }

    #[test]
    fn scan_reports_unterminated_batch() {
        let start = proto::BatchStart {
            number: 1,
            ..Default::default()
        }
        .encode_to_vec();

        let mut reader = MockEntryReader::new();
        reader
            .expect_get_entry()
            .with(eq(0))
            .returning(move |n| Ok(Entry::new(n, EntryType::BatchStart, start.clone())));
        reader
            .expect_get_entry()
            .with(eq(1))
            .returning(|n| Err(StreamError::EntryNotFound(n)));

        assert!(matches!(
            scan_batch(&reader, 0),
            Err(ScanError::Sequence(SequenceError::Unterminated { next: 1 }))
        ));
    }

    #[test]
    fn scan_detects_gaps() {
        let mut reader = MockEntryReader::new();
        reader
            .expect_get_entry()
            .with(eq(4))
            .returning(|_| Ok(Entry::new(6, EntryType::BookMark, vec![])));

        assert!(matches!(
            scan_batch(&reader, 4),
            Err(ScanError::Sequence(SequenceError::Gap {
                expected: 4,
                found: 6
            }))
        ));
    }

    #[test]
    fn scan_surfaces_decode_errors() {
        let mut reader = MockEntryReader::new();
        reader
            .expect_get_entry()
            .with(eq(0))
            .returning(|n| Ok(Entry::new(n, EntryType::BatchStart, vec![0xff])));

        assert!(matches!(
            scan_batch(&reader, 0),
            Err(ScanError::Decode(DecodeError::Payload { number: 0, .. }))
        ));
    }
}
