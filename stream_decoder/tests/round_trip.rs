use ethereum_types::{Address, H256, U256};
use prost::Message as _;
use stream_decoder::{
    decode_batch_l2_data, encode_batch, encode_raw_blocks, proto, reconstruct_batch, BookMark,
    EntryType, EntryWriter as _, LegacyTransaction, MemoryStream, RawBlock, ScanError,
    SequenceError, StreamError, Transaction,
};

fn transfer(nonce: u64, v: u64) -> LegacyTransaction {
    LegacyTransaction {
        nonce: nonce.into(),
        gas_price: 1_000_000_000u64.into(),
        gas: 21_000.into(),
        to: Some(Address::repeat_byte(0x42)),
        value: U256::exp10(18),
        data: vec![],
        v,
        r: U256::from(0xabcdef),
        s: U256::from(0x123456),
    }
}

fn canonical_batch_data() -> Vec<u8> {
    encode_raw_blocks(&[
        RawBlock {
            delta_timestamp: 3,
            l1_info_tree_index: 7,
            transactions: vec![
                Transaction::new(transfer(0, 2035), 255),
                Transaction::new(transfer(1, 2036), 100),
            ],
        },
        RawBlock {
            delta_timestamp: 2,
            l1_info_tree_index: 0,
            transactions: vec![Transaction::new(transfer(2, 27), 255)],
        },
    ])
}

/// Writes one batch the way a sequencer lays it out.
fn write_batch(stream: &mut MemoryStream, number: u64, blocks: &[RawBlock], first_block: u64) {
    stream
        .append_bookmark(BookMark::batch(number).encode())
        .unwrap();
    stream
        .append_entry(
            EntryType::BatchStart,
            proto::BatchStart {
                number,
                r#type: proto::BatchType::Regular as i32,
                fork_id: 7,
                chain_id: 1000,
                debug: None,
            }
            .encode_to_vec(),
        )
        .unwrap();

    for (block_number, block) in (first_block..).zip(blocks) {
        stream
            .append_bookmark(BookMark::l2_block(block_number).encode())
            .unwrap();
        stream
            .append_entry(
                EntryType::L2Block,
                proto::L2Block {
                    number: block_number,
                    batch_number: number,
                    delta_timestamp: block.delta_timestamp,
                    l1_infotree_index: block.l1_info_tree_index,
                    coinbase: Address::repeat_byte(0xc0).as_bytes().to_vec(),
                    ..Default::default()
                }
                .encode_to_vec(),
            )
            .unwrap();
        // something a newer sequencer might emit
        stream
            .append_entry(EntryType::Unknown(0x20), vec![0xde, 0xad, 0xbe, 0xef])
            .unwrap();
        for (index, tx) in block.transactions.iter().enumerate() {
            stream
                .append_entry(
                    EntryType::Transaction,
                    proto::Transaction {
                        l2block_number: block_number,
                        index: index as u64,
                        is_valid: true,
                        encoded: tx.tx.encode(),
                        effective_gas_price_percentage: tx.effective_gas_price_percentage.into(),
                        im_state_root: H256::repeat_byte(1).as_bytes().to_vec(),
                        debug: None,
                    }
                    .encode_to_vec(),
                )
                .unwrap();
        }
        stream
            .append_entry(
                EntryType::L2BlockEnd,
                proto::L2BlockEnd {
                    number: block_number,
                }
                .encode_to_vec(),
            )
            .unwrap();
    }

    stream
        .append_entry(
            EntryType::BatchEnd,
            proto::BatchEnd {
                number,
                local_exit_root: H256::repeat_byte(0xee).as_bytes().to_vec(),
                state_root: H256::repeat_byte(0x5e).as_bytes().to_vec(),
                debug: None,
            }
            .encode_to_vec(),
        )
        .unwrap();
    stream.commit().unwrap();
}

#[test]
fn reconstructed_batch_reencodes_to_canonical_bytes() {
    let canonical = canonical_batch_data();
    let blocks = decode_batch_l2_data(&canonical, 7).unwrap();

    let mut stream = MemoryStream::new();
    write_batch(&mut stream, 1, &blocks, 1);
    write_batch(&mut stream, 2, &blocks[..1], 3);

    let batch = reconstruct_batch(&stream, 1).unwrap();
    assert_eq!(batch.number, 1);
    assert_eq!(batch.fork_id, 7);
    assert_eq!(batch.chain_id, 1000);
    assert_eq!(batch.blocks.len(), 2);
    assert!(batch.blocks.iter().all(|block| block.ended));
    assert_eq!(batch.coinbase, Address::repeat_byte(0xc0));
    assert_eq!(batch.state_root, H256::repeat_byte(0x5e));
    assert_eq!(encode_batch(&batch).unwrap(), canonical);

    let second = reconstruct_batch(&stream, 2).unwrap();
    assert_eq!(second.blocks.len(), 1);
    assert_eq!(second.blocks[0].number, 3);
}

#[test]
fn missing_batch_is_not_found() {
    let mut stream = MemoryStream::new();
    write_batch(&mut stream, 1, &decode_batch_l2_data(&canonical_batch_data(), 7).unwrap(), 1);

    assert!(matches!(
        reconstruct_batch(&stream, 8),
        Err(ScanError::Stream(StreamError::BookmarkNotFound(_)))
    ));
}

#[test]
fn batch_cut_short_is_unterminated() {
    let blocks = decode_batch_l2_data(&canonical_batch_data(), 7).unwrap();
    let mut stream = MemoryStream::new();
    write_batch(&mut stream, 1, &blocks, 1);

    // drop the BatchEnd
    let last = stream.entries().len() as u64 - 1;
    stream.truncate(last).unwrap();

    assert!(matches!(
        reconstruct_batch(&stream, 1),
        Err(ScanError::Sequence(SequenceError::Unterminated { next })) if next == last
    ));
}
