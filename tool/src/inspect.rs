//! Entry selection for the decode commands.

use stream_decoder::{first_entry_after, BookMark, Entry, EntryReader, EntryType, StreamError};

use crate::generate::STREAM_VERSION_L2_BLOCK_END;

/// The `L2Block` entry of block `number`, its transactions and, from stream
/// version 4 on, the entry that closes it.
pub fn l2_block_entries<R>(reader: &R, number: u64, version: u32) -> Result<Vec<Entry>, StreamError>
where
    R: EntryReader + ?Sized,
{
    let block = first_entry_after(reader, BookMark::l2_block(number))?;
    let mut next = block.number + 1;
    let mut entries = vec![block];

    loop {
        let entry = reader.get_entry(next)?;
        if entry.entry_type != EntryType::Transaction {
            if version >= STREAM_VERSION_L2_BLOCK_END && entry.entry_type == EntryType::L2BlockEnd
            {
                entries.push(entry);
            }
            return Ok(entries);
        }
        entries.push(entry);
        next += 1;
    }
}

/// Every entry of batch `number`, from its `BatchStart` through its
/// `BatchEnd`.
pub fn batch_entries<R>(reader: &R, number: u64) -> Result<Vec<Entry>, StreamError>
where
    R: EntryReader + ?Sized,
{
    let start = first_entry_after(reader, BookMark::batch(number))?;
    let mut next = start.number + 1;
    let mut entries = vec![start];

    while entries
        .last()
        .is_some_and(|entry| entry.entry_type != EntryType::BatchEnd)
    {
        entries.push(reader.get_entry(next)?);
        next += 1;
    }
    Ok(entries)
}

/// The concatenated serialized form of `entries`.
pub fn dump(entries: &[Entry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.iter().map(Entry::encoded_len).sum());
    for entry in entries {
        entry.encode_into(&mut out);
    }
    out
}
