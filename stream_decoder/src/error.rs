use crate::entry::EntryType;

/// The serialized form of an entry could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("entry truncated: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("unexpected packet type {0:#04x}")]
    PacketType(u8),
    #[error("entry length {0} is shorter than the fixed entry header")]
    Length(u32),
}

/// A legacy transaction could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    #[error("malformed rlp: {0}")]
    Rlp(#[from] rlp::DecoderError),
    #[error("typed transaction envelopes (type {0:#04x}) are not supported")]
    Typed(u8),
    #[error("expected a list of {expected} fields, found {found}")]
    FieldCount { expected: &'static str, found: usize },
    #[error("{0} trailing bytes after the transaction")]
    TrailingBytes(usize),
    #[error("invalid signature v value {0}")]
    InvalidV(u64),
    #[error("chain id {0} does not fit an EIP-155 v value")]
    ChainIdOverflow(u64),
    #[error("transaction signature truncated")]
    TruncatedSignature,
}

/// An entry payload does not match the schema implied by its entry type.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("entry {number}: malformed {entry_type} payload: {source}")]
    Payload {
        number: u64,
        entry_type: EntryType,
        #[source]
        source: prost::DecodeError,
    },
    #[error("entry {number}: invalid bookmark type {value}")]
    BookmarkType { number: u64, value: i32 },
    #[error("entry {number}: undecodable transaction: {source}")]
    Transaction {
        number: u64,
        #[source]
        source: TxError,
    },
    #[error("entry {number}: effective gas price percentage {value} does not fit in a byte")]
    GasPricePercentage { number: u64, value: u32 },
}

/// The order of the entries contradicts the batch structure.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("unexpected {entry_type} entry {number} while {state}")]
    Unexpected {
        number: u64,
        entry_type: EntryType,
        state: &'static str,
    },
    #[error("block {found} does not follow block {previous}")]
    BlockOrder { previous: u64, found: u64 },
    #[error("expected entry {expected}, log returned entry {found}")]
    Gap { expected: u64, found: u64 },
    #[error("log ends at entry {next} before the batch was closed")]
    Unterminated { next: u64 },
    #[error("bookmark for batch {expected} leads to batch {found}")]
    WrongBatch { expected: u64, found: u64 },
}

/// The raw batch data could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("batch {0} has no blocks")]
    EmptyBatch(u64),
}

/// Raw batch data (`batchL2Data`) could not be split into blocks and
/// transactions.
#[derive(Debug, thiserror::Error)]
pub enum BatchDataError {
    #[error("batch data truncated at offset {0}")]
    Truncated(usize),
    #[error("transaction at offset {0} precedes the first block header")]
    TxBeforeBlock(usize),
    #[error("transaction at offset {offset}: {source}")]
    Tx {
        offset: usize,
        #[source]
        source: TxError,
    },
}
