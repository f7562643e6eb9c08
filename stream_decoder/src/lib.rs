//! A zkEVM node publishes its chain as a *data stream*: an append-only log of
//! numbered, typed [`Entry`]s (batch boundaries, blocks, transactions, exit
//! root updates) interleaved with [`BookMark`]s that let a reader jump to a
//! given batch or block.
//!
//! This library turns that flat log back into the hierarchy it encodes.
//!
//! 1. [`locate`] resolves a bookmark to an entry number through an
//!    [`EntryReader`].
//! 2. [`decode`] turns each [`Entry`] into a [`DomainMessage`], selecting the
//!    protobuf schema of [`proto`] by entry type alone.
//! 3. [`ScanState`] folds the messages into a [`Batch`] of [`Block`]s of
//!    [`Transaction`]s. [`scan_batch`] and [`reconstruct_batch`] drive it.
//! 4. [`encode_batch`] serializes the result into the `batchL2Data` that was
//!    posted to L1, which is how a reconstruction is checked.
//!
//! # Non-Goals
//! - Storage and transport of the log. [`MemoryStream`] exists for tests and
//!   tooling; real logs implement [`EntryReader`] and [`EntryWriter`].
//! - Typed transaction envelopes. Only legacy transactions are understood.

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]

mod batch;
mod bookmark;
mod encoding;
mod entry;
mod error;
mod message;
pub mod proto;
mod reconstruct;
mod stream;
mod tx;

pub use batch::{address_from_bytes, hash_from_bytes, Batch, Block, GerUpdate, Transaction};
pub use bookmark::{first_entry_after, locate, BookMark, BookmarkKind};
pub use encoding::{
    decode_batch_l2_data, encode_batch, encode_raw_blocks, RawBlock, CHANGE_L2_BLOCK_MARKER,
    MAX_EFFICIENCY_PERCENTAGE,
};
pub use entry::{Entry, EntryType, FIXED_ENTRY_SIZE, PACKET_TYPE_DATA};
pub use error::{BatchDataError, DecodeError, EncodeError, SequenceError, TxError, WireError};
pub use message::{decode, DomainMessage, TransactionEntry};
pub use reconstruct::{reconstruct_batch, scan_batch, Effect, ScanError, ScanState};
pub use stream::{BookmarkIndex, EntryReader, EntryWriter, MemoryStream, StreamError};
pub use tx::{LegacyTransaction, SIGNATURE_LEN};
