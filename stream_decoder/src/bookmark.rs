//! Bookmarks: semantic keys (block or batch number) that resolve to entry
//! numbers in the log.

use prost::Message as _;

use crate::{
    entry::{Entry, EntryType},
    error::DecodeError,
    proto::{self, BookmarkType},
    stream::{EntryReader, StreamError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookmarkKind {
    Batch,
    L2Block,
}

impl BookmarkKind {
    pub fn as_proto(self) -> BookmarkType {
        match self {
            Self::Batch => BookmarkType::Batch,
            Self::L2Block => BookmarkType::L2Block,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BookMark {
    pub kind: BookmarkKind,
    pub value: u64,
}

impl BookMark {
    pub fn batch(number: u64) -> Self {
        Self {
            kind: BookmarkKind::Batch,
            value: number,
        }
    }

    pub fn l2_block(number: u64) -> Self {
        Self {
            kind: BookmarkKind::L2Block,
            value: number,
        }
    }

    /// The serialized form, which doubles as the lookup key of the log.
    pub fn encode(&self) -> Vec<u8> {
        proto::BookMark {
            r#type: self.kind.as_proto() as i32,
            value: self.value,
        }
        .encode_to_vec()
    }

    /// Decodes the payload of a [`EntryType::BookMark`] entry.
    pub fn decode(number: u64, data: &[u8]) -> Result<Self, DecodeError> {
        let raw = proto::BookMark::decode(data).map_err(|source| DecodeError::Payload {
            number,
            entry_type: EntryType::BookMark,
            source,
        })?;
        let kind = match BookmarkType::try_from(raw.r#type) {
            Ok(BookmarkType::Batch) => BookmarkKind::Batch,
            Ok(BookmarkType::L2Block) => BookmarkKind::L2Block,
            _ => {
                return Err(DecodeError::BookmarkType {
                    number,
                    value: raw.r#type,
                })
            }
        };
        Ok(Self {
            kind,
            value: raw.value,
        })
    }
}

/// Resolves a bookmark to the number of the first entry following it.
///
/// For a batch bookmark this is the `BatchStart` entry, for a block bookmark
/// the `L2Block` entry.
pub fn locate<R>(reader: &R, bookmark: BookMark) -> Result<u64, StreamError>
where
    R: EntryReader + ?Sized,
{
    first_entry_after(reader, bookmark).map(|entry| entry.number)
}

/// Like [`locate`], returning the entry itself.
pub fn first_entry_after<R>(reader: &R, bookmark: BookMark) -> Result<Entry, StreamError>
where
    R: EntryReader + ?Sized,
{
    reader.first_entry_after_bookmark(&bookmark.encode())
}
