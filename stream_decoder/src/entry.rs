//! The numbered, typed unit of the data stream and its serialized form.

use std::fmt;

use crate::error::WireError;

/// Packet type tag of a data entry.
pub const PACKET_TYPE_DATA: u8 = 2;

/// `packet type (1) + length (4) + entry type (4) + entry number (8)`.
pub const FIXED_ENTRY_SIZE: usize = 17;

const ENTRY_TYPE_BATCH_START: u32 = 1;
const ENTRY_TYPE_L2_BLOCK: u32 = 2;
const ENTRY_TYPE_TRANSACTION: u32 = 3;
const ENTRY_TYPE_BATCH_END: u32 = 4;
const ENTRY_TYPE_UPDATE_GER: u32 = 5;
const ENTRY_TYPE_L2_BLOCK_END: u32 = 6;
const ENTRY_TYPE_BOOKMARK: u32 = 0xb0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    BatchStart,
    L2Block,
    Transaction,
    BatchEnd,
    UpdateGer,
    L2BlockEnd,
    BookMark,
    /// A type this version does not know about. Scans skip these.
    Unknown(u32),
}

impl From<u32> for EntryType {
    fn from(value: u32) -> Self {
        match value {
            ENTRY_TYPE_BATCH_START => Self::BatchStart,
            ENTRY_TYPE_L2_BLOCK => Self::L2Block,
            ENTRY_TYPE_TRANSACTION => Self::Transaction,
            ENTRY_TYPE_BATCH_END => Self::BatchEnd,
            ENTRY_TYPE_UPDATE_GER => Self::UpdateGer,
            ENTRY_TYPE_L2_BLOCK_END => Self::L2BlockEnd,
            ENTRY_TYPE_BOOKMARK => Self::BookMark,
            other => Self::Unknown(other),
        }
    }
}

impl From<EntryType> for u32 {
    fn from(value: EntryType) -> Self {
        match value {
            EntryType::BatchStart => ENTRY_TYPE_BATCH_START,
            EntryType::L2Block => ENTRY_TYPE_L2_BLOCK,
            EntryType::Transaction => ENTRY_TYPE_TRANSACTION,
            EntryType::BatchEnd => ENTRY_TYPE_BATCH_END,
            EntryType::UpdateGer => ENTRY_TYPE_UPDATE_GER,
            EntryType::L2BlockEnd => ENTRY_TYPE_L2_BLOCK_END,
            EntryType::BookMark => ENTRY_TYPE_BOOKMARK,
            EntryType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatchStart => f.write_str("BatchStart"),
            Self::L2Block => f.write_str("L2Block"),
            Self::Transaction => f.write_str("Transaction"),
            Self::BatchEnd => f.write_str("BatchEnd"),
            Self::UpdateGer => f.write_str("UpdateGER"),
            Self::L2BlockEnd => f.write_str("L2BlockEnd"),
            Self::BookMark => f.write_str("BookMark"),
            Self::Unknown(value) => write!(f, "Unknown({value})"),
        }
    }
}

/// One record of the log. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub number: u64,
    pub entry_type: EntryType,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn new(number: u64, entry_type: EntryType, data: Vec<u8>) -> Self {
        Self {
            number,
            entry_type,
            data,
        }
    }

    /// Length of the serialized entry, as stored in its length field.
    pub fn encoded_len(&self) -> usize {
        FIXED_ENTRY_SIZE + self.data.len()
    }

    /// Serializes the entry:
    /// `packet type | length (u32 BE) | type (u32 BE) | number (u64 BE) | data`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(PACKET_TYPE_DATA);
        out.extend_from_slice(&(self.encoded_len() as u32).to_be_bytes());
        out.extend_from_slice(&u32::from(self.entry_type).to_be_bytes());
        out.extend_from_slice(&self.number.to_be_bytes());
        out.extend_from_slice(&self.data);
    }

    /// Parses one entry from the front of `bytes`, returning it together with
    /// the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        if bytes.len() < FIXED_ENTRY_SIZE {
            return Err(WireError::Truncated {
                needed: FIXED_ENTRY_SIZE,
                available: bytes.len(),
            });
        }
        if bytes[0] != PACKET_TYPE_DATA {
            return Err(WireError::PacketType(bytes[0]));
        }
        let length = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        if (length as usize) < FIXED_ENTRY_SIZE {
            return Err(WireError::Length(length));
        }
        let length = length as usize;
        if bytes.len() < length {
            return Err(WireError::Truncated {
                needed: length,
                available: bytes.len(),
            });
        }
        let entry_type = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let mut number = [0u8; 8];
        number.copy_from_slice(&bytes[9..FIXED_ENTRY_SIZE]);

        Ok((
            Self {
                number: u64::from_be_bytes(number),
                entry_type: entry_type.into(),
                data: bytes[FIXED_ENTRY_SIZE..length].to_vec(),
            },
            length,
        ))
    }
}
