//! Protobuf payloads of the data stream entries.
//!
//! Field tags follow `datastream.proto` of the zkEVM sequencer, so entries
//! written by a node and entries written by [`crate`] are interchangeable.

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchStart {
    #[prost(uint64, tag = "1")]
    pub number: u64,
    #[prost(enumeration = "BatchType", tag = "2")]
    pub r#type: i32,
    #[prost(uint64, tag = "3")]
    pub fork_id: u64,
    #[prost(uint64, tag = "4")]
    pub chain_id: u64,
    #[prost(message, optional, tag = "5")]
    pub debug: Option<DebugInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchEnd {
    #[prost(uint64, tag = "1")]
    pub number: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub local_exit_root: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub state_root: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub debug: Option<DebugInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct L2Block {
    #[prost(uint64, tag = "1")]
    pub number: u64,
    #[prost(uint64, tag = "2")]
    pub batch_number: u64,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
    #[prost(uint32, tag = "4")]
    pub delta_timestamp: u32,
    #[prost(uint64, tag = "5")]
    pub min_timestamp: u64,
    #[prost(bytes = "vec", tag = "6")]
    pub l1_blockhash: Vec<u8>,
    #[prost(uint32, tag = "7")]
    pub l1_infotree_index: u32,
    #[prost(bytes = "vec", tag = "8")]
    pub hash: Vec<u8>,
    #[prost(bytes = "vec", tag = "9")]
    pub state_root: Vec<u8>,
    #[prost(bytes = "vec", tag = "10")]
    pub global_exit_root: Vec<u8>,
    #[prost(bytes = "vec", tag = "11")]
    pub coinbase: Vec<u8>,
    #[prost(uint64, tag = "12")]
    pub block_gas_limit: u64,
    #[prost(bytes = "vec", tag = "13")]
    pub block_info_root: Vec<u8>,
    #[prost(message, optional, tag = "14")]
    pub debug: Option<DebugInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct L2BlockEnd {
    #[prost(uint64, tag = "1")]
    pub number: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Transaction {
    #[prost(uint64, tag = "1")]
    pub l2block_number: u64,
    #[prost(uint64, tag = "2")]
    pub index: u64,
    #[prost(bool, tag = "3")]
    pub is_valid: bool,
    #[prost(bytes = "vec", tag = "4")]
    pub encoded: Vec<u8>,
    #[prost(uint32, tag = "5")]
    pub effective_gas_price_percentage: u32,
    #[prost(bytes = "vec", tag = "6")]
    pub im_state_root: Vec<u8>,
    #[prost(message, optional, tag = "7")]
    pub debug: Option<DebugInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateGer {
    #[prost(uint64, tag = "1")]
    pub batch_number: u64,
    #[prost(uint64, tag = "2")]
    pub timestamp: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub global_exit_root: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub coinbase: Vec<u8>,
    #[prost(uint64, tag = "5")]
    pub fork_id: u64,
    #[prost(uint64, tag = "6")]
    pub chain_id: u64,
    #[prost(bytes = "vec", tag = "7")]
    pub state_root: Vec<u8>,
    #[prost(message, optional, tag = "8")]
    pub debug: Option<DebugInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BookMark {
    #[prost(enumeration = "BookmarkType", tag = "1")]
    pub r#type: i32,
    #[prost(uint64, tag = "2")]
    pub value: u64,
}

/// Free-form annotation a sequencer may attach to an entry.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DebugInfo {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum BookmarkType {
    Unspecified = 0,
    Batch = 1,
    L2Block = 2,
}

impl BookmarkType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unspecified => "BOOKMARK_TYPE_UNSPECIFIED",
            Self::Batch => "BOOKMARK_TYPE_BATCH",
            Self::L2Block => "BOOKMARK_TYPE_L2_BLOCK",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum BatchType {
    Unspecified = 0,
    Regular = 1,
    Forced = 2,
    Injected = 3,
    Invalid = 4,
}

impl BatchType {
    /// Lenient conversion from the raw protobuf value.
    pub fn from_raw(value: i32) -> Self {
        Self::try_from(value).unwrap_or(Self::Unspecified)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unspecified => "BATCH_TYPE_UNSPECIFIED",
            Self::Regular => "BATCH_TYPE_REGULAR",
            Self::Forced => "BATCH_TYPE_FORCED",
            Self::Injected => "BATCH_TYPE_INJECTED",
            Self::Invalid => "BATCH_TYPE_INVALID",
        }
    }
}
