//! Decoding of entries into typed domain messages.

use prost::Message as _;

use crate::{
    bookmark::BookMark,
    entry::{Entry, EntryType},
    error::DecodeError,
    proto,
    tx::LegacyTransaction,
};

#[derive(Debug, Clone, PartialEq)]
pub enum DomainMessage {
    BookMark(BookMark),
    BatchStart(proto::BatchStart),
    BatchEnd(proto::BatchEnd),
    L2Block(proto::L2Block),
    L2BlockEnd(proto::L2BlockEnd),
    Transaction(TransactionEntry),
    UpdateGer(proto::UpdateGer),
    /// An entry type this version does not know how to decode.
    Unknown(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionEntry {
    pub payload: proto::Transaction,
    pub tx: LegacyTransaction,
    pub effective_gas_price_percentage: u8,
}

/// Decodes the payload of `entry` with the schema selected by its type.
pub fn decode(entry: &Entry) -> Result<DomainMessage, DecodeError> {
    let number = entry.number;
    let data = entry.data.as_slice();
    Ok(match entry.entry_type {
        EntryType::BookMark => DomainMessage::BookMark(BookMark::decode(number, data)?),
        EntryType::BatchStart => DomainMessage::BatchStart(payload(entry)?),
        EntryType::BatchEnd => DomainMessage::BatchEnd(payload(entry)?),
        EntryType::L2Block => DomainMessage::L2Block(payload(entry)?),
        EntryType::L2BlockEnd => DomainMessage::L2BlockEnd(payload(entry)?),
        EntryType::UpdateGer => DomainMessage::UpdateGer(payload(entry)?),
        EntryType::Transaction => {
            let payload: proto::Transaction = payload(entry)?;
            let tx = LegacyTransaction::decode(&payload.encoded)
                .map_err(|source| DecodeError::Transaction { number, source })?;
            let effective_gas_price_percentage =
                u8::try_from(payload.effective_gas_price_percentage).map_err(|_| {
                    DecodeError::GasPricePercentage {
                        number,
                        value: payload.effective_gas_price_percentage,
                    }
                })?;
            DomainMessage::Transaction(TransactionEntry {
                payload,
                tx,
                effective_gas_price_percentage,
            })
        }
        EntryType::Unknown(value) => DomainMessage::Unknown(value),
    })
}

fn payload<M: prost::Message + Default>(entry: &Entry) -> Result<M, DecodeError> {
    M::decode(entry.data.as_slice()).map_err(|source| DecodeError::Payload {
        number: entry.number,
        entry_type: entry.entry_type,
        source,
    })
}
