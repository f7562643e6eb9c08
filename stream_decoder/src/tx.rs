//! Legacy (pre EIP-2718) transactions, in the standard signed RLP encoding
//! and in the zkEVM batch encoding.

use ethereum_types::{Address, U256};
use rlp::{DecoderError, Rlp, RlpStream};

use crate::error::TxError;

/// Length of `r | s | v` trailing an unsigned transaction in batch data.
pub const SIGNATURE_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas: U256,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl LegacyTransaction {
    /// Decodes the standard signed encoding
    /// `rlp([nonce, gasPrice, gas, to, value, data, v, r, s])`.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        let list_len = list_len(bytes)?;
        if list_len != bytes.len() {
            return Err(TxError::TrailingBytes(bytes.len().saturating_sub(list_len)));
        }

        let rlp = Rlp::new(bytes);
        let found = rlp.item_count()?;
        if found != 9 {
            return Err(TxError::FieldCount {
                expected: "9",
                found,
            });
        }

        let mut tx = Self::decode_unsigned(&rlp)?;
        tx.v = rlp.val_at(6)?;
        tx.r = rlp.val_at(7)?;
        tx.s = rlp.val_at(8)?;
        if tx.v != 27 && tx.v != 28 && tx.v < 35 {
            return Err(TxError::InvalidV(tx.v));
        }
        Ok(tx)
    }

    /// Decodes one transaction in the batch encoding from the front of
    /// `bytes`: `rlp(unsigned fields) | r(32) | s(32) | v(1)`. The efficiency
    /// byte that may follow is left to the caller. Returns the transaction
    /// and the number of bytes consumed.
    pub fn decode_batch_encoded(bytes: &[u8]) -> Result<(Self, usize), TxError> {
        let list_len = list_len(bytes)?;
        if bytes.len() < list_len + SIGNATURE_LEN {
            return Err(TxError::TruncatedSignature);
        }

        let rlp = Rlp::new(&bytes[..list_len]);
        let found = rlp.item_count()?;
        let chain_id = match found {
            6 => None,
            9 => Some(rlp.val_at::<u64>(6)?),
            found => {
                return Err(TxError::FieldCount {
                    expected: "6 or 9",
                    found,
                })
            }
        };

        let mut tx = Self::decode_unsigned(&rlp)?;
        let signature = &bytes[list_len..list_len + SIGNATURE_LEN];
        tx.r = U256::from_big_endian(&signature[..32]);
        tx.s = U256::from_big_endian(&signature[32..64]);
        let parity = match signature[64] {
            v @ (27 | 28) => u64::from(v - 27),
            v => return Err(TxError::InvalidV(v.into())),
        };
        tx.v = match chain_id {
            Some(chain_id) => chain_id
                .checked_mul(2)
                .and_then(|v| v.checked_add(35 + parity))
                .ok_or(TxError::ChainIdOverflow(chain_id))?,
            None => 27 + parity,
        };

        Ok((tx, list_len + SIGNATURE_LEN))
    }

    fn decode_unsigned(rlp: &Rlp) -> Result<Self, TxError> {
        let to = rlp.at(3)?;
        Ok(Self {
            nonce: rlp.val_at(0)?,
            gas_price: rlp.val_at(1)?,
            gas: rlp.val_at(2)?,
            to: if to.is_empty() {
                None
            } else {
                Some(to.as_val()?)
            },
            value: rlp.val_at(4)?,
            data: rlp.val_at(5)?,
            ..Default::default()
        })
    }

    /// EIP-155 chain id, `None` for unprotected transactions.
    pub fn chain_id(&self) -> Option<u64> {
        (self.v >= 35).then(|| (self.v - 35) / 2)
    }

    /// Recovery id of the signature.
    pub fn parity(&self) -> u8 {
        match self.chain_id() {
            Some(_) => ((self.v - 35) % 2) as u8,
            None => (self.v.saturating_sub(27) & 1) as u8,
        }
    }

    /// The standard signed encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_unsigned(&mut stream);
        stream.append(&self.v);
        stream.append(&self.r);
        stream.append(&self.s);
        stream.out().to_vec()
    }

    /// The batch encoding: unsigned fields (with the EIP-155 triple when the
    /// transaction is protected), then `r`, `s` and `v = 27 + parity`.
    pub fn encode_batch(&self, out: &mut Vec<u8>) {
        let chain_id = self.chain_id();
        let mut stream = RlpStream::new_list(if chain_id.is_some() { 9 } else { 6 });
        self.append_unsigned(&mut stream);
        if let Some(chain_id) = chain_id {
            stream.append(&chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
        }
        out.extend_from_slice(&stream.out());

        let mut word = [0u8; 32];
        self.r.to_big_endian(&mut word);
        out.extend_from_slice(&word);
        self.s.to_big_endian(&mut word);
        out.extend_from_slice(&word);
        out.push(27 + self.parity());
    }

    fn append_unsigned(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas);
        match &self.to {
            Some(to) => stream.append(to),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data);
    }
}

/// Total length of the RLP list at the front of `bytes`.
fn list_len(bytes: &[u8]) -> Result<usize, TxError> {
    match bytes.first() {
        None => Err(DecoderError::RlpIsTooShort.into()),
        Some(&kind) if kind <= 0x7f => Err(TxError::Typed(kind)),
        Some(&kind) if kind < 0xc0 => Err(DecoderError::RlpExpectedToBeList.into()),
        Some(_) => {
            let info = Rlp::new(bytes).payload_info()?;
            let len = info.header_len + info.value_len;
            if len > bytes.len() {
                return Err(DecoderError::RlpIsTooShort.into());
            }
            Ok(len)
        }
    }
}
