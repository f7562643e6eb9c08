//! Human and machine readable rendering of entries.

use std::{collections::BTreeMap, io::Write};

use colored::Colorize as _;
use stream_decoder::{
    address_from_bytes, decode, hash_from_bytes, proto::BatchType, DecodeError, DomainMessage,
    Entry,
};

/// Width the field names of the coloured output are padded to.
const FIELD_WIDTH: usize = 25;

const ENTRY_TYPE: &str = "Entry Type";

pub type Fields = BTreeMap<&'static str, String>;

/// The printable fields of `entry`. Entries of unknown type have none.
pub fn entry_fields(entry: &Entry) -> Result<Fields, DecodeError> {
    let mut fields = Fields::new();

    let debug = match decode(entry)? {
        DomainMessage::BookMark(bookmark) => {
            let kind = bookmark.kind.as_proto();
            fields.insert(ENTRY_TYPE, "BookMark".into());
            fields.insert("Type", format!("{} ({})", kind as i32, kind.name()));
            fields.insert("Value", bookmark.value.to_string());
            None
        }
        DomainMessage::L2Block(block) => {
            fields.insert(ENTRY_TYPE, "L2 Block".into());
            fields.insert("L2 Block Number", block.number.to_string());
            fields.insert("Batch Number", block.batch_number.to_string());
            fields.insert("Timestamp", block.timestamp.to_string());
            fields.insert("Delta Timestamp", block.delta_timestamp.to_string());
            fields.insert("Min. Timestamp", block.min_timestamp.to_string());
            fields.insert("L1 Block Hash", hash(&block.l1_blockhash));
            fields.insert("L1 InfoTree Idx", block.l1_infotree_index.to_string());
            fields.insert("Block Hash", hash(&block.hash));
            fields.insert("State Root", hash(&block.state_root));
            fields.insert("Global Exit Root", hash(&block.global_exit_root));
            fields.insert("Coinbase", format!("{:?}", address_from_bytes(&block.coinbase)));
            fields.insert("Block Gas Limit", block.block_gas_limit.to_string());
            fields.insert("Block Info Root", hash(&block.block_info_root));
            block.debug
        }
        DomainMessage::L2BlockEnd(end) => {
            fields.insert(ENTRY_TYPE, "L2 Block End".into());
            fields.insert("L2 Block Number", end.number.to_string());
            None
        }
        DomainMessage::BatchStart(start) => {
            fields.insert(ENTRY_TYPE, "Batch Start".into());
            fields.insert("Batch Number", start.number.to_string());
            fields.insert("Batch Type", BatchType::from_raw(start.r#type).name().into());
            fields.insert("Fork ID", start.fork_id.to_string());
            fields.insert("Chain ID", start.chain_id.to_string());
            start.debug
        }
        DomainMessage::BatchEnd(end) => {
            fields.insert(ENTRY_TYPE, "Batch End".into());
            fields.insert("Batch Number", end.number.to_string());
            fields.insert("State Root", prefixed_hex(&end.state_root));
            fields.insert("Local Exit Root", prefixed_hex(&end.local_exit_root));
            end.debug
        }
        DomainMessage::Transaction(tx) => {
            let payload = tx.payload;
            fields.insert(ENTRY_TYPE, "L2 Transaction".into());
            fields.insert("L2 Block Number", payload.l2block_number.to_string());
            fields.insert("Index", payload.index.to_string());
            fields.insert("Is Valid", payload.is_valid.to_string());
            fields.insert("Data", prefixed_hex(&payload.encoded));
            fields.insert(
                "Effec. Gas Price",
                payload.effective_gas_price_percentage.to_string(),
            );
            fields.insert("IM State Root", prefixed_hex(&payload.im_state_root));
            fields.insert("Nonce", tx.tx.nonce.to_string());
            payload.debug
        }
        DomainMessage::UpdateGer(update) => {
            fields.insert(ENTRY_TYPE, "Update GER".into());
            fields.insert("Batch Number", update.batch_number.to_string());
            fields.insert("Timestamp", update.timestamp.to_string());
            fields.insert("Global Exit Root", prefixed_hex(&update.global_exit_root));
            fields.insert("Coinbase", format!("{:?}", address_from_bytes(&update.coinbase)));
            fields.insert("Fork ID", update.fork_id.to_string());
            fields.insert("Chain ID", update.chain_id.to_string());
            fields.insert("State Root", prefixed_hex(&update.state_root));
            update.debug
        }
        DomainMessage::Unknown(_) => return Ok(fields),
    };

    fields.insert("Entry Number", entry.number.to_string());
    if let Some(debug) = debug.filter(|debug| !debug.message.is_empty()) {
        fields.insert("Debug", debug.message);
    }
    Ok(fields)
}

fn hash(bytes: &[u8]) -> String {
    format!("{:?}", hash_from_bytes(bytes))
}

fn prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Writes entries to `out`, one JSON object per line or as coloured
/// `key····: value` lines.
#[derive(Debug)]
pub struct Printer<W> {
    out: W,
    json: bool,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn entry(&mut self, entry: &Entry) -> anyhow::Result<()> {
        let fields = entry_fields(entry)?;
        if fields.is_empty() {
            return Ok(());
        }
        if self.json {
            serde_json::to_writer(&mut self.out, &fields)?;
            writeln!(self.out)?;
            return Ok(());
        }

        if let Some(entry_type) = fields.get(ENTRY_TYPE) {
            self.field(ENTRY_TYPE, entry_type.yellow())?;
        }
        for (key, value) in fields.iter().filter(|(key, _)| **key != ENTRY_TYPE) {
            self.field(key, value.white())?;
        }
        Ok(())
    }

    fn field(&mut self, key: &str, value: colored::ColoredString) -> std::io::Result<()> {
        let pad = "·".repeat(FIELD_WIDTH.saturating_sub(key.len()));
        writeln!(self.out, "{}{pad}: {value}", key.green())
    }

    /// Prints the raw batch data of a reconstructed batch.
    pub fn batch_l2_data(&mut self, data: &[u8]) -> std::io::Result<()> {
        writeln!(
            self.out,
            "{}{}",
            "BatchL2Data.....: ".green(),
            prefixed_hex(data).bright_white()
        )
    }

    /// Prints a one line status message.
    pub fn notice(&mut self, message: &str) -> std::io::Result<()> {
        writeln!(self.out, "{}", message.green())
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::{Address, H256};
    use prost::Message as _;
    use stream_decoder::{proto, BookMark, EntryType};

    use super::*;

    fn plain(entry: &Entry) -> String {
        colored::control::set_override(false);
        let mut printer = Printer::new(Vec::new(), false);
        printer.entry(entry).unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn bookmark_fields() {
        let entry = Entry::new(4, EntryType::BookMark, BookMark::l2_block(12).encode());
        assert_eq!(
            plain(&entry),
            "Entry Type···············: BookMark\n\
             Entry Number·············: 4\n\
             Type·····················: 2 (BOOKMARK_TYPE_L2_BLOCK)\n\
             Value····················: 12\n"
        );
    }

    #[test]
    fn batch_end_as_json() {
        let entry = Entry::new(
            9,
            EntryType::BatchEnd,
            proto::BatchEnd {
                number: 3,
                local_exit_root: vec![0x01; 2],
                state_root: vec![0xab; 2],
                debug: Some(proto::DebugInfo {
                    message: "reorg".into(),
                }),
            }
            .encode_to_vec(),
        );

        let mut printer = Printer::new(Vec::new(), true);
        printer.entry(&entry).unwrap();
        let line = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(
            line,
            concat!(
                r#"{"Batch Number":"3","Debug":"reorg","Entry Number":"9","Entry Type":"Batch End","#,
                r#""Local Exit Root":"0x0101","State Root":"0xabab"}"#,
                "\n"
            )
        );
    }

    #[test]
    fn block_fields_are_padded_hashes() {
        let entry = Entry::new(
            1,
            EntryType::L2Block,
            proto::L2Block {
                number: 100,
                batch_number: 7,
                coinbase: Address::repeat_byte(0x11).as_bytes().to_vec(),
                state_root: vec![0x22],
                ..Default::default()
            }
            .encode_to_vec(),
        );
        let fields = entry_fields(&entry).unwrap();
        assert_eq!(fields[ENTRY_TYPE], "L2 Block");
        assert_eq!(fields["L2 Block Number"], "100");
        assert_eq!(fields["State Root"], format!("{:?}", H256::from_low_u64_be(0x22)));
        assert_eq!(
            fields["Coinbase"],
            "0x1111111111111111111111111111111111111111"
        );
        assert_eq!(fields["L1 Block Hash"], format!("{:?}", H256::zero()));
        assert!(!fields.contains_key("Debug"));
    }

    #[test]
    fn unknown_entries_print_nothing() {
        let entry = Entry::new(1, EntryType::Unknown(0x42), vec![1, 2, 3]);
        assert!(entry_fields(&entry).unwrap().is_empty());
        assert_eq!(plain(&entry), "");
    }

    #[test]
    fn undecodable_payloads_are_errors() {
        let entry = Entry::new(1, EntryType::BatchStart, vec![0xff]);
        assert!(entry_fields(&entry).is_err());
    }

    #[test]
    fn batch_data_line() {
        colored::control::set_override(false);
        let mut printer = Printer::new(Vec::new(), false);
        printer.batch_l2_data(&[0x0b, 0, 1]).unwrap();
        assert_eq!(
            String::from_utf8(printer.into_inner()).unwrap(),
            "BatchL2Data.....: 0x0b0001\n"
        );
    }
}
