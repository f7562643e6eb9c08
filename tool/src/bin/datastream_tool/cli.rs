use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Generate, inspect and truncate zkEVM data stream files.
#[derive(Parser)]
#[command(version = ds_tool::version(), propagate_version = true)]
pub(crate) struct Cli {
    /// The TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        env = "DS_TOOL_CONFIG",
        default_value = "config.toml",
        value_hint = ValueHint::FilePath
    )]
    pub(crate) config: PathBuf,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Args, Clone, Copy)]
pub(crate) struct Output {
    /// Print entries as JSON objects, one per line.
    #[arg(short, long)]
    pub(crate) json: bool,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Writes the stream file from the chain served by the configured RPC
    /// node, computing pre-etrog intermediate state roots first.
    Generate,
    /// Prints one entry.
    DecodeEntry {
        /// The entry number.
        #[arg(short, long)]
        entry: u64,
        #[command(flatten)]
        output: Output,
    },
    /// Prints an L2 block with its transactions.
    DecodeL2block {
        /// The L2 block number.
        #[arg(short = 'b', long = "l2block")]
        l2_block: u64,
        #[command(flatten)]
        output: Output,
    },
    /// Prints every entry of a batch.
    DecodeBatch {
        /// The batch number.
        #[arg(long = "bn")]
        batch: u64,
        /// Also write the entries to `batch_<number>.bin`.
        #[arg(short, long)]
        dump: bool,
        #[command(flatten)]
        output: Output,
    },
    /// Prints every entry of a batch and writes them to
    /// `batch_<number>.bin`.
    DumpBatch {
        /// The batch number.
        #[arg(long = "bn")]
        batch: u64,
        #[command(flatten)]
        output: Output,
    },
    /// Reconstructs a batch and prints its raw batch data.
    #[command(name = "decode-batchl2data")]
    DecodeBatchL2Data {
        /// The batch number.
        #[arg(long = "bn")]
        batch: u64,
    },
    /// Removes every entry from the given one on.
    Truncate {
        /// The first entry to remove.
        #[arg(short, long)]
        entry: u64,
    },
}
