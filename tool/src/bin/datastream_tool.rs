use std::{io::Write, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Command, Output};
use ds_tool::{
    backfill::backfill,
    cache::ImRootCache,
    config::Config,
    env::load_dotenv,
    generate::{generate, max_backfill_block, GenerateOptions},
    inspect::{batch_entries, dump, l2_block_entries},
    printer::Printer,
    provider::ZkEvmProvider,
    retry::build_http_retry_provider,
    stream_file::StreamFile,
};
use stream_decoder::{encode_batch, reconstruct_batch, EntryReader as _, EntryWriter as _};
use tracing::{error, info};

#[path = "datastream_tool/cli.rs"]
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = load_dotenv();
    let args = cli::Cli::parse();
    let config = Config::load(&args.config)?;
    ds_tool::tracing::init(&config.log.level);
    if let Some(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    run(args.command, &config).await.inspect_err(|e| error!("{e:#}"))
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let stdout = std::io::stdout().lock();

    match command {
        Command::Generate => run_generate(config, Printer::new(stdout, false)).await,
        Command::DecodeEntry { entry, output } => {
            let stream = open(config)?;
            printer(stdout, output).entry(&stream.get_entry(entry)?)
        }
        Command::DecodeL2block { l2_block, output } => {
            let stream = open(config)?;
            let mut printer = printer(stdout, output);
            for entry in l2_block_entries(&stream, l2_block, config.stream.version)? {
                printer.entry(&entry)?;
            }
            Ok(())
        }
        Command::DecodeBatch {
            batch,
            dump,
            output,
        } => decode_batch(config, batch, dump, printer(stdout, output)),
        Command::DumpBatch { batch, output } => {
            decode_batch(config, batch, true, printer(stdout, output))
        }
        Command::DecodeBatchL2Data { batch } => {
            let stream = open(config)?;
            let reconstructed = reconstruct_batch(&stream, batch)?;
            let data = encode_batch(&reconstructed)?;
            Printer::new(stdout, false).batch_l2_data(&data)?;
            Ok(())
        }
        Command::Truncate { entry } => {
            let mut stream = StreamFile::open_writable(&config.stream.file).with_context(|| {
                format!("failed to open {}", config.stream.file.display())
            })?;
            stream.truncate(entry)?;
            Printer::new(stdout, false).notice("File truncated")?;
            Ok(())
        }
    }
}

fn open(config: &Config) -> Result<StreamFile> {
    StreamFile::open(&config.stream.file)
        .with_context(|| format!("failed to open {}", config.stream.file.display()))
}

fn printer<W: Write>(out: W, output: Output) -> Printer<W> {
    Printer::new(out, output.json)
}

fn decode_batch<W: Write>(
    config: &Config,
    batch: u64,
    write_dump: bool,
    mut printer: Printer<W>,
) -> Result<()> {
    let stream = open(config)?;
    let entries = batch_entries(&stream, batch)?;
    for entry in &entries {
        printer.entry(entry)?;
    }

    if write_dump {
        let bytes = dump(&entries);
        let path = format!("batch_{batch}.bin");
        std::fs::write(&path, &bytes).with_context(|| format!("failed to write {path}"))?;
        info!(path, "batch data: {}", hex::encode(&bytes));
    }
    Ok(())
}

async fn run_generate<W: Write>(config: &Config, mut printer: Printer<W>) -> Result<()> {
    let rpc = config.validate_generate()?;
    let provider = Arc::new(ZkEvmProvider::new(build_http_retry_provider(
        rpc.url.clone(),
        rpc.backoff,
        rpc.max_retries,
    )));

    let cache_file = config.merkle_tree.cache_file.as_deref();
    let mut im_roots = match cache_file {
        Some(path) => ImRootCache::load(path)?,
        None => ImRootCache::new(),
    };

    let threads = config.merkle_tree.max_threads;
    if threads > 0 {
        let max_block = max_backfill_block(
            provider.as_ref(),
            provider.as_ref(),
            config.stream.upgrade_etrog_batch_number,
        )
        .await
        .context("failed to find the last pre-etrog block")?;

        let result = backfill(provider.clone(), max_block, threads, im_roots).await?;
        for outcome in &result.partitions {
            info!(
                start = outcome.range.start(),
                end = outcome.range.end(),
                computed = outcome.computed,
                stopped_at = outcome.stopped_at,
                "partition done"
            );
        }
        im_roots = result.roots;
        if let Some(path) = cache_file {
            im_roots.save(path)?;
        }
    }

    let mut stream = StreamFile::create(&config.stream.file)
        .with_context(|| format!("failed to open {}", config.stream.file.display()))?;
    generate(
        provider.as_ref(),
        &mut stream,
        &im_roots,
        GenerateOptions {
            chain_id: config.stream.chain_id,
            version: config.stream.version,
        },
    )
    .await?;

    printer.notice("Process finished")?;
    Ok(())
}
