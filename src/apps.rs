use std::error::Error;
use std::path::PathBuf;
use std::thread;

use clap::{Parser, error::ErrorKind};

use crate::blocks::{
    BlockDescriptor, BlockPartitioner, BlockPathIndex, BlockSet, RankBlocks, get_blocks,
    shard_by_rank,
};
use crate::constants::blocks::DEFAULT_BLOCK_EXT;
use crate::distributed::{LocalCollective, ThreadGroup};
use crate::errors::BlockError;
use crate::format::{KeyedBlockFormat, require_keys};
use crate::types::SampleIndex;

#[derive(Debug, Parser)]
#[command(
    name = "block_status",
    disable_help_subcommand = true,
    about = "Report existing and missing block files",
    long_about = "Validate a block directory (removing unreadable blocks), then show how existing and missing blocks are split across data-parallel ranks.",
    after_help = "Blocks are opened as keyed block containers; files that fail to open or lack a --validate-key entry are deleted."
)]
/// CLI for `block_status`.
///
/// Common usage:
/// - Inspect a directory: `--dir /proj/db --n-samples 250000 --block-size 100000`
/// - Preview an 8-rank split: `--world-size 8`
/// - Preview a 10% sample per rank: `--fraction 0.1`
/// - Find the block holding sample 123456: `--lookup 123456`
struct BlockStatusCli {
    #[arg(long, value_name = "DIR", help = "Directory holding the block files")]
    dir: PathBuf,
    #[arg(long = "n-samples", help = "Total number of samples covered by the blocks")]
    n_samples: u64,
    #[arg(
        long = "block-size",
        default_value_t = 100_000,
        value_parser = parse_positive_u64,
        help = "Samples per block file"
    )]
    block_size: u64,
    #[arg(
        long = "world-size",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Number of data-parallel ranks to split blocks across"
    )]
    world_size: usize,
    #[arg(long, help = "Randomly keep this fraction of each rank's blocks")]
    fraction: Option<f64>,
    #[arg(long, default_value = DEFAULT_BLOCK_EXT, help = "Block file extension")]
    ext: String,
    #[arg(
        long = "validate-key",
        value_name = "KEY",
        help = "Entry every block must contain, repeat as needed"
    )]
    validate_keys: Vec<String>,
    #[arg(long = "lookup", value_name = "INDEX", help = "Print the block path holding this sample")]
    lookup: Option<SampleIndex>,
}

/// Run the `block_status` report with CLI-style args (excluding program name).
pub fn run_block_status<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<BlockStatusCli, _>(
        std::iter::once("block_status".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let partition =
        BlockPartitioner::new(&cli.dir, cli.n_samples, cli.block_size)?.with_extension(&cli.ext);
    let blocks = get_blocks(
        &partition,
        KeyedBlockFormat,
        &LocalCollective,
        require_keys(&cli.validate_keys),
    )?;

    println!("Block directory: {}", partition.dir().display());
    println!(
        "Blocks: {} total, {} existing, {} missing",
        blocks.len(),
        blocks.existing.len(),
        blocks.missing.len()
    );

    let shares = simulate_rank_shares(&blocks, cli.world_size, cli.fraction)?;
    for (rank, share) in shares.iter().enumerate() {
        println!(
            "rank {rank}: existing [{}] missing [{}]",
            format_share(&share.existing),
            format_share(&share.missing)
        );
    }

    if let Some(index) = cli.lookup {
        let path_index = BlockPathIndex::from_dir(partition.dir(), cli.block_size, &cli.ext)?;
        match path_index.lookup(index) {
            Ok(path) => println!("sample {index}: {}", path.display()),
            Err(err) => println!("sample {index}: {err} ({path_index})"),
        }
    }
    Ok(())
}

/// Shard `blocks` across `world_size` in-process ranks, optionally sampling each share.
pub fn simulate_rank_shares(
    blocks: &BlockSet,
    world_size: usize,
    fraction: Option<f64>,
) -> Result<Vec<RankBlocks>, BlockError> {
    let members = ThreadGroup::new(world_size)?;
    thread::scope(|scope| {
        let handles: Vec<_> = members
            .into_iter()
            .map(|member| {
                let blocks = blocks.clone();
                scope.spawn(move || {
                    let share = shard_by_rank(blocks, &member)?;
                    match fraction {
                        Some(fraction) => share.sample(fraction),
                        None => Ok(share),
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| BlockError::Configuration("rank thread panicked".into()))?
            })
            .collect()
    })
}

fn format_share(share: &[Option<BlockDescriptor>]) -> String {
    share
        .iter()
        .map(|entry| match entry {
            Some(block) => format!("{}-{}", block.start_idx(), block.end_idx()),
            None => "-".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_positive_u64(raw: &str) -> Result<u64, String> {
    let parsed = raw.parse::<u64>().map_err(|_| {
        format!(
            "Could not parse --block-size value '{}' as a positive integer",
            raw
        )
    })?;
    if parsed == 0 {
        return Err("--block-size must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw.parse::<usize>().map_err(|_| {
        format!(
            "Could not parse --world-size value '{}' as a positive integer",
            raw
        )
    })?;
    if parsed == 0 {
        return Err("--world-size must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
