//! TokenGraph CLI: builds GraphML files of ERC20, ERC721 and ERC1155 token
//! movements from EVM-compatible chains.
//!
//! # Commands
//! ```text
//! tokengraph byblock  <url> -f <from> -t <to> [-o <token>] [-n] [-s] [-c] [-v]
//! tokengraph getblock <url>
//! tokengraph buildmd  <url> -f <from> -t <to>
//! tokengraph info
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokengraph_core::{init_tracing, ChainConnector, ChainReader, LogConfig};
use tokengraph_evm::HttpConnector;
use tokengraph_graph::format::block_number_with_underscores;

mod cmd_buildmd;
mod cmd_byblock;

#[derive(Parser)]
#[command(
    name = "tokengraph",
    about = "Build GraphML files of token movements from EVM-compatible chains",
    long_about = "
TokenGraph queries an EVM-compatible chain for the Transfer, TransferSingle and
TransferBatch logs token contracts emit, estimates when each transfer happened,
and writes a GraphML file with addresses and token movements as nodes.

EXAMPLES:
  tokengraph byblock https://rpc.example -f 16670050 -t 16670150
  tokengraph byblock https://rpc.example -f 16670050 -t 16670150 -o 0xdAC17F958D2ee523a2206206994597C13D831ec7
  tokengraph byblock https://rpc.example -f 16670050 -t 16670150 -s -c
  tokengraph getblock https://rpc.example

ENVIRONMENT VARIABLES:
  TOKENGRAPH_RPC_URL    RPC endpoint used when <url> is omitted
",
    version
)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Directory for master-data caches and output files
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build GraphML from the transfers in a range of blocks
    #[command(visible_alias = "byb")]
    Byblock {
        /// JSON-RPC endpoint
        #[arg(env = "TOKENGRAPH_RPC_URL")]
        url: String,
        /// First block (inclusive)
        #[arg(short = 'f', long = "block-from")]
        from: u64,
        /// Last block (inclusive)
        #[arg(short = 't', long = "block-to")]
        to: u64,
        /// Only transfers of this token contract, e.g. 0xdAC17F958D2ee523a2206206994597C13D831ec7 for USDT
        #[arg(short = 'o', long = "only-token-address")]
        token: Option<String>,
        /// Do not read unknown token master data from the chain
        #[arg(short = 'n', long = "no-fetch-master-data")]
        no_fetch: bool,
        /// Fetch serially with a delay before every request
        #[arg(short = 's', long = "force-serial-execution")]
        serial: bool,
        /// Delete the local token cache first
        #[arg(short = 'c', long = "clear-token-cache")]
        clear_cache: bool,
    },

    /// Print the latest block number
    #[command(visible_alias = "glb")]
    Getblock {
        #[arg(env = "TOKENGRAPH_RPC_URL")]
        url: String,
    },

    /// Build a token master-data CSV from the tokens used in a block range
    Buildmd {
        #[arg(env = "TOKENGRAPH_RPC_URL")]
        url: String,
        #[arg(short = 'f', long = "block-from")]
        from: u64,
        #[arg(short = 't', long = "block-to")]
        to: u64,
    },

    /// Show build and capability info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = LogConfig::verbose(cli.verbose).json(cli.log_json);
    init_tracing(&log).context("failed to initialise logging")?;

    match cli.command {
        Commands::Byblock { url, from, to, token, no_fetch, serial, clear_cache } => {
            validate_range(from, to)?;
            let args = cmd_byblock::Args {
                url,
                from,
                to,
                token: parse_token(token.as_deref())?,
                fetch_master_data: !no_fetch,
                serial,
                clear_cache,
                dir: cli.dir,
            };
            cmd_byblock::run(args).await
        }

        Commands::Getblock { url } => cmd_getblock(&url).await,

        Commands::Buildmd { url, from, to } => {
            validate_range(from, to)?;
            cmd_buildmd::run(&url, from, to, &cli.dir).await
        }

        Commands::Info => cmd_info(),
    }
}

// ─── Input validation ────────────────────────────────────────────────────────

fn validate_range(from: u64, to: u64) -> Result<()> {
    if from > to {
        bail!("--block-from ({from}) must be less than or equal to --block-to ({to})");
    }
    Ok(())
}

fn parse_token(token: Option<&str>) -> Result<Option<Address>> {
    let Some(token) = token else {
        return Ok(None);
    };
    let valid = token.len() == 42 && token.starts_with("0x");
    match Address::from_str(token) {
        Ok(address) if valid => Ok(Some(address)),
        _ => bail!(
            "--only-token-address '{token}' is not a valid hex address, \
             use for example 0xdAC17F958D2ee523a2206206994597C13D831ec7 for USDT"
        ),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_getblock(url: &str) -> Result<()> {
    let connector = HttpConnector::new(url);
    let reader = connector.connect().context("failed to create RPC client")?;
    let latest = reader
        .latest_block_number()
        .await
        .with_context(|| format!("failed to read latest block from {url}"))?;
    println!("{}", block_number_with_underscores(latest));
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("TokenGraph v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Capabilities:");
    println!("  ✓ ERC20 / ERC721 Transfer decoding          (alloy-primitives)");
    println!("  ✓ ERC1155 TransferSingle / TransferBatch    (alloy-dyn-abi)");
    println!("  ✓ Serial (throttled) or concurrent fetch    (tokio work pool)");
    println!("  ✓ Per-transaction time estimates            (block interpolation)");
    println!("  ✓ Token metadata backfill                   (eth_call name/symbol/decimals)");
    println!("  ✓ GraphML output                            (petgraph)");
    println!();
    println!("Embedded master data:        Ethereum (1), BSC (56), Avalanche C-Chain (43114)");
    println!("Supported chains:            any EVM-compatible chain with a JSON-RPC endpoint");
    Ok(())
}
