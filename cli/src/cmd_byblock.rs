//! `tokengraph byblock`: transfers of a block range to a GraphML file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use tokengraph_core::ChainConnector;
use tokengraph_evm::{EvmChain, HttpConnector, PipelineBuilder, PipelineOutput, TokenRequest, TransferPipeline};
use tokengraph_graph::{write_graphml_file, GraphBuilder};
use tokengraph_masterdata::{tokens, AddressBook, TokenBook, TokenRecord};

pub struct Args {
    pub url: String,
    pub from: u64,
    pub to: u64,
    pub token: Option<Address>,
    pub fetch_master_data: bool,
    pub serial: bool,
    pub clear_cache: bool,
    pub dir: PathBuf,
}

pub async fn run(args: Args) -> Result<()> {
    let started = Instant::now();

    let config = PipelineBuilder::new()
        .from_block(args.from)
        .to_block(args.to)
        .token(args.token)
        .serial(args.serial)
        .build_config();

    // Validates the range before anything touches the network.
    let connector: Arc<dyn ChainConnector> = Arc::new(HttpConnector::new(&args.url));
    let pipeline = TransferPipeline::new(config, Arc::clone(&connector))?;

    let chain = EvmChain::identify(connector.as_ref())
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;

    let output = pipeline.run().await.context("transfer pipeline failed")?;

    if args.clear_cache {
        tokens::clear_cache(&chain.network_id, &args.dir)?;
    }
    let mut token_book = TokenBook::load(chain.network_id.as_str(), &args.dir);
    let address_book = AddressBook::load(chain.network_id.as_str(), &args.dir);
    tracing::debug!(tokens = token_book.len(), addresses = address_book.len(), "Master data loaded");

    if args.fetch_master_data {
        backfill_tokens(&pipeline, &output, &mut token_book).await?;
    }

    let graph = GraphBuilder::new(&token_book, &address_book)
        .build(&output.transfers)
        .context("failed to build transfer graph")?;
    let created = graph.creation_result();
    created.log_summary();

    let path = write_graphml_file(&graph, &chain.name, &args.dir)?;

    println!("Chain:             {} ({})", chain.name, chain.network_id);
    println!("Blocks scanned:    {}", pipeline.config().block_count());
    println!("Transfer events:   {}", created.events);
    println!("GraphML nodes:     {}", created.nodes);
    println!("GraphML edges:     {}", created.edges);
    println!("Failed log blocks: {}", output.logs.failed_count());
    println!("Failed headers:    {}", output.blocks.failed_count());
    if output.dropped_events > 0 {
        println!("Dropped events:    {}", output.dropped_events);
    }
    println!("Runtime:           {:.3} seconds", started.elapsed().as_secs_f64());
    println!("File created:      {}", path.display());
    Ok(())
}

/// Read unknown emitters from the chain, merge them and rewrite the cache.
async fn backfill_tokens(pipeline: &TransferPipeline, output: &PipelineOutput, book: &mut TokenBook) -> Result<()> {
    let unknown = book.unknown_tokens(output.transfers.iter().map(|t| &t.transfer));
    tracing::info!(tokens = unknown.len(), "Tokens not seen before");
    if unknown.is_empty() {
        return Ok(());
    }

    let requests = unknown
        .iter()
        .map(|u| TokenRequest {
            address: u.address,
            kind: u.kind,
        })
        .collect();
    let reads = pipeline.read_tokens(requests).await?;
    tracing::info!(report = %reads.report, "Token master data read from chain");

    let chain_id = book.chain_id().to_string();
    book.merge(reads.value.into_iter().map(|t| TokenRecord {
        chain_id: chain_id.clone(),
        name: t.name,
        symbol: t.symbol,
        decimals: t.decimals,
        address: t.address,
    }));
    book.write_cache()?;
    Ok(())
}
