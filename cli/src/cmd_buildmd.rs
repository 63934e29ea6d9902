//! `tokengraph buildmd`: token master data for every token used in a block
//! range, written to `tokens_<chain>_working.csv`.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokengraph_core::ChainConnector;
use tokengraph_evm::token_info::read_token;
use tokengraph_evm::{BlockFetcher, EvmChain, HttpConnector, TokenRequest};
use tokengraph_masterdata::tokens::{token_usage, working_file_name, write_records};
use tokengraph_masterdata::TokenRecord;

pub async fn run(url: &str, from: u64, to: u64, dir: &Path) -> Result<()> {
    let started = Instant::now();
    let connector = HttpConnector::new(url);
    let chain = EvmChain::identify(&connector)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    let transfers = BlockFetcher::new(None)
        .fetch_serial(&connector, from, to, Duration::ZERO)
        .await?;
    if !transfers.report.is_complete() {
        tracing::warn!(report = %transfers.report, "Some blocks could not be scanned");
    }
    tracing::info!(events = transfers.value.len(), "Total events");

    let usage = token_usage(&transfers.value);
    tracing::info!(tokens = usage.len(), "Unique token addresses");

    let reader = connector.connect().context("failed to create RPC client")?;
    let chunk = usage.len() / 100 + 1;
    let mut records = Vec::with_capacity(usage.len());
    for (i, u) in usage.iter().enumerate() {
        if i % chunk == 0 {
            tracing::info!(progress = i * 100 / usage.len() + 1, "Reading token master data (%)");
        }
        let token = read_token(
            reader.as_ref(),
            &TokenRequest {
                address: u.address,
                kind: u.kind,
            },
        )
        .await;
        records.push(TokenRecord {
            chain_id: chain.network_id.clone(),
            name: token.name,
            symbol: token.symbol,
            decimals: token.decimals,
            address: token.address,
        });
    }

    let path = dir.join(working_file_name(&chain.network_id));
    write_records(&path, &records)?;

    println!("Tokens written:    {}", records.len());
    println!("File created:      {}", path.display());
    println!("Runtime:           {:.3} seconds", started.elapsed().as_secs_f64());
    Ok(())
}
