//! Per-block transfer log fetching.
//!
//! Each block is queried on its own (`from == to`), filtered on the three
//! Transfer-family signatures and optionally on one token contract. Serial
//! and concurrent runs therefore issue exactly the same queries.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;

use tokengraph_core::{
    ChainConnector, ChainError, ChainReader, FetchOutcome, LogQuery, PipelineError, TransferEvent,
};

use crate::decoder::{decode_logs, TRANSFER_TOPICS};
use crate::strategy::{self, UnitFetch};

/// The `eth_getLogs` query used for `block`.
pub fn transfer_query(block: u64, token_filter: Option<Address>) -> LogQuery {
    LogQuery::single_block(block)
        .address(token_filter)
        .topics(TRANSFER_TOPICS)
}

/// Fetch and decode the transfers of one block.
pub async fn fetch_block_transfers(
    reader: &dyn ChainReader,
    block: u64,
    token_filter: Option<Address>,
) -> Result<Vec<TransferEvent>, ChainError> {
    let logs = reader.filter_logs(&transfer_query(block, token_filter)).await?;
    tracing::trace!(block, logs = logs.len(), "logs found");
    Ok(decode_logs(&logs))
}

/// Transfer events of a block range.
pub type BlockTransfers = FetchOutcome<Vec<TransferEvent>, u64>;

/// Fetches transfer events for every block of a range.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockFetcher {
    token_filter: Option<Address>,
}

#[async_trait]
impl UnitFetch for BlockFetcher {
    type Unit = u64;
    type Output = Vec<TransferEvent>;

    fn phase(&self) -> &'static str {
        "logs"
    }

    async fn fetch(&self, reader: &dyn ChainReader, block: &u64) -> Result<Vec<TransferEvent>, ChainError> {
        fetch_block_transfers(reader, *block, self.token_filter).await
    }
}

impl BlockFetcher {
    pub fn new(token_filter: Option<Address>) -> Self {
        Self { token_filter }
    }

    /// Blocks `from..=to` ascending, one at a time, sleeping `throttle` before
    /// each call.
    pub async fn fetch_serial(
        &self,
        connector: &dyn ChainConnector,
        from: u64,
        to: u64,
        throttle: Duration,
    ) -> Result<BlockTransfers, PipelineError> {
        let outcome = strategy::fetch_serial(self, connector, (from..=to).collect(), throttle).await?;
        Ok(flatten(outcome))
    }

    /// Blocks `from..=to` on a pool of at most `max_workers` workers.
    pub async fn fetch_concurrent(
        &self,
        connector: Arc<dyn ChainConnector>,
        from: u64,
        to: u64,
        max_workers: usize,
    ) -> Result<BlockTransfers, PipelineError> {
        let outcome = strategy::fetch_concurrent(Arc::new(*self), connector, (from..=to).collect(), max_workers).await?;
        Ok(flatten(outcome))
    }
}

fn flatten(outcome: FetchOutcome<Vec<(u64, Vec<TransferEvent>)>, u64>) -> BlockTransfers {
    FetchOutcome {
        value: outcome.value.into_iter().flat_map(|(_, events)| events).collect(),
        report: outcome.report,
    }
}
