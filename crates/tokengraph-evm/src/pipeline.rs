//! The transfer pipeline over a closed block range.
//!
//! # Phase 1: LOGS
//! Fetch and decode the transfer logs of every block in `from..=to`.
//!
//! # Phase 2: BLOCKS
//! Resolve timestamp and transaction count of every block that produced at
//! least one transfer.
//!
//! # Phase 3: ENRICH
//! Single-threaded, after both fetch phases are complete: events are put in
//! chain order, then given time estimates, first-seen provenance and
//! ordinals.
//!
//! Fetch phases run serially or on a [`WorkPool`](tokengraph_core::WorkPool)
//! depending on [`ExecutionMode`]. Both are best effort; what was lost is
//! reported in [`PipelineOutput`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokengraph_core::{
    enrich, timing::distinct_blocks, BlockTimeline, ChainConnector, EnrichedTransfer,
    ExecutionMode, FetchReport, PipelineConfig, PipelineError, TransferEvent,
};

use crate::block_times::{BlockTimeResolver, ResolvedBlocks};
use crate::fetcher::{BlockFetcher, BlockTransfers};
use crate::token_info::{TokenInfoReader, TokenReads, TokenRequest};

/// Result of a pipeline run.
#[derive(Debug)]
pub struct PipelineOutput {
    /// In chain order: block, then transaction, then log.
    pub transfers: Vec<EnrichedTransfer>,
    /// Blocks whose logs could not be fetched.
    pub logs: FetchReport<u64>,
    /// Blocks whose header could not be fetched.
    pub blocks: FetchReport<u64>,
    /// Decoded events discarded because their block header was lost.
    pub dropped_events: usize,
    pub elapsed: Duration,
}

impl PipelineOutput {
    /// Returns `true` if no unit of any phase was lost.
    pub fn is_complete(&self) -> bool {
        self.logs.is_complete() && self.blocks.is_complete() && self.dropped_events == 0
    }
}

/// Orchestrates the fetch phases and enrichment for one block range.
pub struct TransferPipeline {
    config: PipelineConfig,
    connector: Arc<dyn ChainConnector>,
}

impl TransferPipeline {
    /// Validates `config` before anything touches the chain.
    pub fn new(config: PipelineConfig, connector: Arc<dyn ChainConnector>) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, connector })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn throttle(&self) -> Duration {
        Duration::from_millis(self.config.throttle_delay_ms)
    }

    /// Phase 1: decoded transfers of every block in range.
    pub async fn fetch_transfers(&self) -> Result<BlockTransfers, PipelineError> {
        let fetcher = BlockFetcher::new(self.config.token_filter);
        let (from, to) = (self.config.from_block, self.config.to_block);
        match self.config.execution {
            ExecutionMode::Serial => {
                fetcher
                    .fetch_serial(self.connector.as_ref(), from, to, self.throttle())
                    .await
            }
            ExecutionMode::Concurrent => {
                fetcher
                    .fetch_concurrent(Arc::clone(&self.connector), from, to, self.config.log_fetch_concurrency)
                    .await
            }
        }
    }

    /// Phase 2: block metadata for every block referenced by `events`.
    pub async fn resolve_blocks(&self, events: &[TransferEvent]) -> Result<ResolvedBlocks, PipelineError> {
        let blocks = distinct_blocks(events);
        match self.config.execution {
            ExecutionMode::Serial => {
                BlockTimeResolver
                    .resolve_serial(self.connector.as_ref(), &blocks, self.throttle())
                    .await
            }
            ExecutionMode::Concurrent => {
                BlockTimeResolver
                    .resolve_concurrent(Arc::clone(&self.connector), &blocks, self.config.block_fetch_concurrency)
                    .await
            }
        }
    }

    /// Token metadata for contracts missing from master data.
    pub async fn read_tokens(&self, requests: Vec<TokenRequest>) -> Result<TokenReads, PipelineError> {
        match self.config.execution {
            ExecutionMode::Serial => {
                TokenInfoReader
                    .read_serial(self.connector.as_ref(), requests, self.throttle())
                    .await
            }
            ExecutionMode::Concurrent => {
                TokenInfoReader
                    .read_concurrent(Arc::clone(&self.connector), requests, self.config.token_fetch_concurrency)
                    .await
            }
        }
    }

    /// Run every phase.
    ///
    /// Lost blocks are reported, not fatal. An invariant violation during
    /// enrichment is returned as an error.
    pub async fn run(&self) -> Result<PipelineOutput, PipelineError> {
        let started = Instant::now();
        tracing::info!(
            from = self.config.from_block,
            to = self.config.to_block,
            blocks = self.config.block_count(),
            mode = %self.config.execution,
            endpoint = self.connector.endpoint(),
            "Starting transfer pipeline"
        );

        let transfers = self.fetch_transfers().await?;
        tracing::info!(events = transfers.value.len(), report = %transfers.report, "Fetched transfer logs");

        let blocks = self.resolve_blocks(&transfers.value).await?;
        tracing::info!(blocks = blocks.value.len(), report = %blocks.report, "Resolved block metadata");

        let total = transfers.value.len();
        let mut events: Vec<TransferEvent> = transfers
            .value
            .into_iter()
            .filter(|e| blocks.value.contains_key(&e.block_number))
            .collect();
        // Stable, so batch entries keep their log order.
        events.sort_by_key(TransferEvent::position);
        let dropped_events = total - events.len();
        if dropped_events > 0 {
            tracing::warn!(dropped_events, "Dropping events whose block metadata could not be fetched");
        }

        let timeline = BlockTimeline::with_block_duration(blocks.value, self.config.block_duration_secs);
        let enriched = enrich(events, &timeline)?;

        let output = PipelineOutput {
            transfers: enriched,
            logs: transfers.report,
            blocks: blocks.report,
            dropped_events,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            events = output.transfers.len(),
            complete = output.is_complete(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Transfer pipeline finished"
        );
        Ok(output)
    }
}
