//! Block header resolution for time estimation.
//!
//! Only blocks that actually produced transfers are resolved. A header that
//! cannot be fetched is left out of the resulting [`BlockMap`]; callers decide
//! what to do with events that reference it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tokengraph_core::{
    BlockInfo, BlockMap, ChainConnector, ChainError, ChainReader, FetchOutcome, PipelineError,
};

use crate::strategy::{self, UnitFetch};

/// Block metadata plus the blocks whose header fetch failed.
pub type ResolvedBlocks = FetchOutcome<BlockMap, u64>;

/// Fetches block timestamps and transaction counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTimeResolver;

#[async_trait]
impl UnitFetch for BlockTimeResolver {
    type Unit = u64;
    type Output = BlockInfo;

    fn phase(&self) -> &'static str {
        "blocks"
    }

    async fn fetch(&self, reader: &dyn ChainReader, block: &u64) -> Result<BlockInfo, ChainError> {
        reader.block_by_number(*block).await
    }
}

impl BlockTimeResolver {
    pub async fn resolve_serial(
        &self,
        connector: &dyn ChainConnector,
        blocks: &BTreeSet<u64>,
        throttle: Duration,
    ) -> Result<ResolvedBlocks, PipelineError> {
        let outcome =
            strategy::fetch_serial(self, connector, blocks.iter().copied().collect(), throttle).await?;
        Ok(into_map(outcome))
    }

    pub async fn resolve_concurrent(
        &self,
        connector: Arc<dyn ChainConnector>,
        blocks: &BTreeSet<u64>,
        max_workers: usize,
    ) -> Result<ResolvedBlocks, PipelineError> {
        let outcome = strategy::fetch_concurrent(
            Arc::new(*self),
            connector,
            blocks.iter().copied().collect(),
            max_workers,
        )
        .await?;
        Ok(into_map(outcome))
    }
}

fn into_map(outcome: FetchOutcome<Vec<(u64, BlockInfo)>, u64>) -> ResolvedBlocks {
    FetchOutcome {
        value: outcome.value.into_iter().collect(),
        report: outcome.report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;

    #[tokio::test]
    async fn resolves_only_requested_blocks() {
        let chain = MockChain::new()
            .with_block(10, 1_000, 5)
            .with_block(11, 1_012, 0)
            .with_block(12, 1_024, 7);
        let wanted: BTreeSet<u64> = [10, 12].into_iter().collect();

        let out = BlockTimeResolver.resolve_concurrent(Arc::new(chain), &wanted, 100).await.unwrap();
        assert_eq!(out.value.len(), 2);
        assert_eq!(out.value[&12], BlockInfo { number: 12, timestamp: 1_024, tx_count: 7 });
        assert!(!out.value.contains_key(&11));
    }

    #[tokio::test]
    async fn failed_header_is_dropped_from_map() {
        let chain = MockChain::new()
            .with_block(1, 100, 1)
            .with_block(2, 112, 1)
            .fail_block_header(2);
        let wanted: BTreeSet<u64> = [1, 2].into_iter().collect();

        let out = BlockTimeResolver.resolve_serial(&chain, &wanted, Duration::ZERO).await.unwrap();
        assert!(out.value.contains_key(&1));
        assert!(!out.value.contains_key(&2));
        assert_eq!(out.report.failed_count(), 1);
    }
}
