//! Per-transaction time estimation.
//!
//! A transaction's time is interpolated linearly through its block:
//!
//! ```text
//! estimate = block.timestamp + (tx_index / tx_count) × block_duration
//! ```
//!
//! `block_duration` is a fixed assumption (12 s by default), not the real gap
//! between consecutive blocks. On chains with a different cadence the
//! estimates are systematically off; they are only meant to order
//! transactions inside a block and to give a plausible wall-clock time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::types::{BlockInfo, BlockMap, TransferEvent};

/// Assumed average block time, in seconds.
pub const ASSUMED_BLOCK_DURATION_SECS: f64 = 12.0;

/// Estimate the time of transaction `tx_index` inside `block`, rounded to the
/// millisecond.
///
/// A block with zero transactions cannot contain the transaction being
/// estimated, so it is reported as an invariant violation.
pub fn estimate_tx_timestamp(
    block: &BlockInfo,
    tx_index: u64,
    block_duration_secs: f64,
) -> Result<DateTime<Utc>, PipelineError> {
    if block.tx_count == 0 {
        return Err(PipelineError::EmptyBlock { block_number: block.number });
    }
    let proportion = tx_index as f64 / block.tx_count as f64;
    let offset_ms = (proportion * block_duration_secs * 1000.0).round() as i64;
    block
        .timestamp
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add(offset_ms))
        .and_then(DateTime::from_timestamp_millis)
        .ok_or(PipelineError::TimestampOutOfRange { block_number: block.number })
}

/// Resolved block metadata plus the block-duration assumption.
#[derive(Debug, Clone)]
pub struct BlockTimeline {
    blocks: BlockMap,
    block_duration_secs: f64,
}

impl BlockTimeline {
    pub fn new(blocks: BlockMap) -> Self {
        Self::with_block_duration(blocks, ASSUMED_BLOCK_DURATION_SECS)
    }

    pub fn with_block_duration(blocks: BlockMap, block_duration_secs: f64) -> Self {
        Self { blocks, block_duration_secs }
    }

    pub fn block(&self, number: u64) -> Result<&BlockInfo, PipelineError> {
        self.blocks
            .get(&number)
            .ok_or(PipelineError::MissingBlock { block_number: number })
    }

    pub fn contains(&self, number: u64) -> bool {
        self.blocks.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block timestamp as a UTC time.
    pub fn block_timestamp(&self, number: u64) -> Result<DateTime<Utc>, PipelineError> {
        let block = self.block(number)?;
        DateTime::from_timestamp(block.timestamp, 0)
            .ok_or(PipelineError::TimestampOutOfRange { block_number: number })
    }

    /// Estimated time of `event`'s transaction.
    pub fn estimate(&self, event: &TransferEvent) -> Result<DateTime<Utc>, PipelineError> {
        let block = self.block(event.block_number)?;
        estimate_tx_timestamp(block, event.tx_index, self.block_duration_secs)
    }
}

/// Distinct block numbers referenced by `events`, ascending.
pub fn distinct_blocks<'a>(events: impl IntoIterator<Item = &'a TransferEvent>) -> BTreeSet<u64> {
    events.into_iter().map(|e| e.block_number).collect()
}
