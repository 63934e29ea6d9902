//! Pipeline configuration.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::timing::ASSUMED_BLOCK_DURATION_SECS;

/// How fetch phases are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One call at a time, throttled.
    Serial,
    /// One task per unit on a bounded [`WorkPool`](crate::work::WorkPool).
    #[default]
    Concurrent,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Configuration for one pipeline run over a closed block range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First block (inclusive).
    pub from_block: u64,
    /// Last block (inclusive).
    pub to_block: u64,
    /// Only transfers emitted by this token contract.
    pub token_filter: Option<Address>,
    pub execution: ExecutionMode,
    /// Delay before each call in serial mode (milliseconds).
    pub throttle_delay_ms: u64,
    /// Workers fetching block logs in concurrent mode.
    pub log_fetch_concurrency: usize,
    /// Workers fetching block headers in concurrent mode.
    pub block_fetch_concurrency: usize,
    /// Workers reading token metadata in concurrent mode.
    pub token_fetch_concurrency: usize,
    /// Assumed block time used for interpolation (seconds).
    pub block_duration_secs: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            from_block: 0,
            to_block: 0,
            token_filter: None,
            execution: ExecutionMode::Concurrent,
            throttle_delay_ms: 100,
            log_fetch_concurrency: 1000,
            block_fetch_concurrency: 10_000,
            token_fetch_concurrency: 10_000,
            block_duration_secs: ASSUMED_BLOCK_DURATION_SECS,
        }
    }
}

impl PipelineConfig {
    /// Number of blocks in the range.
    pub fn block_count(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.from_block > self.to_block {
            return Err(PipelineError::InvalidRange {
                from: self.from_block,
                to: self.to_block,
            });
        }
        let pools = [
            ("log_fetch_concurrency", self.log_fetch_concurrency),
            ("block_fetch_concurrency", self.block_fetch_concurrency),
            ("token_fetch_concurrency", self.token_fetch_concurrency),
        ];
        if let Some((name, _)) = pools.iter().find(|(_, n)| *n == 0) {
            return Err(PipelineError::Config {
                reason: format!("{name} must be at least 1"),
            });
        }
        if !(self.block_duration_secs.is_finite() && self.block_duration_secs >= 0.0) {
            return Err(PipelineError::Config {
                reason: format!("block_duration_secs must be a non-negative number, got {}", self.block_duration_secs),
            });
        }
        Ok(())
    }
}
