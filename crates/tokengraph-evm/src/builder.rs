//! Fluent builder API for creating transfer pipelines.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokengraph_evm::{HttpConnector, PipelineBuilder};
//!
//! # async fn run() -> Result<(), tokengraph_core::PipelineError> {
//! let pipeline = PipelineBuilder::new()
//!     .from_block(16_345_450)
//!     .to_block(16_345_454)
//!     .log_fetch_concurrency(200)
//!     .build(Arc::new(HttpConnector::new("http://localhost:8545")))?;
//! let _output = pipeline.run().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use alloy_primitives::Address;
use tokengraph_core::{ChainConnector, ExecutionMode, PipelineConfig, PipelineError};

use crate::pipeline::TransferPipeline;

/// Fluent builder for `PipelineConfig` and `TransferPipeline`.
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Set the first block (inclusive).
    pub fn from_block(mut self, block: u64) -> Self {
        self.config.from_block = block;
        self
    }

    /// Set the last block (inclusive).
    pub fn to_block(mut self, block: u64) -> Self {
        self.config.to_block = block;
        self
    }

    /// Only follow transfers of this token contract.
    pub fn token(mut self, token: Option<Address>) -> Self {
        self.config.token_filter = token;
        self
    }

    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.config.execution = mode;
        self
    }

    /// Shorthand for `execution(ExecutionMode::Serial)` when `serial` is true.
    pub fn serial(self, serial: bool) -> Self {
        if serial {
            self.execution(ExecutionMode::Serial)
        } else {
            self.execution(ExecutionMode::Concurrent)
        }
    }

    /// Delay before each call in serial mode.
    pub fn throttle_delay_ms(mut self, ms: u64) -> Self {
        self.config.throttle_delay_ms = ms;
        self
    }

    pub fn log_fetch_concurrency(mut self, n: usize) -> Self {
        self.config.log_fetch_concurrency = n;
        self
    }

    pub fn block_fetch_concurrency(mut self, n: usize) -> Self {
        self.config.block_fetch_concurrency = n;
        self
    }

    pub fn token_fetch_concurrency(mut self, n: usize) -> Self {
        self.config.token_fetch_concurrency = n;
        self
    }

    /// Assumed block time used to interpolate transaction times.
    pub fn block_duration_secs(mut self, secs: f64) -> Self {
        self.config.block_duration_secs = secs;
        self
    }

    /// Build the `PipelineConfig`.
    pub fn build_config(self) -> PipelineConfig {
        self.config
    }

    /// Validate and build the pipeline.
    pub fn build(self, connector: Arc<dyn ChainConnector>) -> Result<TransferPipeline, PipelineError> {
        TransferPipeline::new(self.config, connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;

    #[test]
    fn builder_defaults() {
        let cfg = PipelineBuilder::new().build_config();
        assert_eq!(cfg.execution, ExecutionMode::Concurrent);
        assert_eq!(cfg.throttle_delay_ms, 100);
        assert_eq!(cfg.token_fetch_concurrency, 10_000);
    }

    #[test]
    fn builder_custom() {
        let token = Address::repeat_byte(5);
        let cfg = PipelineBuilder::new()
            .from_block(10)
            .to_block(20)
            .token(Some(token))
            .serial(true)
            .throttle_delay_ms(250)
            .block_duration_secs(2.0)
            .build_config();

        assert_eq!(cfg.from_block, 10);
        assert_eq!(cfg.to_block, 20);
        assert_eq!(cfg.token_filter, Some(token));
        assert_eq!(cfg.execution, ExecutionMode::Serial);
        assert_eq!(cfg.throttle_delay_ms, 250);
        assert_eq!(cfg.block_duration_secs, 2.0);
    }

    #[test]
    fn build_validates() {
        let result = PipelineBuilder::new()
            .from_block(2)
            .to_block(1)
            .build(Arc::new(MockChain::new()));
        assert!(matches!(result, Err(PipelineError::InvalidRange { .. })));

        let result = PipelineBuilder::new()
            .log_fetch_concurrency(0)
            .build(Arc::new(MockChain::new()));
        assert!(matches!(result, Err(PipelineError::Config { .. })));
    }
}
