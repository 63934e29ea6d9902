//! tokengraph-evm: transfer log decoding and fetch orchestration for EVM
//! chains.
//!
//! # Architecture
//!
//! ```text
//! PipelineBuilder → TransferPipeline
//!                      ├── BlockFetcher       (eth_getLogs per block → decoder)
//!                      ├── BlockTimeResolver  (eth_getBlockByNumber per block)
//!                      ├── TokenInfoReader    (name/symbol/decimals via eth_call)
//!                      └── strategy           (serial + throttle, or WorkPool)
//! ```

pub mod block_times;
pub mod bootstrap;
pub mod builder;
pub mod decoder;
pub mod fetcher;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pipeline;
pub mod rpc;
pub mod strategy;
pub mod token_info;

pub use block_times::BlockTimeResolver;
pub use bootstrap::EvmChain;
pub use builder::PipelineBuilder;
pub use decoder::{decode_log, decode_logs, TRANSFER_BATCH_SIG, TRANSFER_SIG, TRANSFER_SINGLE_SIG};
pub use fetcher::BlockFetcher;
pub use pipeline::{PipelineOutput, TransferPipeline};
pub use rpc::{HttpChainReader, HttpConnector};
pub use token_info::{OnChainToken, TokenInfoReader, TokenRequest};
