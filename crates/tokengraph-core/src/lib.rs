//! tokengraph-core: canonical transfer model and the chain-agnostic parts of
//! the transfer pipeline.
//!
//! # Architecture
//!
//! ```text
//! ChainConnector ──► fetch phases (tokengraph-evm, on WorkPool)
//!                          │  Vec<TransferEvent>, BlockMap
//!                          ▼
//!                     BlockTimeline   (per-tx time interpolation)
//!                          │
//!                          ▼
//!                     enrich()        (estimates, first-seen, ordinals)
//!                          │  Vec<EnrichedTransfer>
//!                          ▼
//!                     graph builder / master data
//! ```

pub mod chain;
pub mod chains;
pub mod config;
pub mod enrich;
pub mod error;
pub mod observability;
pub mod report;
pub mod timing;
pub mod types;
pub mod work;

pub use chain::{ChainConnector, ChainReader, LogQuery, RawLog};
pub use chains::chain_name;
pub use config::{ExecutionMode, PipelineConfig};
pub use enrich::enrich;
pub use error::{ChainError, PipelineError, WorkPoolError};
pub use observability::{init_tracing, LogConfig};
pub use report::{FailedUnit, FetchOutcome, FetchReport};
pub use timing::{estimate_tx_timestamp, BlockTimeline, ASSUMED_BLOCK_DURATION_SECS};
pub use types::{
    BlockInfo, BlockMap, ChainPosition, EnrichedTransfer, FirstSeen, TokenAmount, TransferEvent,
    TransferKey, TransferKind, UNKNOWN_TOKEN_NAME, UNKNOWN_TOKEN_SYMBOL,
};
pub use work::{Task, WorkPool};
