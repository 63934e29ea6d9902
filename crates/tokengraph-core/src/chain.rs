//! Chain capability consumed by the pipeline.
//!
//! The pipeline never talks to a node directly. It is handed a
//! [`ChainConnector`] and asks it for a fresh [`ChainReader`] whenever a task
//! needs one, so concurrent tasks never share a transport.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::types::BlockInfo;

/// A log entry as delivered by the chain, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub tx_hash: B256,
    pub tx_index: u64,
    pub log_index: u64,
}

impl RawLog {
    /// Signature hash of the event, if the log has any topics.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// Parameters of an `eth_getLogs` call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogQuery {
    /// Only logs emitted by this contract (`None` = any contract).
    pub address: Option<Address>,
    pub from_block: u64,
    pub to_block: u64,
    /// Accepted topic[0] values (`OR`-ed).
    pub topic0: Vec<B256>,
}

impl LogQuery {
    /// A query covering exactly one block.
    pub fn single_block(block: u64) -> Self {
        Self {
            from_block: block,
            to_block: block,
            ..Default::default()
        }
    }

    /// Restrict to one emitting contract.
    pub fn address(mut self, address: Option<Address>) -> Self {
        self.address = address;
        self
    }

    /// Add accepted topic[0] values.
    pub fn topics(mut self, topics: impl IntoIterator<Item = B256>) -> Self {
        self.topic0.extend(topics);
        self
    }

    /// Returns `true` if `log` falls inside this query.
    pub fn matches(&self, log: &RawLog) -> bool {
        let in_range = log.block_number >= self.from_block && log.block_number <= self.to_block;
        let address_ok = self.address.map_or(true, |a| a == log.address);
        let topic_ok = self.topic0.is_empty()
            || log.topic0().map_or(false, |t| self.topic0.contains(t));
        in_range && address_ok && topic_ok
    }
}

/// Read access to an EVM chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `net_version`.
    async fn network_id(&self) -> Result<String, ChainError>;

    /// `eth_blockNumber`.
    async fn latest_block_number(&self) -> Result<u64, ChainError>;

    /// Header data of one block.
    async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainError>;

    /// `eth_getLogs`.
    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;
}

/// Opens connections to a chain endpoint.
pub trait ChainConnector: Send + Sync + 'static {
    /// A new, unshared reader.
    fn connect(&self) -> Result<Arc<dyn ChainReader>, ChainError>;

    /// Endpoint description for logs.
    fn endpoint(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(block: u64, address: Address, topic: B256) -> RawLog {
        RawLog {
            address,
            topics: vec![topic],
            data: Bytes::new(),
            block_number: block,
            tx_hash: B256::ZERO,
            tx_index: 0,
            log_index: 0,
        }
    }

    #[test]
    fn single_block_query_matches_only_that_block() {
        let q = LogQuery::single_block(5).topics([B256::repeat_byte(1)]);
        assert!(q.matches(&log(5, Address::ZERO, B256::repeat_byte(1))));
        assert!(!q.matches(&log(6, Address::ZERO, B256::repeat_byte(1))));
        assert!(!q.matches(&log(5, Address::ZERO, B256::repeat_byte(2))));
    }

    #[test]
    fn address_filter() {
        let token = Address::repeat_byte(0x42);
        let q = LogQuery::single_block(1).address(Some(token));
        assert!(q.matches(&log(1, token, B256::ZERO)));
        assert!(!q.matches(&log(1, Address::ZERO, B256::ZERO)));
        assert!(LogQuery::single_block(1).matches(&log(1, Address::ZERO, B256::ZERO)));
    }
}
