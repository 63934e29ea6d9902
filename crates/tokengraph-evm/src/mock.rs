//! In-memory chain for tests.
//!
//! `MockChain` is both a [`ChainReader`] and a [`ChainConnector`]. Every
//! `connect()` hands out a clone sharing the same data and counters, so tests
//! can assert on how many connections a strategy opened.
//!
//! Compiled for this crate's tests and, for other crates, behind the `mock`
//! feature.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_core::dyn_abi::DynSolValue;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;

use tokengraph_core::{BlockInfo, ChainConnector, ChainError, ChainReader, LogQuery, RawLog};

use crate::decoder::{TRANSFER_BATCH_SIG, TRANSFER_SIG, TRANSFER_SINGLE_SIG};
use crate::token_info::{calldata, DECIMALS_SELECTOR, NAME_SELECTOR, SYMBOL_SELECTOR};

#[derive(Debug, Clone, Default)]
struct MockState {
    network_id: String,
    latest_block: Option<u64>,
    blocks: BTreeMap<u64, BlockInfo>,
    logs: Vec<RawLog>,
    calls: HashMap<(Address, Bytes), Bytes>,
    failing_logs: HashSet<u64>,
    failing_headers: HashSet<u64>,
    refuse_connections: bool,
}

/// Scriptable in-memory chain.
#[derive(Debug, Clone)]
pub struct MockChain {
    state: Arc<MockState>,
    connections: Arc<AtomicUsize>,
    log_queries: Arc<Mutex<Vec<LogQuery>>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// An empty chain with network id `"1"`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                network_id: "1".into(),
                ..Default::default()
            }),
            connections: Arc::new(AtomicUsize::new(0)),
            log_queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn state_mut(&mut self) -> &mut MockState {
        Arc::make_mut(&mut self.state)
    }

    pub fn with_network_id(mut self, id: impl Into<String>) -> Self {
        self.state_mut().network_id = id.into();
        self
    }

    /// Defaults to the highest known block.
    pub fn with_latest_block(mut self, number: u64) -> Self {
        self.state_mut().latest_block = Some(number);
        self
    }

    pub fn with_block(mut self, number: u64, timestamp: i64, tx_count: u64) -> Self {
        self.state_mut()
            .blocks
            .insert(number, BlockInfo { number, timestamp, tx_count });
        self
    }

    pub fn with_log(mut self, log: RawLog) -> Self {
        self.state_mut().logs.push(log);
        self
    }

    pub fn with_logs(mut self, logs: impl IntoIterator<Item = RawLog>) -> Self {
        self.state_mut().logs.extend(logs);
        self
    }

    /// Answer `eth_call(to, data)` with `response`.
    pub fn with_call(mut self, to: Address, data: impl Into<Bytes>, response: impl Into<Bytes>) -> Self {
        self.state_mut().calls.insert((to, data.into()), response.into());
        self
    }

    /// ERC20-style `name()`, `symbol()` and `decimals()` answers.
    pub fn with_token(self, token: Address, name: &str, symbol: &str, decimals: u8) -> Self {
        self.with_call(token, calldata(NAME_SELECTOR), abi_string(name))
            .with_call(token, calldata(SYMBOL_SELECTOR), abi_string(symbol))
            .with_call(
                token,
                calldata(DECIMALS_SELECTOR),
                DynSolValue::Uint(U256::from(decimals), 8).abi_encode(),
            )
    }

    /// `eth_getLogs` for `block` returns an error.
    pub fn fail_logs(mut self, block: u64) -> Self {
        self.state_mut().failing_logs.insert(block);
        self
    }

    /// `eth_getBlockByNumber` for `block` returns an error.
    pub fn fail_block_header(mut self, block: u64) -> Self {
        self.state_mut().failing_headers.insert(block);
        self
    }

    /// Every `connect()` fails.
    pub fn refuse_connections(mut self) -> Self {
        self.state_mut().refuse_connections = true;
        self
    }

    /// Number of successful `connect()` calls so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Every `eth_getLogs` query received so far.
    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.log_queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn network_id(&self) -> Result<String, ChainError> {
        Ok(self.state.network_id.clone())
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        let highest = self.state.blocks.keys().next_back().copied().unwrap_or(0);
        Ok(self.state.latest_block.unwrap_or(highest))
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainError> {
        if self.state.failing_headers.contains(&number) {
            return Err(ChainError::Http(format!("injected header failure for block {number}")));
        }
        self.state
            .blocks
            .get(&number)
            .copied()
            .ok_or(ChainError::BlockNotFound(number))
    }

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError> {
        self.log_queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.clone());
        if (query.from_block..=query.to_block).any(|b| self.state.failing_logs.contains(&b)) {
            return Err(ChainError::Http(format!(
                "injected log failure for blocks {}..={}",
                query.from_block, query.to_block
            )));
        }
        Ok(self
            .state
            .logs
            .iter()
            .filter(|log| query.matches(log))
            .cloned()
            .collect())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        self.state
            .calls
            .get(&(to, data))
            .cloned()
            .ok_or_else(|| ChainError::Rpc {
                code: 3,
                message: "execution reverted".into(),
            })
    }
}

impl ChainConnector for MockChain {
    fn connect(&self) -> Result<Arc<dyn ChainReader>, ChainError> {
        if self.state.refuse_connections {
            return Err(ChainError::Connect {
                url: self.endpoint().into(),
                reason: "connection refused".into(),
            });
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }

    fn endpoint(&self) -> &str {
        "mock://chain"
    }
}

// ─── Log fixtures ─────────────────────────────────────────────────────────────

/// Deterministic transaction hash for `(block, tx_index)`.
pub fn tx_hash(block: u64, tx_index: u64) -> B256 {
    let mut seed = [0u8; 16];
    seed[..8].copy_from_slice(&block.to_be_bytes());
    seed[8..].copy_from_slice(&tx_index.to_be_bytes());
    keccak256(seed)
}

fn log(block: u64, tx_index: u64, log_index: u64, emitter: Address, topics: Vec<B256>, data: Vec<u8>) -> RawLog {
    RawLog {
        address: emitter,
        topics,
        data: data.into(),
        block_number: block,
        tx_hash: tx_hash(block, tx_index),
        tx_index,
        log_index,
    }
}

fn abi_string(s: &str) -> Vec<u8> {
    DynSolValue::Tuple(vec![DynSolValue::String(s.to_string())]).abi_encode_params()
}

/// ERC20 `Transfer` log.
pub fn erc20_log(
    block: u64,
    tx_index: u64,
    log_index: u64,
    token: Address,
    from: Address,
    to: Address,
    value: u64,
) -> RawLog {
    log(
        block,
        tx_index,
        log_index,
        token,
        vec![TRANSFER_SIG, from.into_word(), to.into_word()],
        U256::from(value).to_be_bytes::<32>().to_vec(),
    )
}

/// ERC721 `Transfer` log.
pub fn erc721_log(
    block: u64,
    tx_index: u64,
    log_index: u64,
    token: Address,
    from: Address,
    to: Address,
    id: u64,
) -> RawLog {
    log(
        block,
        tx_index,
        log_index,
        token,
        vec![
            TRANSFER_SIG,
            from.into_word(),
            to.into_word(),
            B256::from(U256::from(id).to_be_bytes::<32>()),
        ],
        Vec::new(),
    )
}

/// ERC1155 `TransferSingle` log.
#[allow(clippy::too_many_arguments)]
pub fn erc1155_single_log(
    block: u64,
    tx_index: u64,
    log_index: u64,
    token: Address,
    operator: Address,
    from: Address,
    to: Address,
    id: u64,
    value: u64,
) -> RawLog {
    let data = DynSolValue::Tuple(vec![
        DynSolValue::Uint(U256::from(id), 256),
        DynSolValue::Uint(U256::from(value), 256),
    ])
    .abi_encode_params();
    log(
        block,
        tx_index,
        log_index,
        token,
        vec![TRANSFER_SINGLE_SIG, operator.into_word(), from.into_word(), to.into_word()],
        data,
    )
}

/// ERC1155 `TransferBatch` log. `ids` and `values` are encoded as given,
/// so unequal lengths produce a malformed batch.
#[allow(clippy::too_many_arguments)]
pub fn erc1155_batch_log(
    block: u64,
    tx_index: u64,
    log_index: u64,
    token: Address,
    operator: Address,
    from: Address,
    to: Address,
    ids: &[u64],
    values: &[u64],
) -> RawLog {
    let array = |xs: &[u64]| {
        DynSolValue::Array(xs.iter().map(|x| DynSolValue::Uint(U256::from(*x), 256)).collect())
    };
    let data = DynSolValue::Tuple(vec![array(ids), array(values)]).abi_encode_params();
    log(
        block,
        tx_index,
        log_index,
        token,
        vec![TRANSFER_BATCH_SIG, operator.into_word(), from.into_word(), to.into_word()],
        data,
    )
}
