//! Node and edge weights of the transfer graph.

use std::fmt;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use tokengraph_core::{EnrichedTransfer, TransferKind};

use crate::format::{format_timestamp, format_timestamp_short};

/// Numeric node type written as the `nodeType` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Movement = 0,
    Address = 1,
}

/// An externally owned account or contract that sent or received tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressNode {
    pub address: Address,
    /// Empty when the address is not in master data.
    pub description: String,
    /// First-seen timestamp of the address.
    pub timestamp_estimate: String,
    /// First-seen ordinal of the address.
    pub appearance_index: usize,
    pub label: String,
}

/// One token movement sitting between its sender and receiver nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementNode {
    pub symbol: String,
    /// Scaled by token decimals, 0 if the token is unknown.
    pub value: f64,
    pub nft_id: String,
    pub kind: TransferKind,
    pub tx_hash: B256,
    pub tx_index: u64,
    pub timestamp_estimate: String,
    pub appearance_index: usize,
    pub label: String,
}

impl MovementNode {
    pub(crate) fn label_for(t: &EnrichedTransfer, value: f64, symbol: &str) -> String {
        let time = format_timestamp_short(&t.timestamp_estimate);
        let nft_id = &t.transfer.nft_id;
        match t.transfer.kind {
            TransferKind::Fungible => format!("{value} {symbol} ({time})"),
            TransferKind::NonFungible => format!("NFT {nft_id} {symbol} ({time})"),
            TransferKind::SemiFungibleSingle | TransferKind::SemiFungibleBatch => {
                format!("{value} of NFT {nft_id} {symbol} ({time})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphNode {
    Address(AddressNode),
    Movement(MovementNode),
}

impl GraphNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Address(_) => NodeType::Address,
            Self::Movement(_) => NodeType::Movement,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Address(n) => &n.label,
            Self::Movement(n) => &n.label,
        }
    }
}

/// Weight of both edges created for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEdge {
    pub kind: TransferKind,
    pub symbol: String,
    pub timestamp_estimate: String,
    pub appearance_index: usize,
}

impl TransferEdge {
    pub(crate) fn new(t: &EnrichedTransfer, symbol: &str) -> Self {
        Self {
            kind: t.transfer.kind,
            symbol: symbol.to_string(),
            timestamp_estimate: format_timestamp(&t.timestamp_estimate),
            appearance_index: t.timestamp_index,
        }
    }
}

/// Identity of a movement node. Distinct batch items differ by `nft_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MovementKey {
    pub from: Address,
    pub to: Address,
    pub tx_hash: B256,
    pub log_index: u64,
    pub nft_id: String,
}

impl MovementKey {
    pub fn of(t: &EnrichedTransfer) -> Self {
        Self {
            from: t.transfer.from,
            to: t.transfer.to,
            tx_hash: t.transfer.tx_hash,
            log_index: t.transfer.log_index,
            nft_id: t.transfer.nft_id.clone(),
        }
    }
}

impl fmt::Display for MovementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} in {} log {} nft '{}'",
            self.from, self.to, self.tx_hash, self.log_index, self.nft_id
        )
    }
}

/// Size of a built graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationResult {
    pub nodes: usize,
    pub edges: usize,
    pub events: usize,
}

impl CreationResult {
    pub fn log_summary(&self) {
        tracing::info!(events = self.events, nodes = self.nodes, edges = self.edges, "Graph created");
    }
}

impl fmt::Display for CreationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} events, {} nodes, {} edges", self.events, self.nodes, self.edges)
    }
}
