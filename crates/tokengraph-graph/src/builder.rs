//! Builds the transfer graph from enriched events.
//!
//! ```text
//!   from ──► movement ──► to
//! ```
//!
//! Every distinct address becomes one address node. Every distinct
//! [`MovementKey`] becomes one movement node. Each event then adds the two
//! directed edges around its movement node, so parallel edges are expected.

use std::collections::HashMap;

use alloy_primitives::Address;
use petgraph::graph::{DiGraph, NodeIndex};
use tokengraph_core::{EnrichedTransfer, FirstSeen};
use tokengraph_masterdata::{AddressBook, TokenBook};

use crate::error::GraphError;
use crate::format::{format_timestamp, scale_token_value, short_address};
use crate::model::{AddressNode, CreationResult, GraphNode, MovementKey, MovementNode, TransferEdge};

/// A built transfer graph plus the indexes used to build it.
#[derive(Debug, Clone, Default)]
pub struct TransferGraph {
    pub graph: DiGraph<GraphNode, TransferEdge>,
    pub addresses: HashMap<Address, NodeIndex>,
    pub movements: HashMap<MovementKey, NodeIndex>,
    pub events: usize,
}

impl TransferGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn creation_result(&self) -> CreationResult {
        CreationResult {
            nodes: self.node_count(),
            edges: self.edge_count(),
            events: self.events,
        }
    }

    pub fn address_node(&self, address: &Address) -> Option<&AddressNode> {
        match self.graph.node_weight(*self.addresses.get(address)?)? {
            GraphNode::Address(n) => Some(n),
            GraphNode::Movement(_) => None,
        }
    }
}

/// Turns enriched transfers into a [`TransferGraph`] using master data for
/// labels and token scaling.
pub struct GraphBuilder<'a> {
    tokens: &'a TokenBook,
    addresses: &'a AddressBook,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(tokens: &'a TokenBook, addresses: &'a AddressBook) -> Self {
        Self { tokens, addresses }
    }

    pub fn build(&self, events: &[EnrichedTransfer]) -> Result<TransferGraph, GraphError> {
        let mut g = TransferGraph {
            events: events.len(),
            ..Default::default()
        };

        for t in events {
            self.add_address(&mut g, t.transfer.from, &t.from_first_seen);
            self.add_address(&mut g, t.transfer.to, &t.to_first_seen);
        }

        for t in events {
            let key = MovementKey::of(t);
            if g.movements.contains_key(&key) {
                tracing::debug!(key = %key, "Duplicate movement, reusing node");
                continue;
            }
            let ix = g.graph.add_node(GraphNode::Movement(self.movement_node(t)));
            g.movements.insert(key, ix);
        }

        for t in events {
            let from = lookup(&g.addresses, &t.transfer.from, "Address")?;
            let to = lookup(&g.addresses, &t.transfer.to, "Address")?;
            let key = MovementKey::of(t);
            let movement = lookup(&g.movements, &key, "Movement")?;

            let symbol = match g.graph.node_weight(movement) {
                Some(GraphNode::Movement(n)) => n.symbol.clone(),
                _ => {
                    return Err(GraphError::MissingNode {
                        kind: "Movement",
                        key: key.to_string(),
                    })
                }
            };
            let edge = TransferEdge::new(t, &symbol);
            g.graph.add_edge(from, movement, edge.clone());
            g.graph.add_edge(movement, to, edge);
        }

        Ok(g)
    }

    fn add_address(&self, g: &mut TransferGraph, address: Address, first_seen: &FirstSeen) {
        if g.addresses.contains_key(&address) {
            return;
        }
        let hex = address.to_checksum(None);
        let (info, known) = self.addresses.lookup(&address);
        let label = if known { info.description.clone() } else { short_address(&hex) };
        let node = AddressNode {
            address,
            description: info.description,
            timestamp_estimate: format_timestamp(&first_seen.timestamp),
            appearance_index: first_seen.index,
            label,
        };
        let ix = g.graph.add_node(GraphNode::Address(node));
        g.addresses.insert(address, ix);
    }

    fn movement_node(&self, t: &EnrichedTransfer) -> MovementNode {
        let (token, known) = self.tokens.lookup(&t.transfer.emitter);
        let value = if known {
            scale_token_value(&t.transfer.value, token.decimals)
        } else {
            0.0
        };
        MovementNode {
            label: MovementNode::label_for(t, value, &token.symbol),
            symbol: token.symbol,
            value,
            nft_id: t.transfer.nft_id.clone(),
            kind: t.transfer.kind,
            tx_hash: t.transfer.tx_hash,
            tx_index: t.transfer.tx_index,
            timestamp_estimate: format_timestamp(&t.timestamp_estimate),
            appearance_index: t.timestamp_index,
        }
    }
}

fn lookup<K>(index: &HashMap<K, NodeIndex>, key: &K, kind: &'static str) -> Result<NodeIndex, GraphError>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
{
    index.get(key).copied().ok_or_else(|| GraphError::MissingNode {
        kind,
        key: format!("{key:?}"),
    })
}
