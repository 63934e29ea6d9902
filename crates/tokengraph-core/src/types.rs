//! Canonical transfer model shared by the decoder, the enrichment pass and
//! the graph builder.

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Token name used when none is known or readable.
pub const UNKNOWN_TOKEN_NAME: &str = "Unknown";

/// Token symbol used when none is known or readable.
pub const UNKNOWN_TOKEN_SYMBOL: &str = "UNKNOWN";

// ─── TransferKind ─────────────────────────────────────────────────────────────

/// Which token standard produced a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransferKind {
    /// ERC20 `Transfer(address,address,uint256)`.
    Fungible,
    /// ERC721 `Transfer(address,address,uint256 indexed)`.
    NonFungible,
    /// ERC1155 `TransferSingle`.
    SemiFungibleSingle,
    /// ERC1155 `TransferBatch`, one event per batch entry.
    SemiFungibleBatch,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fungible => "ERC20",
            Self::NonFungible => "ERC721",
            Self::SemiFungibleSingle => "ERC1155_SINGLE",
            Self::SemiFungibleBatch => "ERC1155_BATCH",
        }
    }

    /// ERC1155 single or batch.
    pub fn is_semi_fungible(&self) -> bool {
        matches!(self, Self::SemiFungibleSingle | Self::SemiFungibleBatch)
    }

    /// Token standards that expose `decimals()`.
    pub fn has_decimals(&self) -> bool {
        matches!(self, Self::Fungible)
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── TokenAmount ──────────────────────────────────────────────────────────────

/// Unsigned token amount without an upper bound.
///
/// ERC20 contracts put the amount in the log data with no declared width, so
/// a payload wider than 32 bytes is still an amount and is kept in full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenAmount(BigUint);

impl TokenAmount {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Big-endian magnitude of any length; empty is zero.
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    /// Number of significant bits.
    pub fn bits(&self) -> u64 {
        self.0.bits()
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self::from_be_slice(&value.to_be_bytes::<32>())
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ─── TransferEvent ────────────────────────────────────────────────────────────

/// One token movement decoded from a single log entry.
///
/// Batch logs expand into several events that share every identity field
/// except `nft_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub block_number: u64,
    pub tx_hash: B256,
    /// Position of the transaction inside its block.
    pub tx_index: u64,
    /// Position of the log inside its block.
    pub log_index: u64,
    /// Token contract that emitted the log.
    pub emitter: Address,
    pub kind: TransferKind,
    pub from: Address,
    pub to: Address,
    /// ERC1155 operator; zero address for ERC20/ERC721.
    pub operator: Address,
    /// Amount moved; zero for ERC721.
    pub value: TokenAmount,
    /// Decimal token id; empty for ERC20.
    pub nft_id: String,
}

impl TransferEvent {
    /// The natural key of this event.
    pub fn key(&self) -> TransferKey {
        TransferKey {
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
            nft_id: self.nft_id.clone(),
        }
    }

    /// Chain position used for deterministic ordering.
    pub fn position(&self) -> ChainPosition {
        ChainPosition {
            block_number: self.block_number,
            tx_index: self.tx_index,
            log_index: self.log_index,
        }
    }
}

/// `(block, tx hash, log index, nft id)`. Unique per [`TransferEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferKey {
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    pub nft_id: String,
}

/// Where an event sits in the chain, ordered block first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainPosition {
    pub block_number: u64,
    pub tx_index: u64,
    pub log_index: u64,
}

// ─── BlockInfo ────────────────────────────────────────────────────────────────

/// Block metadata needed for time estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
    /// Number of transactions in the block.
    pub tx_count: u64,
}

/// Block metadata keyed by block number.
pub type BlockMap = HashMap<u64, BlockInfo>;

// ─── EnrichedTransfer ─────────────────────────────────────────────────────────

/// Earliest appearance of an address in a processed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstSeen {
    pub timestamp: DateTime<Utc>,
    /// Ordinal of `timestamp` among all distinct timestamps of the batch.
    pub index: usize,
}

/// A [`TransferEvent`] with its time estimate and address provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedTransfer {
    pub transfer: TransferEvent,
    pub block_timestamp: DateTime<Utc>,
    /// Interpolated transaction time, millisecond precision.
    pub timestamp_estimate: DateTime<Utc>,
    /// Ordinal of `timestamp_estimate` among all distinct timestamps.
    pub timestamp_index: usize,
    pub from_first_seen: FirstSeen,
    pub to_first_seen: FirstSeen,
}

impl EnrichedTransfer {
    pub fn key(&self) -> TransferKey {
        self.transfer.key()
    }
}
