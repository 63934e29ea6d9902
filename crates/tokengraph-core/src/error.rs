//! Error types for the transfer pipeline.

use thiserror::Error;

/// Errors raised by a [`ChainReader`](crate::chain::ChainReader) implementation.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Could not create a client for the endpoint.
    #[error("Connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    /// HTTP request failed (connection refused, timeout, non-2xx status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered, but not in the shape we expected.
    #[error("Unexpected response to {method}: {reason}")]
    InvalidResponse { method: String, reason: String },

    /// The node does not know the requested block.
    #[error("Block {0} not found")]
    BlockNotFound(u64),

    #[error("{0}")]
    Other(String),
}

impl ChainError {
    /// Returns `true` if the failure is transient (worth re-running the range).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Connect { .. })
    }

    pub fn invalid(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid block range: from {from} is greater than to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// A time estimate was requested for a block that was never resolved.
    #[error("Block {block_number} missing from block metadata")]
    MissingBlock { block_number: u64 },

    /// A block with no transactions cannot have emitted a transfer.
    #[error("Block {block_number} reports zero transactions but emitted transfer events")]
    EmptyBlock { block_number: u64 },

    #[error("Timestamp estimate for block {block_number} is out of range")]
    TimestampOutOfRange { block_number: u64 },

    #[error("Work pool error: {0}")]
    WorkPool(#[from] WorkPoolError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl PipelineError {
    /// Returns `true` for internal invariant violations (bugs in orchestration,
    /// not bad external data).
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingBlock { .. } | Self::EmptyBlock { .. } | Self::TimestampOutOfRange { .. }
        )
    }
}

/// Errors from the [`WorkPool`](crate::work::WorkPool).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WorkPoolError {
    #[error("work pool is shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_classification() {
        assert!(PipelineError::MissingBlock { block_number: 1 }.is_invariant_violation());
        assert!(PipelineError::EmptyBlock { block_number: 1 }.is_invariant_violation());
        assert!(!PipelineError::InvalidRange { from: 2, to: 1 }.is_invariant_violation());
        assert!(!PipelineError::Chain(ChainError::Http("boom".into())).is_invariant_violation());
    }

    #[test]
    fn retryable_chain_errors() {
        assert!(ChainError::Http("reset".into()).is_retryable());
        assert!(!ChainError::Rpc { code: -32000, message: "limit".into() }.is_retryable());
        assert!(!ChainError::invalid("eth_getLogs", "not an array").is_retryable());
    }
}
