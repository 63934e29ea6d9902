//! Token metadata read from the token contract itself.
//!
//! ERC20 contracts are asked for `name()`, `symbol()` and `decimals()`.
//! ERC721 and ERC1155 contracts are asked for `name()` and `symbol()` only;
//! ERC1155 does not standardise them, so those reads often fail. Every read
//! falls back to its default on its own: a contract without `symbol()` still
//! gets its name.

use std::sync::Arc;
use std::time::Duration;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tokengraph_core::{
    ChainConnector, ChainError, ChainReader, FetchOutcome, PipelineError, TransferKind,
    UNKNOWN_TOKEN_NAME, UNKNOWN_TOKEN_SYMBOL,
};

use crate::strategy::{self, UnitFetch};

/// `name()`
pub const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
/// `symbol()`
pub const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
/// `decimals()`
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// Call data for a zero-argument function.
pub fn calldata(selector: [u8; 4]) -> Bytes {
    Bytes::copy_from_slice(&selector)
}

/// A token contract to read, with the standard its transfers used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRequest {
    pub address: Address,
    pub kind: TransferKind,
}

/// Metadata as read from the chain, defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainToken {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl OnChainToken {
    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            name: UNKNOWN_TOKEN_NAME.into(),
            symbol: UNKNOWN_TOKEN_SYMBOL.into(),
            decimals: 0,
        }
    }
}

/// Read whatever metadata the contract exposes.
pub async fn read_token(reader: &dyn ChainReader, request: &TokenRequest) -> OnChainToken {
    let mut token = OnChainToken::unknown(request.address);

    if let Some(name) = call_string(reader, request.address, NAME_SELECTOR).await {
        token.name = name;
    }
    if let Some(symbol) = call_string(reader, request.address, SYMBOL_SELECTOR).await {
        token.symbol = symbol;
    }
    if request.kind.has_decimals() {
        if let Some(decimals) = call_decimals(reader, request.address).await {
            token.decimals = decimals;
        }
    }
    token
}

async fn call_string(reader: &dyn ChainReader, token: Address, selector: [u8; 4]) -> Option<String> {
    match reader.call(token, calldata(selector)).await {
        Ok(out) => decode_string(&out).map(|s| sanitize(&s)).filter(|s| !s.is_empty()),
        Err(e) => {
            tracing::debug!(%token, selector = ?selector, error = %e, "token call failed");
            None
        }
    }
}

async fn call_decimals(reader: &dyn ChainReader, token: Address) -> Option<u8> {
    match reader.call(token, calldata(DECIMALS_SELECTOR)).await {
        Ok(out) => decode_decimals(&out),
        Err(e) => {
            tracing::debug!(%token, error = %e, "decimals() failed");
            None
        }
    }
}

/// Decode a `string` return value. Older tokens return `bytes32` instead,
/// which is accepted with its trailing zero bytes stripped.
pub fn decode_string(data: &[u8]) -> Option<String> {
    let ty = DynSolType::Tuple(vec![DynSolType::String]);
    if let Ok(DynSolValue::Tuple(values)) = ty.abi_decode_params(data) {
        if let [DynSolValue::String(s)] = values.as_slice() {
            return Some(s.clone());
        }
    }
    if data.len() == 32 {
        let end = data.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        return std::str::from_utf8(&data[..end]).ok().map(str::to_string);
    }
    None
}

/// Decode a `uint8` return value.
pub fn decode_decimals(data: &[u8]) -> Option<u8> {
    let ty = DynSolType::Tuple(vec![DynSolType::Uint(256)]);
    let Ok(DynSolValue::Tuple(values)) = ty.abi_decode_params(data) else {
        return None;
    };
    match values.as_slice() {
        [DynSolValue::Uint(v, _)] if *v <= U256::from(u8::MAX) => Some(v.as_limbs()[0] as u8),
        _ => None,
    }
}

/// Master-data files are comma separated, so commas and control characters
/// are replaced by spaces.
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c == ',' || c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Token metadata for a set of token contracts.
pub type TokenReads = FetchOutcome<Vec<OnChainToken>, TokenRequest>;

/// Reads token metadata for many contracts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenInfoReader;

#[async_trait]
impl UnitFetch for TokenInfoReader {
    type Unit = TokenRequest;
    type Output = OnChainToken;

    fn phase(&self) -> &'static str {
        "tokens"
    }

    async fn fetch(&self, reader: &dyn ChainReader, request: &TokenRequest) -> Result<OnChainToken, ChainError> {
        Ok(read_token(reader, request).await)
    }
}

impl TokenInfoReader {
    pub async fn read_serial(
        &self,
        connector: &dyn ChainConnector,
        requests: Vec<TokenRequest>,
        throttle: Duration,
    ) -> Result<TokenReads, PipelineError> {
        let outcome = strategy::fetch_serial(self, connector, requests, throttle).await?;
        Ok(values_only(outcome))
    }

    pub async fn read_concurrent(
        &self,
        connector: Arc<dyn ChainConnector>,
        requests: Vec<TokenRequest>,
        max_workers: usize,
    ) -> Result<TokenReads, PipelineError> {
        let outcome = strategy::fetch_concurrent(Arc::new(*self), connector, requests, max_workers).await?;
        Ok(values_only(outcome))
    }
}

fn values_only(outcome: FetchOutcome<Vec<(TokenRequest, OnChainToken)>, TokenRequest>) -> TokenReads {
    FetchOutcome {
        value: outcome.value.into_iter().map(|(_, token)| token).collect(),
        report: outcome.report,
    }
}
