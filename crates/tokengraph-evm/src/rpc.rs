//! JSON-RPC 2.0 over HTTP.
//!
//! `HttpChainReader` issues one request per call with no retries and no
//! timeout; a run that loses units to transient errors is re-run by the
//! operator with a narrower range.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use tokengraph_core::{BlockInfo, ChainConnector, ChainError, ChainReader, LogQuery, RawLog};

// ─── Wire types ───────────────────────────────────────────────────────────────

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The result value, or the node's error.
    pub fn into_result(self) -> Result<Value, ChainError> {
        match self.error {
            Some(err) => Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// A log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: String,
    pub transaction_hash: B256,
    pub transaction_index: String,
    pub log_index: String,
    #[serde(default)]
    pub removed: bool,
}

impl TryFrom<RpcLog> for RawLog {
    type Error = ChainError;

    fn try_from(log: RpcLog) -> Result<Self, Self::Error> {
        Ok(RawLog {
            address: log.address,
            topics: log.topics,
            data: log.data,
            block_number: parse_quantity("eth_getLogs", &log.block_number)?,
            tx_hash: log.transaction_hash,
            tx_index: parse_quantity("eth_getLogs", &log.transaction_index)?,
            log_index: parse_quantity("eth_getLogs", &log.log_index)?,
        })
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(method: &str, s: &str) -> Result<u64, ChainError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::invalid(method, format!("bad quantity {s:?}: {e}")))
}

fn quantity(n: u64) -> String {
    format!("0x{n:x}")
}

/// `BlockInfo` from an `eth_getBlockByNumber` result (transaction hashes only).
pub fn block_from_json(number: u64, v: &Value) -> Result<BlockInfo, ChainError> {
    const METHOD: &str = "eth_getBlockByNumber";
    if v.is_null() {
        return Err(ChainError::BlockNotFound(number));
    }
    let timestamp = v["timestamp"]
        .as_str()
        .ok_or_else(|| ChainError::invalid(METHOD, "missing timestamp"))?;
    let tx_count = v["transactions"]
        .as_array()
        .ok_or_else(|| ChainError::invalid(METHOD, "missing transactions"))?
        .len() as u64;
    let timestamp = parse_quantity(METHOD, timestamp)?;
    Ok(BlockInfo {
        number,
        timestamp: i64::try_from(timestamp)
            .map_err(|_| ChainError::invalid(METHOD, "timestamp out of range"))?,
        tx_count,
    })
}

/// `eth_getLogs` filter object for `query`.
pub fn filter_json(query: &LogQuery) -> Value {
    let mut filter = json!({
        "fromBlock": quantity(query.from_block),
        "toBlock": quantity(query.to_block),
    });
    if let Some(address) = query.address {
        filter["address"] = json!(address);
    }
    if !query.topic0.is_empty() {
        filter["topics"] = json!([query.topic0]);
    }
    filter
}

// ─── HttpChainReader ──────────────────────────────────────────────────────────

/// A [`ChainReader`] talking JSON-RPC to one HTTP endpoint.
pub struct HttpChainReader {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpChainReader {
    pub fn new(url: impl Into<String>) -> Result<Self, ChainError> {
        let url = url.into();
        let http = reqwest::Client::builder().build().map_err(|e| ChainError::Connect {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            url,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ChainError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);
        tracing::trace!(method, id = req.id, url = %self.url, "rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChainError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| ChainError::invalid(method, e.to_string()))?
            .into_result()
    }

    fn parse<T: serde::de::DeserializeOwned>(method: &str, v: Value) -> Result<T, ChainError> {
        serde_json::from_value(v).map_err(|e| ChainError::invalid(method, e.to_string()))
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn network_id(&self) -> Result<String, ChainError> {
        let v = self.request("net_version", vec![]).await?;
        match v {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(ChainError::invalid("net_version", format!("unexpected {other}"))),
        }
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        let v = self.request("eth_blockNumber", vec![]).await?;
        let s: String = Self::parse("eth_blockNumber", v)?;
        parse_quantity("eth_blockNumber", &s)
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainError> {
        let v = self
            .request("eth_getBlockByNumber", vec![json!(quantity(number)), json!(false)])
            .await?;
        block_from_json(number, &v)
    }

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError> {
        let v = self.request("eth_getLogs", vec![filter_json(query)]).await?;
        let logs: Vec<RpcLog> = Self::parse("eth_getLogs", v)?;
        logs.into_iter()
            .filter(|log| !log.removed)
            .map(RawLog::try_from)
            .collect()
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let v = self
            .request("eth_call", vec![json!({ "to": to, "data": data }), json!("latest")])
            .await?;
        Self::parse("eth_call", v)
    }
}

/// Creates a new [`HttpChainReader`] per connection.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    url: String,
}

impl HttpConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl ChainConnector for HttpConnector {
    fn connect(&self) -> Result<Arc<dyn ChainReader>, ChainError> {
        Ok(Arc::new(HttpChainReader::new(self.url.clone())?))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
