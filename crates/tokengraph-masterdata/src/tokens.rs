//! Token master data: name, symbol and decimals keyed by contract address.
//!
//! Load order for one chain:
//! 1. the CSV embedded in the binary (chains 1, 56 and 43114 ship one),
//! 2. the local cache `.tokens_<chain>_cache.csv`, overriding embedded rows,
//! 3. records read from the chain and [`merge`](TokenBook::merge)d by the caller.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tokengraph_core::{TransferEvent, TransferKind, UNKNOWN_TOKEN_NAME, UNKNOWN_TOKEN_SYMBOL};

use crate::error::MasterDataError;
use crate::source::{parse_address, read_cache, read_rows};

const HEADER: [&str; 5] = ["ChainId", "Name", "Symbol", "Decimals", "TokenAddress"];

fn embedded(chain_id: &str) -> Option<&'static str> {
    match chain_id {
        "1" => Some(include_str!("../data/tokens_1.csv")),
        "56" => Some(include_str!("../data/tokens_56.csv")),
        "43114" => Some(include_str!("../data/tokens_43114.csv")),
        _ => None,
    }
}

/// File name of the local token cache for `chain_id`.
pub fn cache_file_name(chain_id: &str) -> String {
    format!(".tokens_{chain_id}_cache.csv")
}

/// File name of the `buildmd` output for `chain_id`.
pub fn working_file_name(chain_id: &str) -> String {
    format!("tokens_{chain_id}_working.csv")
}

/// One row of token master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub chain_id: String,
    pub name: String,
    pub symbol: String,
    /// ERC20 only, 0 for NFTs.
    pub decimals: u8,
    pub address: Address,
}

impl TokenRecord {
    fn from_row(row: &StringRecord) -> Option<Self> {
        Some(Self {
            chain_id: row[0].trim().to_string(),
            name: row[1].to_string(),
            symbol: row[2].to_string(),
            decimals: row[3].trim().parse().unwrap_or(0),
            address: parse_address(&row[4])?,
        })
    }

    fn to_row(&self) -> [String; 5] {
        [
            self.chain_id.clone(),
            self.name.clone(),
            self.symbol.clone(),
            self.decimals.to_string(),
            self.address.to_checksum(None),
        ]
    }
}

/// What a lookup returns; defaults to the unknown token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for TokenInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN_TOKEN_NAME.to_string(),
            symbol: UNKNOWN_TOKEN_SYMBOL.to_string(),
            decimals: 0,
        }
    }
}

impl From<&TokenRecord> for TokenInfo {
    fn from(r: &TokenRecord) -> Self {
        Self {
            name: r.name.clone(),
            symbol: r.symbol.clone(),
            decimals: r.decimals,
        }
    }
}

/// How often a token contract emitted transfers in a set of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub address: Address,
    /// Kind of the first transfer seen for this contract.
    pub kind: TransferKind,
    pub count: usize,
}

/// Distinct emitters of `events`, most used first. Ties are ordered by address.
pub fn token_usage<'a>(events: impl IntoIterator<Item = &'a TransferEvent>) -> Vec<TokenUsage> {
    let mut by_address: HashMap<Address, TokenUsage> = HashMap::new();
    for e in events {
        by_address
            .entry(e.emitter)
            .and_modify(|u| u.count += 1)
            .or_insert(TokenUsage {
                address: e.emitter,
                kind: e.kind,
                count: 1,
            });
    }
    let mut usage: Vec<_> = by_address.into_values().collect();
    usage.sort_by(|a, b| b.count.cmp(&a.count).then(a.address.cmp(&b.address)));
    usage
}

/// Write `records` with the standard header to `path`, replacing the file.
pub fn write_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a TokenRecord>,
) -> Result<(), MasterDataError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| MasterDataError::csv(path, e))?;
    writer
        .write_record(HEADER)
        .map_err(|e| MasterDataError::csv(path, e))?;
    for record in records {
        writer
            .write_record(record.to_row())
            .map_err(|e| MasterDataError::csv(path, e))?;
    }
    writer.flush().map_err(|e| MasterDataError::io(path, e))
}

/// Remove the token cache of `chain_id` in `dir`. Returns whether a file was removed.
pub fn clear_cache(chain_id: &str, dir: &Path) -> Result<bool, MasterDataError> {
    let path = dir.join(cache_file_name(chain_id));
    match std::fs::remove_file(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Token cache deleted");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MasterDataError::io(path, e)),
    }
}

/// Token master data for one chain.
#[derive(Debug, Clone)]
pub struct TokenBook {
    chain_id: String,
    cache_path: PathBuf,
    tokens: HashMap<Address, TokenRecord>,
}

impl TokenBook {
    /// An empty book; nothing is read.
    pub fn new(chain_id: impl Into<String>, cache_dir: &Path) -> Self {
        let chain_id = chain_id.into();
        Self {
            cache_path: cache_dir.join(cache_file_name(&chain_id)),
            chain_id,
            tokens: HashMap::new(),
        }
    }

    /// Embedded data for `chain_id`, then the local cache in `cache_dir`.
    pub fn load(chain_id: impl Into<String>, cache_dir: &Path) -> Self {
        let mut book = Self::new(chain_id, cache_dir);

        match embedded(&book.chain_id) {
            Some(data) => {
                let rows = read_rows("embedded tokens", data.as_bytes(), true, HEADER.len());
                book.add_rows(&rows);
            }
            None => tracing::trace!(chain_id = %book.chain_id, "No embedded token file for chain"),
        }
        let embedded_count = book.len();

        let rows = read_cache(&book.cache_path, HEADER.len());
        book.add_rows(&rows);

        tracing::debug!(
            chain_id = %book.chain_id,
            embedded = embedded_count,
            total = book.len(),
            "Loaded token master data"
        );
        book
    }

    fn add_rows(&mut self, rows: &[StringRecord]) {
        let records = rows.iter().filter_map(TokenRecord::from_row);
        self.merge(records);
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.tokens.contains_key(token)
    }

    /// Master data for `token`, and whether it was found. Unknown tokens get
    /// `Unknown` / `UNKNOWN` / 0 decimals.
    pub fn lookup(&self, token: &Address) -> (TokenInfo, bool) {
        match self.tokens.get(token) {
            Some(record) => (TokenInfo::from(record), true),
            None => (TokenInfo::default(), false),
        }
    }

    /// Emitters of `events` that are not in the book, most used first.
    pub fn unknown_tokens<'a>(&self, events: impl IntoIterator<Item = &'a TransferEvent>) -> Vec<TokenUsage> {
        token_usage(events)
            .into_iter()
            .filter(|u| !self.contains(&u.address))
            .collect()
    }

    /// Add or replace records of this chain. Returns how many were taken.
    pub fn merge(&mut self, records: impl IntoIterator<Item = TokenRecord>) -> usize {
        let mut merged = 0;
        for record in records {
            if record.chain_id != self.chain_id {
                continue;
            }
            self.tokens.insert(record.address, record);
            merged += 1;
        }
        merged
    }

    /// Dump the whole book to the local cache, ordered by address.
    pub fn write_cache(&self) -> Result<&Path, MasterDataError> {
        let mut records: Vec<_> = self.tokens.values().collect();
        records.sort_by_key(|r| r.address);
        write_records(&self.cache_path, records)?;
        tracing::debug!(path = %self.cache_path.display(), tokens = self.len(), "Wrote token cache");
        Ok(&self.cache_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, B256};
    use tokengraph_core::TokenAmount;

    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tokengraph-tokens-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn event(emitter: Address, kind: TransferKind) -> TransferEvent {
        TransferEvent {
            block_number: 1,
            tx_hash: B256::ZERO,
            tx_index: 0,
            log_index: 0,
            emitter,
            kind,
            from: Address::ZERO,
            to: Address::ZERO,
            operator: Address::ZERO,
            value: TokenAmount::from(1u64),
            nft_id: String::new(),
        }
    }

    #[test]
    fn embedded_mainnet_tokens() {
        let book = TokenBook::load("1", &scratch("embedded"));
        assert!(!book.is_empty());

        let (info, found) = book.lookup(&WETH);
        assert!(found);
        assert_eq!(info.symbol, "WETH");
        assert_eq!(info.decimals, 18);
    }

    #[test]
    fn unknown_token_defaults() {
        let book = TokenBook::load("1", &scratch("unknown"));
        let (info, found) = book.lookup(&Address::repeat_byte(0x42));
        assert!(!found);
        assert_eq!(info.name, "Unknown");
        assert_eq!(info.symbol, "UNKNOWN");
        assert_eq!(info.decimals, 0);
    }

    #[test]
    fn chain_without_embedded_file_is_empty() {
        let book = TokenBook::load("137", &scratch("polygon"));
        assert!(book.is_empty());
    }

    #[test]
    fn cache_overrides_embedded_and_skips_bad_rows() {
        let dir = scratch("overlay");
        std::fs::write(
            dir.join(cache_file_name("1")),
            "ChainId,Name,Symbol,Decimals,TokenAddress\n\
             1,Wrapped Ether v2,WETH2,18,0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2\n\
             1,Garbage,BAD,18,0xThisIsNotAValidToken\n\
             56,Other Chain,OTH,18,0x1111111111111111111111111111111111111111\n\
             1,Bad Decimals,BD,x,0x2222222222222222222222222222222222222222\n",
        )
        .unwrap();

        let book = TokenBook::load("1", &dir);
        assert_eq!(book.lookup(&WETH).0.symbol, "WETH2");
        assert!(!book.contains(&Address::repeat_byte(0x11)));
        assert_eq!(book.lookup(&Address::repeat_byte(0x22)).0.decimals, 0);
    }

    #[test]
    fn write_cache_then_reload() {
        let dir = scratch("roundtrip");
        let token = Address::repeat_byte(0x33);
        let mut book = TokenBook::new("10", &dir);
        let merged = book.merge([
            TokenRecord {
                chain_id: "10".into(),
                name: "Optimism".into(),
                symbol: "OP".into(),
                decimals: 18,
                address: token,
            },
            TokenRecord {
                chain_id: "1".into(),
                name: "Elsewhere".into(),
                symbol: "ELS".into(),
                decimals: 18,
                address: Address::repeat_byte(0x44),
            },
        ]);
        assert_eq!(merged, 1);

        let path = book.write_cache().unwrap().to_path_buf();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("ChainId,Name,Symbol,Decimals,TokenAddress"));

        let reloaded = TokenBook::load("10", &dir);
        assert_eq!(reloaded.lookup(&token).0.symbol, "OP");

        assert!(clear_cache("10", &dir).unwrap());
        assert!(!clear_cache("10", &dir).unwrap());
        assert!(TokenBook::load("10", &dir).is_empty());
    }

    #[test]
    fn unknown_tokens_ranked_by_usage() {
        let book = TokenBook::load("1", &scratch("usage"));
        let nft = Address::repeat_byte(0x55);
        let coin = Address::repeat_byte(0x66);
        let events = vec![
            event(WETH, TransferKind::Fungible),
            event(nft, TransferKind::NonFungible),
            event(coin, TransferKind::Fungible),
            event(coin, TransferKind::Fungible),
        ];

        let unknown = book.unknown_tokens(&events);
        assert_eq!(unknown.len(), 2);
        assert_eq!(unknown[0], TokenUsage { address: coin, kind: TransferKind::Fungible, count: 2 });
        assert_eq!(unknown[1].address, nft);
        assert_eq!(unknown[1].kind, TransferKind::NonFungible);

        assert_eq!(token_usage(&events).len(), 3);
    }
}
