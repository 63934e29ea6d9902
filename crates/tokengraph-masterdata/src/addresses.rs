//! Address master data: descriptions of well-known addresses (exchanges,
//! bridges) shown on graph nodes. Informational only, none of it is on chain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::source::{parse_address, read_cache, read_rows};

const WIDTH: usize = 3;

fn embedded(chain_id: &str) -> Option<&'static str> {
    match chain_id {
        "1" => Some(include_str!("../data/addresses_1.csv")),
        "56" => Some(include_str!("../data/addresses_56.csv")),
        "43114" => Some(include_str!("../data/addresses_43114.csv")),
        _ => None,
    }
}

/// File name of the local address cache for `chain_id`.
pub fn cache_file_name(chain_id: &str) -> String {
    format!(".addresses_{chain_id}_cache.csv")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub chain_id: String,
    pub description: String,
    pub address: Address,
}

impl AddressRecord {
    fn from_row(row: &StringRecord) -> Option<Self> {
        Some(Self {
            chain_id: row[0].trim().to_string(),
            description: row[1].to_string(),
            address: parse_address(&row[2])?,
        })
    }
}

/// What a lookup returns; the description is empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub description: String,
}

/// Address master data for one chain.
#[derive(Debug, Clone)]
pub struct AddressBook {
    chain_id: String,
    cache_path: PathBuf,
    addresses: HashMap<Address, AddressRecord>,
}

impl AddressBook {
    pub fn new(chain_id: impl Into<String>, cache_dir: &Path) -> Self {
        let chain_id = chain_id.into();
        Self {
            cache_path: cache_dir.join(cache_file_name(&chain_id)),
            chain_id,
            addresses: HashMap::new(),
        }
    }

    /// Embedded data for `chain_id` (no header row), then the local cache in
    /// `cache_dir` (with header row).
    pub fn load(chain_id: impl Into<String>, cache_dir: &Path) -> Self {
        let mut book = Self::new(chain_id, cache_dir);

        if let Some(data) = embedded(&book.chain_id) {
            let rows = read_rows("embedded addresses", data.as_bytes(), false, WIDTH);
            book.add_rows(&rows);
        }
        let rows = read_cache(&book.cache_path, WIDTH);
        book.add_rows(&rows);

        tracing::debug!(chain_id = %book.chain_id, total = book.len(), "Loaded address master data");
        book
    }

    fn add_rows(&mut self, rows: &[StringRecord]) {
        for record in rows.iter().filter_map(AddressRecord::from_row) {
            if record.chain_id == self.chain_id {
                self.addresses.insert(record.address, record);
            }
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Description of `address`, and whether it was found.
    pub fn lookup(&self, address: &Address) -> (AddressInfo, bool) {
        match self.addresses.get(address) {
            Some(r) => (
                AddressInfo {
                    description: r.description.clone(),
                },
                true,
            ),
            None => (AddressInfo::default(), false),
        }
    }
}
