//! Human-readable chain names keyed by network id.

use std::collections::HashMap;
use std::sync::OnceLock;

const CHAIN_IDS_JSON: &str = include_str!("../data/chain_ids.json");

/// Name used when a network id is not in the table.
pub const UNKNOWN_CHAIN: &str = "Unknown";

fn table() -> &'static HashMap<String, String> {
    static TABLE: OnceLock<HashMap<String, String>> = OnceLock::new();
    TABLE.get_or_init(|| match serde_json::from_str(CHAIN_IDS_JSON) {
        Ok(map) => map,
        Err(e) => {
            tracing::error!(error = %e, "embedded chain id table is malformed");
            HashMap::new()
        }
    })
}

/// Chain name for `network_id`, with spaces replaced by `-` so the name is
/// safe to use in file names. Unknown ids map to `"Unknown"`.
pub fn chain_name(network_id: &str) -> String {
    table()
        .get(network_id)
        .map(String::as_str)
        .unwrap_or(UNKNOWN_CHAIN)
        .replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_chains() {
        assert_eq!(chain_name("1"), "ethereum");
        assert_eq!(chain_name("56"), "bsc");
        assert_eq!(chain_name("43114"), "avax");
    }

    #[test]
    fn spaces_become_dashes() {
        assert_eq!(chain_name("1101"), "polygon-zkevm");
    }

    #[test]
    fn unknown_chain() {
        assert_eq!(chain_name("999999999"), "Unknown");
    }
}
