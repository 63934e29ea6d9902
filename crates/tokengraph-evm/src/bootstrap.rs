//! Chain identification at startup.

use serde::{Deserialize, Serialize};
use tokengraph_core::{chain_name, ChainConnector, ChainError};

/// What a run knows about the chain behind an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmChain {
    /// File-name safe chain name, `"Unknown"` if the id is not in the table.
    pub name: String,
    /// `net_version` of the endpoint.
    pub network_id: String,
    pub latest_block: u64,
    pub endpoint: String,
}

impl EvmChain {
    /// Connect once and read network id and head block.
    pub async fn identify(connector: &dyn ChainConnector) -> Result<Self, ChainError> {
        let reader = connector.connect()?;
        let network_id = reader.network_id().await?;
        let latest_block = reader.latest_block_number().await?;
        let chain = Self {
            name: chain_name(&network_id),
            network_id,
            latest_block,
            endpoint: connector.endpoint().to_string(),
        };
        tracing::info!(
            chain = %chain.name,
            network_id = %chain.network_id,
            latest_block = chain.latest_block,
            "Connected to chain"
        );
        Ok(chain)
    }
}
