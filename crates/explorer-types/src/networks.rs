//! Network selection and per-network endpoints.
//!
//! The auction runs independently on several chains. Switching network changes
//! the indexer endpoint, the transaction explorer and the storage namespace
//! holding problem instances, but never the batch constants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Chains the auction is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
	Mainnet,
	Rinkeby,
	Xdai,
}

impl Network {
	/// All supported networks.
	pub const ALL: [Network; 3] = [Network::Mainnet, Network::Rinkeby, Network::Xdai];

	pub fn as_str(&self) -> &'static str {
		match self {
			Network::Mainnet => "mainnet",
			Network::Rinkeby => "rinkeby",
			Network::Xdai => "xdai",
		}
	}

	/// Default subgraph endpoint for this network.
	pub fn default_indexer_url(&self) -> &'static str {
		match self {
			Network::Mainnet => "https://api.thegraph.com/subgraphs/name/gnosis/protocol",
			Network::Rinkeby => "https://api.thegraph.com/subgraphs/name/gnosis/protocol-rinkeby",
			Network::Xdai => "https://api.thegraph.com/subgraphs/name/gnosis/protocol-xdai",
		}
	}

	/// Default transaction explorer prefix; the hash is appended verbatim.
	pub fn default_tx_explorer(&self) -> &'static str {
		match self {
			Network::Mainnet => "https://etherscan.io/tx/",
			Network::Rinkeby => "https://rinkeby.etherscan.io/tx/",
			Network::Xdai => "https://blockscout.com/poa/xdai/tx/",
		}
	}
}

impl fmt::Display for Network {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Network {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"mainnet" => Ok(Network::Mainnet),
			"rinkeby" => Ok(Network::Rinkeby),
			"xdai" => Ok(Network::Xdai),
			other => Err(format!("Unknown network '{}'", other)),
		}
	}
}

/// Configuration for a single network.
///
/// # Fields
///
/// * `indexer_url` - Subgraph endpoint, defaults to the public hosted service
/// * `tx_explorer` - Transaction explorer prefix
/// * `instance_bucket` - Storage bucket holding problem instances
/// * `instance_namespace` - Path of the reference solver's instance folder
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	#[serde(default)]
	pub indexer_url: Option<String>,
	#[serde(default)]
	pub tx_explorer: Option<String>,
	pub instance_bucket: String,
	pub instance_namespace: String,
}

impl NetworkConfig {
	pub fn indexer_url_for(&self, network: Network) -> &str {
		self.indexer_url
			.as_deref()
			.unwrap_or_else(|| network.default_indexer_url())
	}

	pub fn tx_explorer_for(&self, network: Network) -> &str {
		self.tx_explorer
			.as_deref()
			.unwrap_or_else(|| network.default_tx_explorer())
	}

	/// Explorer link for a transaction on this network.
	pub fn tx_link(&self, network: Network, tx_hash: &str) -> String {
		format!("{}{}", self.tx_explorer_for(network), tx_hash)
	}
}

/// Per-network configuration keyed by network name.
pub type NetworksConfig = HashMap<Network, NetworkConfig>;
