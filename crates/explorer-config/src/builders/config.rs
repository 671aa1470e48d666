//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, wired to the in-memory backends.

use crate::{
	ApiConfig, BatchConfig, Config, ExplorerConfig, IndexerConfig, StorageConfig,
};
use explorer_types::{
	Environment, Network, NetworkConfig, SolverEntry, DEFAULT_GRAPH_FILE, DEFAULT_RESULT_FILE,
};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	environment: Environment,
	network: Network,
	batch_count: usize,
	filter_unsolved: bool,
	duration_seconds: u64,
	finality_margin_seconds: u64,
	solvers: Vec<SolverEntry>,
	storage_implementation: (String, toml::Value),
	indexer_implementation: (String, toml::Value),
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			environment: Environment::Production,
			network: Network::Mainnet,
			batch_count: 10,
			filter_unsolved: false,
			duration_seconds: 300,
			finality_margin_seconds: 60,
			solvers: Vec::new(),
			storage_implementation: ("memory".to_string(), empty_table()),
			indexer_implementation: ("memory".to_string(), empty_table()),
			api: None,
		}
	}

	/// Sets the solver environment to load.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = environment;
		self
	}

	/// Sets the default network.
	pub fn network(mut self, network: Network) -> Self {
		self.network = network;
		self
	}

	/// Sets the default number of batches.
	pub fn batch_count(mut self, count: usize) -> Self {
		self.batch_count = count;
		self
	}

	/// Sets whether unsolved batches are filtered by default.
	pub fn filter_unsolved(mut self, filter: bool) -> Self {
		self.filter_unsolved = filter;
		self
	}

	/// Sets the batch duration and finality margin in seconds.
	pub fn batch_timing(mut self, duration: u64, finality: u64) -> Self {
		self.duration_seconds = duration;
		self.finality_margin_seconds = finality;
		self
	}

	/// Adds a solver registry entry.
	pub fn solver(mut self, entry: SolverEntry) -> Self {
		self.solvers.push(entry);
		self
	}

	/// Sets the primary listing implementation and its table.
	pub fn storage(mut self, name: &str, config: toml::Value) -> Self {
		self.storage_implementation = (name.to_string(), config);
		self
	}

	/// Sets the primary indexer implementation and its table.
	pub fn indexer(mut self, name: &str, config: toml::Value) -> Self {
		self.indexer_implementation = (name.to_string(), config);
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let (storage_primary, storage_table) = self.storage_implementation;
		let (indexer_primary, indexer_table) = self.indexer_implementation;

		let mut networks = HashMap::new();
		networks.insert(
			self.network,
			NetworkConfig {
				indexer_url: None,
				tx_explorer: None,
				instance_bucket: "test-bucket".to_string(),
				instance_namespace: format!("data/{}_prod/standard-solver/instances", self.network),
			},
		);

		Config {
			explorer: ExplorerConfig {
				environment: self.environment,
				network: self.network,
				batch_count: self.batch_count,
				filter_unsolved: self.filter_unsolved,
				poll_interval_seconds: 5,
			},
			batch: BatchConfig {
				duration_seconds: self.duration_seconds,
				finality_margin_seconds: self.finality_margin_seconds,
			},
			networks,
			solvers: self.solvers,
			storage: StorageConfig {
				primary: storage_primary.clone(),
				implementations: HashMap::from([(storage_primary, storage_table)]),
				buckets: HashMap::new(),
				result_file: DEFAULT_RESULT_FILE.to_string(),
				graph_file: DEFAULT_GRAPH_FILE.to_string(),
			},
			indexer: IndexerConfig {
				primary: indexer_primary.clone(),
				implementations: HashMap::from([(indexer_primary, indexer_table)]),
			},
			api: self.api,
		}
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_is_valid() {
		let config = ConfigBuilder::new().batch_count(3).build();
		assert!(config.validate().is_ok());
		assert_eq!(config.explorer.batch_count, 3);
		assert_eq!(
			config.networks[&Network::Mainnet].instance_namespace,
			"data/mainnet_prod/standard-solver/instances"
		);
	}
}
