//! Batch indexer module for the batch explorer.
//!
//! This module queries the authoritative record of solved batches. Backends
//! return raw indexed batches, most recent first; reconciling them with the
//! batch currently being solved is left to the caller.

use async_trait::async_trait;
use explorer_types::{Batch, ConfigSchema, ImplementationRegistry, IndexedBatch, Network, NetworksConfig};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod graph;
	pub mod memory;
}

/// Errors that can occur during indexer queries.
#[derive(Debug, Error)]
pub enum IndexerError {
	/// Error that occurs when the indexer cannot be reached or answers with a
	/// failure status.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when no endpoint is configured for a network.
	#[error("Network {0} is not configured")]
	UnknownNetwork(Network),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Which batches to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchQuery {
	/// The `count` most recent indexed batches.
	Latest(usize),
	/// Every indexed batch with an index greater than the given one.
	After(Batch),
}

/// Trait defining the interface for indexer backends.
#[async_trait]
pub trait IndexerInterface: Send + Sync {
	/// Returns the configuration schema for this indexer implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fetches indexed batches of `network`, highest batch first, each with
	/// its solutions most recent first.
	///
	/// A response that cannot be interpreted yields no batches rather than an
	/// error; only transport failures are errors.
	async fn query_batches(
		&self,
		network: Network,
		query: BatchQuery,
	) -> Result<Vec<IndexedBatch>, IndexerError>;
}

/// Type alias for indexer factory functions.
///
/// This is the function signature that all indexer implementations must provide
/// to create instances of their indexer interface.
pub type IndexerFactory =
	fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn IndexerInterface>, IndexerError>;

/// Registry trait for indexer implementations.
pub trait IndexerRegistry: ImplementationRegistry<Factory = IndexerFactory> {}

/// Get all registered indexer implementations.
///
/// Returns a vector of (name, factory) tuples for all available indexer implementations.
pub fn get_all_implementations() -> Vec<(&'static str, IndexerFactory)> {
	use implementations::{graph, memory};

	vec![
		(graph::Registry::NAME, graph::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service wrapping the configured indexer backend.
pub struct IndexerService {
	backend: Box<dyn IndexerInterface>,
}

impl IndexerService {
	pub fn new(backend: Box<dyn IndexerInterface>) -> Self {
		Self { backend }
	}

	/// Fetches indexed batches, see [`IndexerInterface::query_batches`].
	pub async fn query_batches(
		&self,
		network: Network,
		query: BatchQuery,
	) -> Result<Vec<IndexedBatch>, IndexerError> {
		let batches = self.backend.query_batches(network, query).await?;
		tracing::debug!(%network, ?query, returned = batches.len(), "Indexer query finished");
		Ok(batches)
	}
}
