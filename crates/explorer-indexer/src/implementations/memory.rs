//! In-memory indexer implementation for testing and development.
//!
//! Holds a fixed set of indexed batches per network, configured in TOML or
//! recorded at runtime. Failures can be injected to exercise callers' error
//! paths.

use crate::{BatchQuery, IndexerError, IndexerFactory, IndexerInterface, IndexerRegistry};
use async_trait::async_trait;
use explorer_types::{
	Batch, ConfigSchema, Field, FieldType, ImplementationRegistry, IndexedBatch, Network,
	NetworksConfig, Schema, Solution, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Configuration for the memory indexer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryIndexerConfig {
	/// Batches known from the start.
	#[serde(default)]
	pub batches: Vec<MemoryBatch>,
}

/// One configured batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBatch {
	pub network: Network,
	pub batch: Batch,
	/// Solutions, most recent first.
	#[serde(default)]
	pub solutions: Vec<Solution>,
}

/// Configuration schema for MemoryIndexer.
pub struct MemoryIndexerSchema;

impl ConfigSchema for MemoryIndexerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let batch = Schema::new(
			vec![
				Field::new("network", FieldType::String),
				Field::new(
					"batch",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
			],
			vec![],
		);
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("batches", FieldType::Array(Box::new(FieldType::Table(batch))))
					.with_validator(|value| {
						let mut seen = HashSet::new();
						for entry in value.as_array().into_iter().flatten() {
							let network = entry.get("network").and_then(toml::Value::as_str);
							let batch = entry.get("batch").and_then(toml::Value::as_integer);
							if !seen.insert((network, batch)) {
								return Err(format!(
									"batch {} listed twice for {}",
									batch.unwrap_or_default(),
									network.unwrap_or_default()
								));
							}
						}
						Ok(())
					}),
			],
		);
		schema.validate(config)
	}
}

/// In-memory indexer.
pub struct MemoryIndexer {
	batches: RwLock<HashMap<Network, BTreeMap<Batch, Vec<Solution>>>>,
	failing: AtomicBool,
	queries: AtomicUsize,
}

impl MemoryIndexer {
	pub fn new(config: MemoryIndexerConfig) -> Self {
		let mut batches: HashMap<Network, BTreeMap<Batch, Vec<Solution>>> = HashMap::new();
		for entry in &config.batches {
			batches
				.entry(entry.network)
				.or_default()
				.insert(entry.batch, entry.solutions.clone());
		}
		Self {
			batches: RwLock::new(batches),
			failing: AtomicBool::new(false),
			queries: AtomicUsize::new(0),
		}
	}

	/// Records `solutions` for `batch`, replacing what was there.
	pub async fn record(&self, network: Network, batch: Batch, solutions: Vec<Solution>) {
		self.batches
			.write()
			.await
			.entry(network)
			.or_default()
			.insert(batch, solutions);
	}

	/// Makes subsequent queries fail until reset.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	/// Number of queries served, including failed ones.
	pub fn query_count(&self) -> usize {
		self.queries.load(Ordering::SeqCst)
	}
}

impl Default for MemoryIndexer {
	fn default() -> Self {
		Self::new(MemoryIndexerConfig::default())
	}
}

#[async_trait]
impl IndexerInterface for MemoryIndexer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryIndexerSchema)
	}

	async fn query_batches(
		&self,
		network: Network,
		query: BatchQuery,
	) -> Result<Vec<IndexedBatch>, IndexerError> {
		self.queries.fetch_add(1, Ordering::SeqCst);
		if self.failing.load(Ordering::SeqCst) {
			return Err(IndexerError::Network("Memory indexer set to fail".to_string()));
		}

		let batches = self.batches.read().await;
		let Some(known) = batches.get(&network) else {
			return Ok(Vec::new());
		};

		let descending = known.iter().rev().map(|(batch, solutions)| IndexedBatch {
			batch: *batch,
			solutions: solutions.clone(),
		});
		Ok(match query {
			BatchQuery::Latest(count) => descending.take(count).collect(),
			BatchQuery::After(after) => descending.take_while(|b| b.batch > after).collect(),
		})
	}
}

/// Registry for the memory indexer implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = IndexerFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value, _networks: &NetworksConfig| -> Result<Box<dyn IndexerInterface>, IndexerError> {
			MemoryIndexerSchema
				.validate(config)
				.map_err(|e| IndexerError::Configuration(format!("Invalid configuration: {}", e)))?;
			let memory_config: MemoryIndexerConfig = config
				.clone()
				.try_into()
				.map_err(|e| IndexerError::Configuration(format!("Invalid memory config: {}", e)))?;

			Ok(Box::new(MemoryIndexer::new(memory_config)))
		}
	}
}

impl IndexerRegistry for Registry {}
