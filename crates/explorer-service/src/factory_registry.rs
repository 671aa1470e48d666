//! Dynamic factory registry for explorer backends.
//!
//! This module provides a centralized registry for all factory functions,
//! allowing the listing and indexer backends to be chosen by configuration.

use explorer_config::Config;
use explorer_core::{BatchExplorer, ExplorerBuilder, ExplorerFactories};
use explorer_indexer::IndexerFactory;
use explorer_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub indexer: HashMap<String, IndexerFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			indexer: HashMap::new(),
		}
	}

	/// Register a listing implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Register an indexer implementation
	pub fn register_indexer(&mut self, name: impl Into<String>, factory: IndexerFactory) {
		self.indexer.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, registering every implementation on
/// first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in explorer_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in explorer_indexer::get_all_implementations() {
			tracing::debug!("Registering indexer implementation: {}", name);
			registry.register_indexer(name, factory);
		}

		registry
	})
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the explorer using the registry and config
pub fn build_explorer_from_config(
	config: Config,
) -> Result<BatchExplorer, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let indexer_factories =
		build_factories!(registry, config.indexer.implementations, indexer, "indexer");

	let factories = ExplorerFactories {
		storage_factories,
		indexer_factories,
	};

	Ok(ExplorerBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use explorer_config::builders::config::ConfigBuilder;

	#[test]
	fn test_registry_contains_all_backends() {
		let registry = get_registry();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("s3"));
		assert!(registry.indexer.contains_key("memory"));
		assert!(registry.indexer.contains_key("graph"));
	}

	#[test]
	fn test_build_with_memory_backends() {
		let config = ConfigBuilder::new().build();
		assert!(build_explorer_from_config(config).is_ok());
	}

	#[test]
	fn test_unknown_implementation_lists_available() {
		let config = ConfigBuilder::new()
			.indexer("postgres", toml::Value::Table(toml::map::Map::new()))
			.build();
		let err = build_explorer_from_config(config).err().unwrap().to_string();
		assert!(err.contains("Unknown indexer implementation 'postgres'"));
		assert!(err.contains("graph, memory"));
	}
}
