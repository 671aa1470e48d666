//! Builder pattern for constructing batch explorers.
//!
//! Provides a flexible way to compose a BatchExplorer from configuration
//! using factory functions for the pluggable listing and indexer backends.

use crate::{BatchExplorer, BatchFetcher, SolverRegistry};
use explorer_config::Config;
use explorer_indexer::{IndexerError, IndexerInterface, IndexerService};
use explorer_storage::{
	ArtifactResolver, ListingInterface, ResolverSettings, StorageError, StorageService,
};
use explorer_types::{BatchClock, NetworksConfig, SystemTimeSource, TimeSource};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors that can occur during explorer construction.
///
/// These errors indicate problems with configuration or missing required components
/// when building an explorer instance.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for the factory functions needed to build a BatchExplorer.
///
/// Each factory takes the implementation's TOML table and returns the
/// corresponding backend.
pub struct ExplorerFactories<SF, IF> {
	pub storage_factories: HashMap<String, SF>,
	pub indexer_factories: HashMap<String, IF>,
}

/// Builder for constructing a BatchExplorer with pluggable implementations.
pub struct ExplorerBuilder {
	config: Config,
	time: Arc<dyn TimeSource>,
}

impl ExplorerBuilder {
	/// Creates a new ExplorerBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			time: Arc::new(SystemTimeSource),
		}
	}

	/// Replaces the system clock, mainly for tests.
	pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
		self.time = time;
		self
	}

	/// Builds the BatchExplorer using the factories for each backend type.
	///
	/// Only the primary implementation of each section is instantiated.
	pub fn build<SF, IF>(self, factories: ExplorerFactories<SF, IF>) -> Result<BatchExplorer, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn ListingInterface>, StorageError>,
		IF: Fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn IndexerInterface>, IndexerError>,
	{
		let clock = BatchClock::new(
			self.config.batch.duration_seconds,
			self.config.batch.finality_margin_seconds,
			self.time.clone(),
		)
		.map_err(|e| BuilderError::Config(e.to_string()))?;

		// Create the listing backend
		let storage_primary = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(storage_primary)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage implementation '{}'", storage_primary))
			})?;
		let storage_factory = factories.storage_factories.get(storage_primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", storage_primary))
		})?;
		let storage_backend = match storage_factory(storage_config) {
			Ok(backend) => {
				tracing::info!(component = "storage", implementation = %storage_primary, "Loaded");
				backend
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %storage_primary,
					error = %e,
					"Failed to create storage implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					storage_primary, e
				)));
			},
		};

		// Create the indexer backend
		let indexer_primary = &self.config.indexer.primary;
		let indexer_config = self
			.config
			.indexer
			.implementations
			.get(indexer_primary)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("indexer implementation '{}'", indexer_primary))
			})?;
		let indexer_factory = factories.indexer_factories.get(indexer_primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown indexer implementation '{}'", indexer_primary))
		})?;
		let indexer_backend = match indexer_factory(indexer_config, &self.config.networks) {
			Ok(backend) => {
				tracing::info!(component = "indexer", implementation = %indexer_primary, "Loaded");
				backend
			},
			Err(e) => {
				tracing::error!(
					component = "indexer",
					implementation = %indexer_primary,
					error = %e,
					"Failed to create indexer implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create indexer implementation '{}': {}",
					indexer_primary, e
				)));
			},
		};

		let registry = SolverRegistry::from_entries(self.config.active_solvers())
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		let mut settings = ResolverSettings::new(self.config.networks.clone());
		settings.result_file = self.config.storage.result_file.clone();
		settings.graph_file = self.config.storage.graph_file.clone();
		for (bucket, location) in &self.config.storage.buckets {
			let base_url = Url::parse(&location.base_url).map_err(|e| {
				BuilderError::Config(format!("Invalid base_url for bucket '{}': {}", bucket, e))
			})?;
			settings.buckets.insert(bucket.clone(), base_url);
		}

		let resolver = ArtifactResolver::new(
			StorageService::new(storage_backend),
			clock.clone(),
			settings,
		);
		let fetcher = BatchFetcher::new(Arc::new(IndexerService::new(indexer_backend)), clock.clone());

		tracing::info!(
			environment = %self.config.explorer.environment,
			network = %self.config.explorer.network,
			duration = clock.duration(),
			finality = clock.finality(),
			"Explorer built"
		);
		Ok(BatchExplorer::new(
			clock,
			fetcher,
			registry,
			Arc::new(resolver),
			self.config.networks,
		))
	}
}
