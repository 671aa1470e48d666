//! Artifact storage module for the batch explorer.
//!
//! Solver runs publish their problem instances and results to object storage.
//! This module lists those folders through pluggable backends, such as the
//! public S3 listing API or an in-memory listing, and resolves the listings
//! into per-batch artifact links.

use async_trait::async_trait;
use explorer_types::{ConfigSchema, ImplementationRegistry, Listing};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod s3;
}

pub mod cache;
pub mod resolver;
pub mod single_flight;

pub use cache::ArtifactCache;
pub use resolver::{ArtifactResolver, ResolverSettings};
pub use single_flight::ListingCoordinator;

/// Errors that can occur during storage operations.
///
/// Cloneable so a shared listing result can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
	/// Error that occurs when the storage endpoint cannot be reached or
	/// answers with a failure status.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Location of a storage bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
	/// Bucket name, as used in configuration.
	pub name: String,
	/// Public base URL objects are listed and linked under.
	pub base_url: Url,
}

impl BucketLocation {
	/// Location of `name` on the public S3 endpoint.
	pub fn public(name: &str) -> Result<Self, StorageError> {
		let base_url = Url::parse(&format!("https://{}.s3.amazonaws.com/", name))
			.map_err(|e| StorageError::Configuration(format!("Invalid bucket '{}': {}", name, e)))?;
		Ok(Self {
			name: name.to_string(),
			base_url,
		})
	}
}

/// Trait defining the interface for listing backends.
///
/// A listing is non-recursive: it returns the objects directly under
/// `prefix` and the sub-folders below it, using `/` as the delimiter.
#[async_trait]
pub trait ListingInterface: Send + Sync {
	/// Lists the entries of `bucket` directly under `prefix`.
	async fn list(&self, bucket: &BucketLocation, prefix: &str) -> Result<Listing, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for listing factory functions.
///
/// This is the function signature that all listing implementations must provide
/// to create instances of their listing interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn ListingInterface>, StorageError>;

/// Registry trait for listing implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered listing implementations.
///
/// Returns a vector of (name, factory) tuples for all available listing implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{memory, s3};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(s3::Registry::NAME, s3::Registry::factory()),
	]
}

/// Listing service combining a backend with single-flight coordination.
pub struct StorageService {
	/// The underlying listing backend implementation.
	backend: Arc<dyn ListingInterface>,
	coordinator: ListingCoordinator,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn ListingInterface>) -> Self {
		let backend: Arc<dyn ListingInterface> = Arc::from(backend);
		Self {
			coordinator: ListingCoordinator::new(backend.clone()),
			backend,
		}
	}

	/// Lists `prefix`, sharing the request with concurrent callers asking
	/// for the same bucket and prefix.
	pub async fn list_shared(
		&self,
		bucket: &BucketLocation,
		prefix: &str,
	) -> Result<Arc<Listing>, StorageError> {
		self.coordinator.list(bucket, prefix).await
	}

	/// Lists `prefix` with a dedicated request.
	pub async fn list(&self, bucket: &BucketLocation, prefix: &str) -> Result<Listing, StorageError> {
		tracing::debug!(bucket = %bucket.name, prefix, "Listing storage prefix");
		self.backend.list(bucket, prefix).await
	}
}
