//! In-memory listing backend implementation.
//!
//! This module provides a memory-based implementation of the ListingInterface
//! trait, useful for testing and development scenarios where no object
//! storage is reachable. Objects are configured per bucket as full keys.

use crate::{BucketLocation, ListingInterface, StorageError};
use async_trait::async_trait;
use explorer_types::{ConfigSchema, Field, FieldType, Listing, Schema, ValidationError};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory listing implementation.
///
/// Keys are kept per bucket in a sorted set so listings come back in the
/// same lexicographic order S3 uses.
pub struct MemoryListing {
	/// Object keys per bucket name.
	objects: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
	/// Simulated latency of every listing.
	latency: Option<Duration>,
	/// Number of listings served.
	calls: AtomicUsize,
}

impl MemoryListing {
	/// Creates an empty MemoryListing instance.
	pub fn new() -> Self {
		Self {
			objects: Arc::new(RwLock::new(HashMap::new())),
			latency: None,
			calls: AtomicUsize::new(0),
		}
	}

	/// Delays every listing by `latency`.
	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	/// Adds an object to `bucket`.
	pub async fn insert(&self, bucket: &str, key: impl Into<String>) {
		self.objects
			.write()
			.await
			.entry(bucket.to_string())
			.or_default()
			.insert(key.into());
	}

	/// Number of listings served so far.
	pub fn list_calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl Default for MemoryListing {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ListingInterface for MemoryListing {
	async fn list(&self, bucket: &BucketLocation, prefix: &str) -> Result<Listing, StorageError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}

		let objects = self.objects.read().await;
		let mut listing = Listing::default();
		let Some(keys) = objects.get(&bucket.name) else {
			return Ok(listing);
		};

		for key in keys.iter().filter(|key| key.starts_with(prefix)) {
			let rest = &key[prefix.len()..];
			match rest.find('/') {
				Some(idx) => {
					let folder = &key[..prefix.len() + idx + 1];
					if listing.prefixes.last().map(String::as_str) != Some(folder) {
						listing.prefixes.push(folder.to_string());
					}
				},
				None => listing.keys.push(key.clone()),
			}
		}
		Ok(listing)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryListingSchema)
	}
}

/// Configuration schema for MemoryListing.
pub struct MemoryListingSchema;

impl ConfigSchema for MemoryListingSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"latency_ms",
				FieldType::Integer {
					min: Some(0),
					max: Some(60_000),
				},
			)],
		);
		schema.validate(config)?;

		// Bucket names are free-form, so check the object table by hand
		if let Some(objects) = config.get("objects") {
			let buckets = objects.as_table().ok_or_else(|| ValidationError::TypeMismatch {
				field: "objects".to_string(),
				expected: "table".to_string(),
				actual: objects.type_str().to_string(),
			})?;
			for (bucket, keys) in buckets {
				let keys_ok = keys
					.as_array()
					.is_some_and(|keys| keys.iter().all(toml::Value::is_str));
				if !keys_ok {
					return Err(ValidationError::InvalidValue {
						field: format!("objects.{}", bucket),
						message: "must be an array of object keys".to_string(),
					});
				}
			}
		}
		Ok(())
	}
}

/// Factory function to create a memory listing backend from configuration.
///
/// Configuration parameters:
/// - `latency_ms`: optional simulated latency per listing
/// - `objects`: optional table mapping bucket names to arrays of object keys
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn ListingInterface>, StorageError> {
	MemoryListingSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {}", e)))?;

	let mut objects: HashMap<String, BTreeSet<String>> = HashMap::new();
	if let Some(buckets) = config.get("objects").and_then(toml::Value::as_table) {
		for (bucket, keys) in buckets {
			let keys = keys
				.as_array()
				.into_iter()
				.flatten()
				.filter_map(toml::Value::as_str)
				.map(str::to_string);
			objects.entry(bucket.clone()).or_default().extend(keys);
		}
	}

	let latency = config
		.get("latency_ms")
		.and_then(toml::Value::as_integer)
		.and_then(|ms| u64::try_from(ms).ok())
		.filter(|ms| *ms > 0)
		.map(Duration::from_millis);

	Ok(Box::new(MemoryListing {
		objects: Arc::new(RwLock::new(objects)),
		latency,
		calls: AtomicUsize::new(0),
	}))
}

/// Registry for the memory listing implementation.
pub struct Registry;

impl explorer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn bucket() -> BucketLocation {
		BucketLocation::public("test-bucket").unwrap()
	}

	#[tokio::test]
	async fn test_listing_is_non_recursive() {
		let storage = MemoryListing::new();
		storage.insert("test-bucket", "ns/2020-08-10/instance_1_a.json").await;
		storage.insert("test-bucket", "ns/2020-08-10/instance_2_b/06.json").await;
		storage.insert("test-bucket", "ns/2020-08-10/instance_2_b/graph.html").await;
		storage.insert("test-bucket", "ns/2020-08-11/instance_300_c.json").await;
		storage.insert("other-bucket", "ns/2020-08-10/instance_9_z.json").await;

		let listing = storage.list(&bucket(), "ns/2020-08-10/").await.unwrap();
		assert_eq!(listing.keys, vec!["ns/2020-08-10/instance_1_a.json"]);
		assert_eq!(listing.prefixes, vec!["ns/2020-08-10/instance_2_b/"]);
		assert_eq!(storage.list_calls(), 1);
	}

	#[tokio::test]
	async fn test_unknown_bucket_is_empty() {
		let storage = MemoryListing::new();
		let listing = storage.list(&bucket(), "ns/").await.unwrap();
		assert_eq!(listing, Listing::default());
	}

	#[tokio::test]
	async fn test_create_from_config() {
		let config: toml::Value = toml::from_str(
			r#"
latency_ms = 0
[objects]
test-bucket = ["ns/2020-08-10/instance_1_a.json"]
"#,
		)
		.unwrap();
		let storage = create_storage(&config).unwrap();
		let listing = storage.list(&bucket(), "ns/2020-08-10/").await.unwrap();
		assert_eq!(listing.keys.len(), 1);
	}

	#[test]
	fn test_invalid_objects_rejected() {
		let config: toml::Value = toml::from_str("[objects]\ntest-bucket = [1, 2]").unwrap();
		let err = MemoryListingSchema.validate(&config).unwrap_err();
		assert!(err.to_string().contains("objects.test-bucket"));
	}
}
