//! S3 listing backend.
//!
//! Lists public buckets through the `ListObjectsV2` REST call
//! (`GET <base>?list-type=2&prefix=<p>&delimiter=/`) and parses the XML
//! payload. A payload that cannot be parsed yields an empty listing, so a
//! misbehaving endpoint degrades to "no artifacts" instead of an error.

use crate::{BucketLocation, ListingInterface, StorageError};
use async_trait::async_trait;
use explorer_types::{ConfigSchema, Field, FieldType, Listing, Schema, ValidationError};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_PAGES: usize = 10;

/// `ListBucketResult` document, restricted to the fields the explorer reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
	#[serde(default)]
	contents: Vec<Contents>,
	#[serde(default)]
	common_prefixes: Vec<CommonPrefix>,
	#[serde(default)]
	is_truncated: bool,
	#[serde(default)]
	next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contents {
	key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
	prefix: String,
}

/// Parses a `ListBucketResult` payload.
///
/// Returns `None` when the payload is not a listing document.
fn parse_listing(xml: &str) -> Option<ListBucketResult> {
	quick_xml::de::from_str(xml).ok()
}

/// S3 listing implementation.
pub struct S3Listing {
	client: reqwest::Client,
	max_pages: usize,
}

impl S3Listing {
	/// Creates a listing backend with the given request timeout.
	pub fn new(timeout: Duration, max_pages: usize) -> Result<Self, StorageError> {
		let client = reqwest::Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(4)
			.timeout(timeout)
			.build()
			.map_err(|e| StorageError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self { client, max_pages })
	}

	async fn fetch_page(
		&self,
		bucket: &BucketLocation,
		prefix: &str,
		continuation: Option<&str>,
	) -> Result<String, StorageError> {
		let mut url = bucket.base_url.clone();
		{
			let mut query = url.query_pairs_mut();
			query
				.append_pair("list-type", "2")
				.append_pair("prefix", prefix)
				.append_pair("delimiter", "/");
			if let Some(token) = continuation {
				query.append_pair("continuation-token", token);
			}
		}

		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| StorageError::Network(format!("Listing {} failed: {}", bucket.name, e)))?;

		let status = response.status();
		if !status.is_success() {
			return Err(StorageError::Network(format!(
				"Listing {} returned status {}",
				bucket.name, status
			)));
		}

		response
			.text()
			.await
			.map_err(|e| StorageError::Network(format!("Reading listing of {} failed: {}", bucket.name, e)))
	}
}

#[async_trait]
impl ListingInterface for S3Listing {
	async fn list(&self, bucket: &BucketLocation, prefix: &str) -> Result<Listing, StorageError> {
		let mut listing = Listing::default();
		let mut continuation: Option<String> = None;

		for page in 0..self.max_pages {
			let body = self
				.fetch_page(bucket, prefix, continuation.as_deref())
				.await?;
			let Some(result) = parse_listing(&body) else {
				tracing::warn!(
					bucket = %bucket.name,
					prefix,
					page,
					"Unparsable listing response, treating as empty"
				);
				return Ok(Listing::default());
			};

			listing
				.keys
				.extend(result.contents.into_iter().map(|c| c.key));
			listing
				.prefixes
				.extend(result.common_prefixes.into_iter().map(|p| p.prefix));

			match result.next_continuation_token {
				Some(token) if result.is_truncated => continuation = Some(token),
				_ => return Ok(listing),
			}
		}

		tracing::warn!(
			bucket = %bucket.name,
			prefix,
			max_pages = self.max_pages,
			"Listing truncated after page limit"
		);
		Ok(listing)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(S3ListingSchema)
	}
}

/// Configuration schema for S3Listing.
pub struct S3ListingSchema;

impl ConfigSchema for S3ListingSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new(
					"max_pages",
					FieldType::Integer {
						min: Some(1),
						max: Some(100),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create an S3 listing backend from configuration.
///
/// Configuration parameters:
/// - `timeout_seconds`: request timeout (default: 30)
/// - `max_pages`: maximum number of result pages per listing (default: 10)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn ListingInterface>, StorageError> {
	S3ListingSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {}", e)))?;

	let timeout = config
		.get("timeout_seconds")
		.and_then(toml::Value::as_integer)
		.and_then(|v| u64::try_from(v).ok())
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
	let max_pages = config
		.get("max_pages")
		.and_then(toml::Value::as_integer)
		.and_then(|v| usize::try_from(v).ok())
		.unwrap_or(DEFAULT_MAX_PAGES);

	Ok(Box::new(S3Listing::new(
		Duration::from_secs(timeout),
		max_pages,
	)?))
}

/// Registry for the S3 listing implementation.
pub struct Registry;

impl explorer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "s3";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
