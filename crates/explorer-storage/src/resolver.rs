//! Artifact directory resolver.
//!
//! Resolves problem instances and solver results for a batch by listing the
//! date-partitioned folders they are published to. Resolved links are cached
//! for the lifetime of the process.

use crate::{ArtifactCache, BucketLocation, StorageError, StorageService};
use explorer_types::{
	object_url, partition_prefix, ArtifactLinks, ArtifactName, Batch, BatchClock, Listing,
	Network, NetworksConfig, ResultData, SolverData, DEFAULT_GRAPH_FILE, DEFAULT_RESULT_FILE,
};
use std::collections::HashMap;
use url::Url;

/// Static settings of the resolver.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
	/// Per-network instance locations.
	pub networks: NetworksConfig,
	/// Base URL overrides per bucket name.
	pub buckets: HashMap<String, Url>,
	/// File linked as the result inside a result folder.
	pub result_file: String,
	/// File linked as the solution graph inside a result folder.
	pub graph_file: String,
}

impl ResolverSettings {
	pub fn new(networks: NetworksConfig) -> Self {
		Self {
			networks,
			buckets: HashMap::new(),
			result_file: DEFAULT_RESULT_FILE.to_string(),
			graph_file: DEFAULT_GRAPH_FILE.to_string(),
		}
	}

	fn bucket(&self, name: &str) -> Result<BucketLocation, StorageError> {
		match self.buckets.get(name) {
			Some(base_url) => Ok(BucketLocation {
				name: name.to_string(),
				base_url: base_url.clone(),
			}),
			None => BucketLocation::public(name),
		}
	}
}

/// Resolves artifact links from storage listings.
pub struct ArtifactResolver {
	storage: StorageService,
	clock: BatchClock,
	settings: ResolverSettings,
	instances: ArtifactCache<(Network, Batch), Url>,
	/// Keyed by the solver's bucket and namespace, not its address.
	results: ArtifactCache<ResultKey, ArtifactLinks>,
}

/// Bucket, namespace and batch of a published result.
type ResultKey = (String, String, Batch);

impl ArtifactResolver {
	pub fn new(storage: StorageService, clock: BatchClock, settings: ResolverSettings) -> Self {
		Self {
			storage,
			clock,
			settings,
			instances: ArtifactCache::new(),
			results: ArtifactCache::new(),
		}
	}

	/// Link to the problem instance of `batch` on `network`.
	///
	/// On a cache miss the instance folder of the batch's day is listed once,
	/// shared with concurrent callers, and every instance found in it is
	/// cached. If the batch is still missing the folder is listed once more
	/// with a dedicated request, since the instance may have been published
	/// after the shared listing started.
	pub async fn find_instance(
		&self,
		network: Network,
		batch: Batch,
	) -> Result<Option<Url>, StorageError> {
		if let Some(url) = self.instances.get(&(network, batch)).await {
			return Ok(Some(url));
		}

		let config = self.settings.networks.get(&network).ok_or_else(|| {
			StorageError::Configuration(format!("Network {} is not configured", network))
		})?;
		let bucket = self.settings.bucket(&config.instance_bucket)?;
		let prefix = partition_prefix(&config.instance_namespace, self.clock.batch_date(batch));

		let listing = self.storage.list_shared(&bucket, &prefix).await?;
		self.cache_instances(network, &bucket, &listing).await;
		if let Some(url) = self.instances.get(&(network, batch)).await {
			return Ok(Some(url));
		}

		tracing::debug!(%network, batch, prefix, "Instance not in shared listing, listing again");
		let listing = self.storage.list(&bucket, &prefix).await?;
		self.cache_instances(network, &bucket, &listing).await;
		Ok(self.instances.get(&(network, batch)).await)
	}

	async fn cache_instances(&self, network: Network, bucket: &BucketLocation, listing: &Listing) {
		let found = listing
			.artifacts()
			.map(|artifact| {
				(
					(network, artifact.batch),
					object_url(&bucket.base_url, artifact.path),
				)
			})
			.collect::<Vec<_>>();
		let inserted = self.instances.upgrade_all(found).await;
		if inserted > 0 {
			tracing::debug!(%network, bucket = %bucket.name, inserted, "Cached instance links");
		}
	}

	/// Result of `solver` for `batch`.
	///
	/// Lists the solver's result folder for the batch's day and links the
	/// result and graph files of the folder named after the batch. A solver
	/// that has not published anything for the batch yields its name without
	/// links.
	pub async fn find_result(
		&self,
		batch: Batch,
		solver: &SolverData,
	) -> Result<ResultData, StorageError> {
		let key = (solver.bucket.clone(), solver.namespace.clone(), batch);
		if let Some(links) = self.results.get(&key).await {
			return Ok(ResultData {
				solver: solver.name.clone(),
				links: Some(links),
			});
		}

		let bucket = self.settings.bucket(&solver.bucket)?;
		let namespace = format!("{}/results", solver.namespace.trim_end_matches('/'));
		let prefix = partition_prefix(&namespace, self.clock.batch_date(batch));

		let listing = self.storage.list_shared(&bucket, &prefix).await?;
		let links = listing
			.artifacts()
			.find(|artifact| artifact.batch == batch)
			.map(|artifact| self.result_links(&bucket, artifact));

		if let Some(links) = &links {
			self.results.upgrade(key, links.clone()).await;
		}
		Ok(ResultData {
			solver: solver.name.clone(),
			links,
		})
	}

	fn result_links(&self, bucket: &BucketLocation, artifact: ArtifactName<'_>) -> ArtifactLinks {
		let folder = artifact.path.trim_end_matches('/');
		ArtifactLinks {
			result: object_url(
				&bucket.base_url,
				&format!("{}/{}", folder, self.settings.result_file),
			),
			graph: object_url(
				&bucket.base_url,
				&format!("{}/{}", folder, self.settings.graph_file),
			),
		}
	}
}
