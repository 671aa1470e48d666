//! Core engine of the batch explorer.
//!
//! This module ties batch arithmetic, the indexer, the solver registry and
//! the artifact resolver together behind [`BatchExplorer`], the single entry
//! point used by the service. It also provides the periodic
//! [`monitor::TimelineMonitor`] and the [`builder::ExplorerBuilder`] that
//! assembles an explorer from configuration.

use explorer_indexer::IndexerError;
use explorer_storage::{ArtifactResolver, StorageError};
use explorer_types::{
	format_tx, Batch, BatchClock, BatchSolutions, BatchStatus, BatchSummary, LeadSolution, Network,
	NetworksConfig, ResultData, SolveTimeRemaining, SolveTimer,
};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub mod builder;
pub mod fetcher;
pub mod monitor;
pub mod registry;

pub use builder::{BuilderError, ExplorerBuilder, ExplorerFactories};
pub use fetcher::BatchFetcher;
pub use monitor::{MonitorSettings, TimelineMonitor, TimelineSnapshot};
pub use registry::SolverRegistry;

/// Errors that can occur during explorer operations.
#[derive(Debug, Error)]
pub enum ExplorerError {
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
	/// Error from the indexer.
	#[error("Indexer error: {0}")]
	Indexer(#[from] IndexerError),
	/// Error from the storage listing backend.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Resolves batches, solvers and artifacts for display.
///
/// The BatchExplorer owns every component it needs:
/// - Clock: maps wall-clock time to batches
/// - Fetcher: recent batches with their solution state
/// - Registry: solver names and artifact locations
/// - Resolver: cached artifact links from storage listings
pub struct BatchExplorer {
	clock: BatchClock,
	fetcher: BatchFetcher,
	registry: SolverRegistry,
	resolver: Arc<ArtifactResolver>,
	networks: NetworksConfig,
}

impl BatchExplorer {
	pub fn new(
		clock: BatchClock,
		fetcher: BatchFetcher,
		registry: SolverRegistry,
		resolver: Arc<ArtifactResolver>,
		networks: NetworksConfig,
	) -> Self {
		Self {
			clock,
			fetcher,
			registry,
			resolver,
			networks,
		}
	}

	pub fn clock(&self) -> &BatchClock {
		&self.clock
	}

	pub fn registry(&self) -> &SolverRegistry {
		&self.registry
	}

	/// Up to `count` recent batches, see [`BatchFetcher::latest_batch_solutions`].
	pub async fn latest_batch_solutions(
		&self,
		count: usize,
		filter_unsolved: bool,
		network: Network,
	) -> Result<Vec<BatchSolutions>, ExplorerError> {
		if !self.networks.contains_key(&network) {
			return Err(ExplorerError::Config(format!(
				"Network {} is not configured",
				network
			)));
		}
		Ok(self
			.fetcher
			.latest_batch_solutions(count, filter_unsolved, network)
			.await?)
	}

	/// Link to the problem instance of `batch`, if it has been published.
	pub async fn find_instance(
		&self,
		network: Network,
		batch: Batch,
	) -> Result<Option<Url>, ExplorerError> {
		Ok(self.resolver.find_instance(network, batch).await?)
	}

	/// Name and artifact links of the solver at `address` for `batch`.
	///
	/// Returns `None` for solvers that are not registered on `network`.
	pub async fn find_result(
		&self,
		network: Network,
		batch: Batch,
		address: &str,
	) -> Result<Option<ResultData>, ExplorerError> {
		let Some(solver) = self.registry.get(network, address) else {
			tracing::debug!(%network, batch, address, "Solver is not registered");
			return Ok(None);
		};
		let result = self.resolver.find_result(batch, solver).await?;
		Ok(Some(result))
	}

	pub fn solve_time_remaining(&self, batch: Batch) -> Option<SolveTimeRemaining> {
		self.clock.solve_time_remaining(batch)
	}

	pub fn time_remaining_in_current_batch(&self) -> u64 {
		self.clock.time_remaining_in_current_batch()
	}

	/// Presentation view of a batch.
	pub fn summarize(&self, batch: &BatchSolutions) -> BatchSummary {
		let network = batch.network;
		let lead = batch.solutions.lead().map(|lead| {
			let tx_link = match self.networks.get(&network) {
				Some(config) => config.tx_link(network, &lead.tx_hash),
				None => format!("{}{}", network.default_tx_explorer(), lead.tx_hash),
			};
			LeadSolution {
				solver: lead.solver.clone(),
				solver_name: self
					.registry
					.display_name(network, lead.solver.as_str())
					.to_string(),
				tx_hash: lead.tx_hash.clone(),
				tx_short: format_tx(&lead.tx_hash),
				tx_link,
				fee_reward: lead.fee_reward,
				objective_value: lead.objective_value,
				reverted: lead.reverted,
				submissions: batch.solutions.solutions().len(),
			}
		});

		BatchSummary {
			batch: batch.batch,
			network,
			starts_at: self.clock.batch_date(batch.batch),
			ends_at: self.clock.batch_date(batch.batch.saturating_add(1)),
			status: BatchStatus::from(&batch.solutions),
			lead,
			timer: self.clock.solve_time_remaining(batch.batch).map(SolveTimer::from),
		}
	}
}
