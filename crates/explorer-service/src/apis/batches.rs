//! Batch timeline endpoints.

use super::{explorer_error, parse_network};
use explorer_config::ExplorerConfig;
use explorer_core::{BatchExplorer, TimelineMonitor};
use explorer_types::{APIError, BatchSummary, BatchesQuery, TimelineResponse};

/// Largest window a single request may ask for.
pub const MAX_BATCH_COUNT: usize = 1000;

/// Recent batches, fetched for this request.
pub async fn list_batches(
	query: BatchesQuery,
	explorer: &BatchExplorer,
	defaults: &ExplorerConfig,
) -> Result<Vec<BatchSummary>, APIError> {
	let count = query.count.unwrap_or(defaults.batch_count);
	if count == 0 || count > MAX_BATCH_COUNT {
		return Err(APIError::bad_request(format!(
			"count must be between 1 and {}",
			MAX_BATCH_COUNT
		)));
	}
	let filter_unsolved = query.filter_unsolved.unwrap_or(defaults.filter_unsolved);
	let network = parse_network(query.network.as_deref(), defaults.network)?;

	let batches = explorer
		.latest_batch_solutions(count, filter_unsolved, network)
		.await
		.map_err(explorer_error)?;
	Ok(batches.iter().map(|batch| explorer.summarize(batch)).collect())
}

/// Batches from the background monitor's last successful poll.
pub async fn latest_timeline(
	monitor: &TimelineMonitor,
	explorer: &BatchExplorer,
) -> Result<TimelineResponse, APIError> {
	let snapshot = monitor
		.snapshot()
		.await
		.ok_or_else(|| APIError::not_found("No timeline has been fetched yet"))?;
	Ok(TimelineResponse {
		updated_at: snapshot.updated_at,
		batches: snapshot
			.batches
			.iter()
			.map(|batch| explorer.summarize(batch))
			.collect(),
	})
}
