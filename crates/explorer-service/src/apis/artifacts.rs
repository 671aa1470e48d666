//! Artifact lookups for single batches.

use super::explorer_error;
use explorer_core::BatchExplorer;
use explorer_types::{APIError, Batch, InstanceResponse, Network, ResultData};

/// Link to the problem instance of a batch.
pub async fn find_instance(
	network: Network,
	batch: Batch,
	explorer: &BatchExplorer,
) -> Result<InstanceResponse, APIError> {
	let url = explorer
		.find_instance(network, batch)
		.await
		.map_err(explorer_error)?
		.ok_or_else(|| {
			APIError::not_found(format!("No instance published for batch {} on {}", batch, network))
		})?;
	Ok(InstanceResponse {
		batch,
		network,
		url,
	})
}

/// Name and artifact links of a registered solver for a batch.
pub async fn find_result(
	network: Network,
	batch: Batch,
	address: &str,
	explorer: &BatchExplorer,
) -> Result<ResultData, APIError> {
	explorer
		.find_result(network, batch, address)
		.await
		.map_err(explorer_error)?
		.ok_or_else(|| APIError::not_found(format!("Solver {} is not registered on {}", address, network)))
}
