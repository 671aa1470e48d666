//! Handlers behind the `/api` routes.

pub mod artifacts;
pub mod batches;
pub mod proxy;

use explorer_core::ExplorerError;
use explorer_storage::StorageError;
use explorer_types::{APIError, Network};

/// Maps explorer failures to API errors.
///
/// Configuration problems are caused by the request (an unconfigured
/// network); everything else is an upstream failure.
pub fn explorer_error(error: ExplorerError) -> APIError {
	match error {
		ExplorerError::Config(message) => APIError::bad_request(message),
		ExplorerError::Storage(StorageError::Configuration(message)) => {
			APIError::bad_request(message)
		},
		ExplorerError::Indexer(e) => APIError::bad_gateway(e.to_string()),
		ExplorerError::Storage(e) => APIError::bad_gateway(e.to_string()),
	}
}

/// Parses an optional network parameter, falling back to `default`.
pub fn parse_network(raw: Option<&str>, default: Network) -> Result<Network, APIError> {
	match raw {
		Some(raw) => raw.parse().map_err(APIError::bad_request),
		None => Ok(default),
	}
}
