//! API types for the explorer HTTP endpoints.
//!
//! This module defines the presentation-ready views returned to clients and
//! the structured error type shared by all handlers.

use crate::{Batch, Network, SolutionState, SolveTimeRemaining, SolverAddress};
use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Display status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
	Solving,
	NoSolution,
	Solved,
}

impl From<&SolutionState> for BatchStatus {
	fn from(state: &SolutionState) -> Self {
		match state {
			SolutionState::Pending => BatchStatus::Solving,
			SolutionState::Empty => BatchStatus::NoSolution,
			SolutionState::Found(_) => BatchStatus::Solved,
		}
	}
}

/// The displayed solution of a solved batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSolution {
	pub solver: SolverAddress,
	/// Registry name, or "Unknown Solver".
	pub solver_name: String,
	pub tx_hash: String,
	/// Shortened hash for display.
	pub tx_short: String,
	pub tx_link: String,
	#[serde(with = "crate::solution::u256_serde")]
	pub fee_reward: U256,
	#[serde(with = "crate::solution::u256_serde")]
	pub objective_value: U256,
	pub reverted: bool,
	/// Number of competing submissions for the batch.
	pub submissions: usize,
}

/// Countdown for a batch in its solving window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveTimer {
	/// Seconds until the finality margin starts.
	pub remaining: u64,
	/// Seconds until the window closes.
	pub window_remaining: u64,
	/// `window_remaining` formatted as `m:ss`.
	pub display: String,
	/// Whether the batch is inside its finality margin.
	pub r#final: bool,
}

impl From<SolveTimeRemaining> for SolveTimer {
	fn from(remaining: SolveTimeRemaining) -> Self {
		Self {
			remaining: remaining.until_final,
			window_remaining: remaining.until_window_end,
			display: crate::format_time(remaining.until_window_end),
			r#final: remaining.is_final(),
		}
	}
}

/// Presentation view of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
	pub batch: Batch,
	pub network: Network,
	pub starts_at: DateTime<Utc>,
	pub ends_at: DateTime<Utc>,
	pub status: BatchStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lead: Option<LeadSolution>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timer: Option<SolveTimer>,
}

/// Query parameters of batch listings.
///
/// Absent parameters fall back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchesQuery {
	pub count: Option<usize>,
	pub filter_unsolved: Option<bool>,
	pub network: Option<String>,
}

/// Query parameters selecting a network.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkQuery {
	pub network: Option<String>,
}

/// Latest timeline produced by the background monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineResponse {
	/// UNIX timestamp of the poll that produced the batches.
	pub updated_at: u64,
	pub batches: Vec<BatchSummary>,
}

/// Response for instance lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceResponse {
	pub batch: Batch,
	pub network: Network,
	pub url: Url,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed request parameters (400)
	BadRequest { error_type: String, message: String },
	/// Requested resource is not known yet (404)
	NotFound { error_type: String, message: String },
	/// Upstream indexer or storage failure (502)
	BadGateway { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::BadGateway { .. } => 502,
			APIError::InternalServerError { .. } => 500,
		}
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		APIError::NotFound {
			error_type: "NOT_FOUND".to_string(),
			message: message.into(),
		}
	}

	pub fn bad_request(message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: "INVALID_REQUEST".to_string(),
			message: message.into(),
		}
	}

	pub fn bad_gateway(message: impl Into<String>) -> Self {
		APIError::BadGateway {
			error_type: "UPSTREAM_FAILURE".to_string(),
			message: message.into(),
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::BadGateway {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message),
		};
		ErrorResponse {
			error: error_type.clone(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::BadGateway { message, .. } => write!(f, "Bad Gateway: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
