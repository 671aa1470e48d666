//! GraphQL subgraph indexer.
//!
//! Posts one query per call to the network's subgraph endpoint and maps the
//! `batches` field of the response. Numbers arrive as decimal strings and are
//! parsed exactly; a solution with unparsable numbers is dropped on its own.

use crate::{BatchQuery, IndexerError, IndexerInterface};
use alloy_primitives::U256;
use async_trait::async_trait;
use explorer_types::{
	with_0x_prefix, Batch, ConfigSchema, Field, FieldType, IndexedBatch, Network, NetworksConfig, Schema,
	Solution, SolverAddress, ValidationError,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

const SOLUTION_FIELDS: &str = "solutions(orderBy: createEpoch, orderDirection: desc) { id solver { id } feeReward objectiveValue txHash revertEpoch }";

#[derive(Debug, Deserialize)]
struct GraphResponse {
	data: Option<GraphData>,
	#[serde(default)]
	errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
	#[serde(default)]
	batches: Vec<GraphBatch>,
}

#[derive(Debug, Deserialize)]
struct GraphBatch {
	id: String,
	#[serde(default)]
	solutions: Vec<GraphSolution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSolution {
	solver: GraphSolver,
	fee_reward: String,
	objective_value: String,
	tx_hash: String,
	revert_epoch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphSolver {
	id: String,
}

/// Builds the request body for `query`.
fn request_body(query: BatchQuery) -> serde_json::Value {
	match query {
		BatchQuery::Latest(count) => json!({
			"query": format!(
				"query LatestBatches($first: Int!) {{ batches(first: $first, orderBy: id, orderDirection: desc) {{ id {} }} }}",
				SOLUTION_FIELDS
			),
			"variables": { "first": count },
		}),
		BatchQuery::After(batch) => json!({
			"query": format!(
				"query BatchesAfter($after: ID!) {{ batches(where: {{ id_gt: $after }}, orderBy: id, orderDirection: desc) {{ id {} }} }}",
				SOLUTION_FIELDS
			),
			"variables": { "after": batch.to_string() },
		}),
	}
}

fn parse_solution(raw: GraphSolution) -> Option<Solution> {
	let fee_reward = U256::from_str_radix(&raw.fee_reward, 10).ok()?;
	let objective_value = U256::from_str_radix(&raw.objective_value, 10).ok()?;
	Some(Solution {
		solver: SolverAddress::normalize(&raw.solver.id),
		fee_reward,
		objective_value,
		tx_hash: with_0x_prefix(&raw.tx_hash),
		reverted: raw.revert_epoch.is_some(),
	})
}

/// Maps a response body to indexed batches, highest first.
fn parse_response(network: Network, body: &str) -> Vec<IndexedBatch> {
	let response: GraphResponse = match serde_json::from_str(body) {
		Ok(response) => response,
		Err(e) => {
			tracing::warn!(%network, error = %e, "Malformed indexer response");
			return Vec::new();
		},
	};
	if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
		tracing::warn!(%network, errors = ?errors, "Indexer returned errors");
		return Vec::new();
	}
	let Some(data) = response.data else {
		tracing::warn!(%network, "Indexer response has no data");
		return Vec::new();
	};

	let mut batches: Vec<IndexedBatch> = data
		.batches
		.into_iter()
		.filter_map(|raw| {
			let Ok(batch) = raw.id.parse::<Batch>() else {
				tracing::warn!(%network, id = %raw.id, "Skipping batch with invalid id");
				return None;
			};
			let solutions = raw
				.solutions
				.into_iter()
				.filter_map(|solution| {
					let tx_hash = solution.tx_hash.clone();
					let parsed = parse_solution(solution);
					if parsed.is_none() {
						tracing::warn!(%network, batch, tx_hash = %tx_hash, "Dropping solution with invalid numbers");
					}
					parsed
				})
				.collect();
			Some(IndexedBatch { batch, solutions })
		})
		.collect();

	// Ids are strings on the indexer side; restore numeric order
	batches.sort_by(|a, b| b.batch.cmp(&a.batch));
	batches
}

/// Subgraph-backed indexer.
pub struct GraphIndexer {
	client: reqwest::Client,
	endpoints: HashMap<Network, String>,
}

impl GraphIndexer {
	pub fn new(endpoints: HashMap<Network, String>, timeout: Duration) -> Result<Self, IndexerError> {
		let client = reqwest::Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(4)
			.timeout(timeout)
			.build()
			.map_err(|e| IndexerError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self { client, endpoints })
	}
}

#[async_trait]
impl IndexerInterface for GraphIndexer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(GraphIndexerSchema)
	}

	async fn query_batches(
		&self,
		network: Network,
		query: BatchQuery,
	) -> Result<Vec<IndexedBatch>, IndexerError> {
		let endpoint = self
			.endpoints
			.get(&network)
			.ok_or(IndexerError::UnknownNetwork(network))?;

		let response = self
			.client
			.post(endpoint)
			.json(&request_body(query))
			.send()
			.await
			.map_err(|e| IndexerError::Network(format!("Indexer request failed: {}", e)))?;

		let status = response.status();
		if !status.is_success() {
			return Err(IndexerError::Network(format!(
				"Indexer returned status {}",
				status
			)));
		}

		let body = response
			.text()
			.await
			.map_err(|e| IndexerError::Network(format!("Reading indexer response failed: {}", e)))?;
		Ok(parse_response(network, &body))
	}
}

/// Configuration schema for GraphIndexer.
pub struct GraphIndexerSchema;

impl ConfigSchema for GraphIndexerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a subgraph indexer from configuration.
///
/// Endpoints come from the networks section; each network without an explicit
/// `indexer_url` uses its public subgraph.
///
/// Configuration parameters:
/// - `timeout_seconds`: request timeout (default: 30)
pub fn create_indexer(
	config: &toml::Value,
	networks: &NetworksConfig,
) -> Result<Box<dyn IndexerInterface>, IndexerError> {
	GraphIndexerSchema
		.validate(config)
		.map_err(|e| IndexerError::Configuration(format!("Invalid configuration: {}", e)))?;

	let timeout = config
		.get("timeout_seconds")
		.and_then(toml::Value::as_integer)
		.and_then(|v| u64::try_from(v).ok())
		.unwrap_or(30);

	let endpoints = networks
		.iter()
		.map(|(network, config)| (*network, config.indexer_url_for(*network).to_string()))
		.collect();

	Ok(Box::new(GraphIndexer::new(
		endpoints,
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the subgraph indexer implementation.
pub struct Registry;

impl explorer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "graph";
	type Factory = crate::IndexerFactory;

	fn factory() -> Self::Factory {
		create_indexer
	}
}

impl crate::IndexerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{http::StatusCode, routing::post, Json, Router};
	use explorer_types::NetworkConfig;
	use tokio::net::TcpListener;

	#[test]
	fn test_request_bodies() {
		let body = request_body(BatchQuery::After(5_000_000));
		assert_eq!(body["variables"]["after"], "5000000");
		let query = body["query"].as_str().unwrap();
		assert!(query.contains("id_gt: $after"));
		assert!(query.contains("orderBy: id, orderDirection: desc"));
		assert!(query.contains("orderBy: createEpoch"));

		let body = request_body(BatchQuery::Latest(10));
		assert_eq!(body["variables"]["first"], 10);
		assert!(!body["query"].as_str().unwrap().contains("id_gt"));
	}

	#[test]
	fn test_parse_response() {
		let body = r#"{
			"data": {
				"batches": [
					{ "id": "99", "solutions": [] },
					{ "id": "100", "solutions": [
						{
							"id": "s2",
							"solver": { "id": "0x00000000000000000000000000000000000000AA" },
							"feeReward": "123456789012345678901234567890",
							"objectiveValue": "42",
							"txHash": "0xabc",
							"revertEpoch": "5"
						},
						{
							"id": "s1",
							"solver": { "id": "0x00000000000000000000000000000000000000bb" },
							"feeReward": "1",
							"objectiveValue": "2",
							"txHash": "0xdef",
							"revertEpoch": null
						}
					] }
				]
			}
		}"#;

		let batches = parse_response(Network::Mainnet, body);
		assert_eq!(batches.len(), 2);
		assert_eq!(batches[0].batch, 100);
		assert_eq!(batches[1].batch, 99);

		let lead = &batches[0].solutions[0];
		assert_eq!(lead.fee_reward.to_string(), "123456789012345678901234567890");
		assert_eq!(
			lead.solver.as_str(),
			"0x00000000000000000000000000000000000000aa"
		);
		assert!(lead.reverted);
		assert!(!batches[0].solutions[1].reverted);
	}

	#[test]
	fn test_invalid_solution_is_dropped() {
		let body = r#"{ "data": { "batches": [ { "id": "7", "solutions": [
			{ "solver": { "id": "0xaa" }, "feeReward": "-1", "objectiveValue": "2", "txHash": "0x1", "revertEpoch": null },
			{ "solver": { "id": "0xbb" }, "feeReward": "3", "objectiveValue": "4", "txHash": "0x2", "revertEpoch": null }
		] } ] } }"#;
		let batches = parse_response(Network::Mainnet, body);
		assert_eq!(batches[0].solutions.len(), 1);
		assert_eq!(batches[0].solutions[0].tx_hash, "0x2");
	}

	#[test]
	fn test_malformed_responses_yield_nothing() {
		assert!(parse_response(Network::Mainnet, "<html>").is_empty());
		assert!(parse_response(Network::Mainnet, r#"{ "data": null }"#).is_empty());
		assert!(parse_response(Network::Mainnet, r#"{}"#).is_empty());
		assert!(parse_response(
			Network::Mainnet,
			r#"{ "data": { "batches": [ { "id": "1" } ] }, "errors": [ { "message": "indexing error" } ] }"#
		)
		.is_empty());
		let batches = parse_response(
			Network::Mainnet,
			r#"{ "data": { "batches": [ { "id": "x" }, { "id": "3" } ] } }"#,
		);
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0].batch, 3);
	}

	#[test]
	fn test_factory_uses_network_endpoints() {
		let mut networks = NetworksConfig::new();
		networks.insert(
			Network::Xdai,
			NetworkConfig {
				indexer_url: None,
				tx_explorer: None,
				instance_bucket: "b".to_string(),
				instance_namespace: "n".to_string(),
			},
		);
		let config: toml::Value = toml::from_str("timeout_seconds = 5").unwrap();
		assert!(create_indexer(&config, &networks).is_ok());

		let config: toml::Value = toml::from_str("timeout_seconds = \"5\"").unwrap();
		assert!(create_indexer(&config, &networks).is_err());
	}

	#[tokio::test]
	async fn test_unknown_network() {
		let indexer = GraphIndexer::new(HashMap::new(), Duration::from_secs(1)).unwrap();
		let err = indexer
			.query_batches(Network::Rinkeby, BatchQuery::Latest(1))
			.await
			.unwrap_err();
		assert!(matches!(err, IndexerError::UnknownNetwork(Network::Rinkeby)));
	}

	/// Serves a stand-in subgraph per network on a local port.
	async fn serve_subgraphs() -> HashMap<Network, String> {
		let app = Router::new()
			.route(
				"/subgraphs/mainnet",
				post(|Json(body): Json<serde_json::Value>| async move {
					if body["variables"]["first"] != 2 {
						return (StatusCode::BAD_REQUEST, Json(json!({})));
					}
					let data = json!({ "data": { "batches": [
						{ "id": "9", "solutions": [] },
						{ "id": "10", "solutions": [ {
							"id": "s1",
							"solver": { "id": "0xAA" },
							"feeReward": "123456789012345678901234567890",
							"objectiveValue": "1",
							"txHash": "abc",
							"revertEpoch": null
						} ] }
					] } });
					(StatusCode::OK, Json(data))
				}),
			)
			.route(
				"/subgraphs/rinkeby",
				post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
			)
			.route(
				"/subgraphs/xdai",
				post(|| async {
					Json(json!({ "errors": [ { "message": "indexing_error" } ] }))
				}),
			);
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let address = listener.local_addr().unwrap();
		tokio::spawn(async move { axum::serve(listener, app).await });

		[Network::Mainnet, Network::Rinkeby, Network::Xdai]
			.into_iter()
			.map(|network| (network, format!("http://{}/subgraphs/{}", address, network)))
			.collect()
	}

	#[tokio::test]
	async fn test_query_batches_over_http() {
		let indexer = GraphIndexer::new(serve_subgraphs().await, Duration::from_secs(5)).unwrap();

		let batches = indexer
			.query_batches(Network::Mainnet, BatchQuery::Latest(2))
			.await
			.unwrap();
		assert_eq!(batches.len(), 2);
		assert_eq!(batches[0].batch, 10);
		let solution = &batches[0].solutions[0];
		assert_eq!(solution.fee_reward.to_string(), "123456789012345678901234567890");
		assert_eq!(solution.tx_hash, "0xabc");
	}

	#[tokio::test]
	async fn test_query_batches_error_status() {
		let indexer = GraphIndexer::new(serve_subgraphs().await, Duration::from_secs(5)).unwrap();

		let err = indexer
			.query_batches(Network::Rinkeby, BatchQuery::Latest(2))
			.await
			.unwrap_err();
		match err {
			IndexerError::Network(message) => assert!(message.contains("500")),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_query_batches_errors_payload_is_empty() {
		let indexer = GraphIndexer::new(serve_subgraphs().await, Duration::from_secs(5)).unwrap();

		let batches = indexer
			.query_batches(Network::Xdai, BatchQuery::After(5))
			.await
			.unwrap();
		assert!(batches.is_empty());
	}
}
