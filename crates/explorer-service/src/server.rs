//! HTTP server for the explorer API.
//!
//! Serves the JSON endpoints under `/api`, proxies object storage under
//! `/api/s3proxy` and falls back to the static front-end files.

use axum::{
	extract::{Path, Query, RawQuery, State},
	response::{Json, Response},
	routing::get,
	Router,
};
use explorer_config::{ApiConfig, Config, ExplorerConfig};
use explorer_core::{BatchExplorer, TimelineMonitor};
use explorer_types::{
	APIError, Batch, BatchSummary, BatchesQuery, InstanceResponse, NetworkQuery, ResultData,
	TimelineResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use url::Url;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Explorer answering batch and artifact queries.
	pub explorer: Arc<BatchExplorer>,
	/// Background poller holding the latest timeline.
	pub monitor: Arc<TimelineMonitor>,
	/// Defaults for omitted query parameters.
	pub defaults: ExplorerConfig,
	/// HTTP client for proxied storage requests.
	pub http_client: reqwest::Client,
	/// Base URL of the proxied bucket, if proxying is enabled.
	pub proxy_base: Option<Url>,
}

impl AppState {
	pub fn new(
		config: &Config,
		explorer: Arc<BatchExplorer>,
		monitor: Arc<TimelineMonitor>,
	) -> Result<Self, Box<dyn std::error::Error>> {
		let timeout = config.api.as_ref().map_or(30, |api| api.timeout_seconds);

		// Create a reusable HTTP client with connection pooling
		let http_client = reqwest::Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(10)
			.timeout(Duration::from_secs(timeout))
			.build()?;

		let proxy_base = config
			.api
			.as_ref()
			.and_then(|api| api.proxy_bucket.as_deref())
			.map(|bucket| Url::parse(&config.storage.base_url_for(bucket)))
			.transpose()?;
		match &proxy_base {
			Some(url) => tracing::info!(%url, "Storage proxy enabled"),
			None => tracing::info!("No proxy bucket configured - /api/s3proxy is disabled"),
		}

		Ok(Self {
			explorer,
			monitor,
			defaults: config.explorer.clone(),
			http_client,
			proxy_base,
		})
	}
}

/// Builds the application router.
pub fn router(state: AppState, static_dir: Option<&str>) -> Router {
	let api = Router::new()
		.route("/batches", get(handle_list_batches))
		.route("/batches/latest", get(handle_latest_timeline))
		.route(
			"/networks/{network}/batches/{batch}/instance",
			get(handle_find_instance),
		)
		.route("/batches/{batch}/solvers/{address}", get(handle_find_result))
		.route("/s3proxy/{*path}", get(handle_proxy));

	let app = Router::new().nest("/api", api);
	let app = match static_dir {
		Some(dir) => app.fallback_service(ServeDir::new(dir)),
		None => app,
	};

	app.layer(
		ServiceBuilder::new()
			.layer(TraceLayer::new_for_http())
			.layer(CorsLayer::permissive()),
	)
	.with_state(state)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(state, Some(&api_config.static_dir));

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Explorer API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles GET /api/batches requests.
async fn handle_list_batches(
	State(state): State<AppState>,
	Query(query): Query<BatchesQuery>,
) -> Result<Json<Vec<BatchSummary>>, APIError> {
	match crate::apis::batches::list_batches(query, &state.explorer, &state.defaults).await {
		Ok(batches) => Ok(Json(batches)),
		Err(e) => {
			tracing::warn!("Batch listing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/batches/latest requests.
async fn handle_latest_timeline(
	State(state): State<AppState>,
) -> Result<Json<TimelineResponse>, APIError> {
	crate::apis::batches::latest_timeline(&state.monitor, &state.explorer)
		.await
		.map(Json)
}

/// Handles GET /api/networks/{network}/batches/{batch}/instance requests.
async fn handle_find_instance(
	State(state): State<AppState>,
	Path((network, batch)): Path<(String, Batch)>,
) -> Result<Json<InstanceResponse>, APIError> {
	let network = crate::apis::parse_network(Some(&network), state.defaults.network)?;
	match crate::apis::artifacts::find_instance(network, batch, &state.explorer).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::debug!(%network, batch, "Instance lookup failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/batches/{batch}/solvers/{address} requests.
async fn handle_find_result(
	State(state): State<AppState>,
	Path((batch, address)): Path<(Batch, String)>,
	Query(query): Query<NetworkQuery>,
) -> Result<Json<ResultData>, APIError> {
	let network = crate::apis::parse_network(query.network.as_deref(), state.defaults.network)?;
	crate::apis::artifacts::find_result(network, batch, &address, &state.explorer)
		.await
		.map(Json)
}

/// Handles GET /api/s3proxy/{*path} requests.
async fn handle_proxy(
	State(state): State<AppState>,
	Path(path): Path<String>,
	RawQuery(query): RawQuery,
) -> Result<Response, APIError> {
	let base = state
		.proxy_base
		.as_ref()
		.ok_or_else(|| APIError::not_found("Storage proxy is not configured"))?;
	crate::apis::proxy::forward(&state.http_client, base, &path, query.as_deref()).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::{header, Request, StatusCode};
	use explorer_config::builders::config::ConfigBuilder;
	use explorer_core::MonitorSettings;
	use explorer_types::{Environment, FixedTimeSource, Network, SolverAddress, SolverEntry};
	use tower::ServiceExt;

	// 2020-08-10T00:00:00Z
	const DAY_START: u64 = 1_597_017_600;
	const SOLVER: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

	fn config() -> Config {
		let storage: toml::Value = toml::from_str(
			r#"
[objects]
test-bucket = [
	"data/mainnet_prod/standard-solver/instances/2020-08-10/instance_5323400_2020-08-10T00:40:00.json",
]
"#,
		)
		.unwrap();
		let indexer: toml::Value = toml::from_str(&format!(
			r#"
[[batches]]
network = "mainnet"
batch = 5323400
solutions = [
	{{ solver = "{}", feeReward = "123456789012345678901234567890", objectiveValue = "2", txHash = "0x1234567890abcdef", reverted = false }},
]
"#,
			SOLVER
		))
		.unwrap();

		ConfigBuilder::new()
			.solver(SolverEntry {
				address: SolverAddress::normalize(SOLVER),
				network: Network::Mainnet,
				environment: Environment::Production,
				name: "Standard Solver".to_string(),
				bucket: "test-bucket".to_string(),
				namespace: "data/mainnet_prod/standard-solver".to_string(),
			})
			.storage("memory", storage)
			.indexer("memory", indexer)
			.build()
	}

	fn state(config: &Config) -> AppState {
		let time = Arc::new(FixedTimeSource::new(DAY_START + 300 * 10 + 30));
		let explorer = explorer_core::ExplorerBuilder::new(config.clone())
			.with_time_source(time)
			.build(explorer_core::ExplorerFactories {
				storage_factories: crate::factory_registry::get_registry().storage.clone(),
				indexer_factories: crate::factory_registry::get_registry().indexer.clone(),
			})
			.unwrap();
		let explorer = Arc::new(explorer);
		let monitor = Arc::new(TimelineMonitor::new(
			explorer.clone(),
			MonitorSettings::from(config),
		));
		AppState::new(config, explorer, monitor).unwrap()
	}

	async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
		let response = app
			.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
			.await
			.unwrap();
		let status = response.status();
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
		(status, value)
	}

	#[tokio::test]
	async fn test_list_batches() {
		let config = config();
		let app = router(state(&config), None);

		let (status, body) = get_json(app.clone(), "/api/batches?count=10").await;
		assert_eq!(status, StatusCode::OK);
		let batches = body.as_array().unwrap();
		assert_eq!(batches.len(), 10);
		assert_eq!(batches[0]["batch"], 5_323_401);
		assert_eq!(batches[0]["status"], "solving");
		assert_eq!(batches[0]["timer"]["display"], "4:30");
		assert_eq!(batches[1]["status"], "solved");
		assert_eq!(batches[1]["lead"]["solver_name"], "Standard Solver");
		assert_eq!(
			batches[1]["lead"]["fee_reward"],
			"123456789012345678901234567890"
		);
		assert_eq!(batches[2]["status"], "no_solution");

		let (status, body) = get_json(app.clone(), "/api/batches?filter_unsolved=true").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body.as_array().unwrap().len(), 2);

		let (status, _) = get_json(app.clone(), "/api/batches?count=0").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		let (status, body) = get_json(app.clone(), "/api/batches?network=xdai").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");
		let (status, _) = get_json(app, "/api/batches?network=goerli").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_latest_timeline() {
		let config = config();
		let state = state(&config);
		let app = router(state.clone(), None);

		let (status, _) = get_json(app.clone(), "/api/batches/latest").await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		state.monitor.poll_once().await.unwrap();
		let (status, body) = get_json(app, "/api/batches/latest").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["batches"].as_array().unwrap().len(), 10);
		assert_eq!(body["updated_at"], DAY_START + 3_030);
	}

	#[tokio::test]
	async fn test_artifact_lookups() {
		let config = config();
		let app = router(state(&config), None);

		let (status, body) =
			get_json(app.clone(), "/api/networks/mainnet/batches/5323400/instance").await;
		assert_eq!(status, StatusCode::OK);
		assert!(body["url"]
			.as_str()
			.unwrap()
			.starts_with("https://test-bucket.s3.amazonaws.com/data/mainnet_prod/"));

		let (status, _) =
			get_json(app.clone(), "/api/networks/mainnet/batches/5323399/instance").await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, body) =
			get_json(app.clone(), &format!("/api/batches/5323400/solvers/{}", SOLVER)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["solver"], "Standard Solver");
		assert!(body.get("links").is_none());

		let (status, _) = get_json(
			app,
			"/api/batches/5323400/solvers/0x0000000000000000000000000000000000000001",
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_proxy_forwards_upstream() {
		// Stand-in for the bucket
		let upstream = Router::new().route(
			"/{*path}",
			get(|Path(path): Path<String>| async move {
				if path == "data/a.json" {
					(
						StatusCode::OK,
						[(header::CONTENT_TYPE, "application/json"), (header::ETAG, "\"abc\"")],
						"{}",
					)
				} else {
					(
						StatusCode::FORBIDDEN,
						[(header::CONTENT_TYPE, "application/xml"), (header::ETAG, "\"x\"")],
						"<Error/>",
					)
				}
			}),
		);
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let address = listener.local_addr().unwrap();
		tokio::spawn(async move { axum::serve(listener, upstream).await });

		let config = config();
		let mut state = state(&config);
		state.proxy_base = Some(Url::parse(&format!("http://{}/", address)).unwrap());
		let app = router(state, None);

		let response = app
			.clone()
			.oneshot(
				Request::builder()
					.uri("/api/s3proxy/data/a.json")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
		assert_eq!(response.headers()[header::ETAG], "\"abc\"");

		let response = app
			.oneshot(
				Request::builder()
					.uri("/api/s3proxy/data/secret.json")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn test_proxy_failures() {
		let config = config();
		let mut state = state(&config);
		let app = router(state.clone(), None);
		let (status, _) = get_json(app, "/api/s3proxy/data/a.json").await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		// Nothing listens on the discard port
		state.proxy_base = Some(Url::parse("http://127.0.0.1:9/").unwrap());
		let (status, body) = get_json(router(state, None), "/api/s3proxy/data/a.json").await;
		assert_eq!(status, StatusCode::BAD_GATEWAY);
		assert_eq!(body["error"], "UPSTREAM_FAILURE");
	}
}
