//! Configuration module for the batch explorer.
//!
//! This module provides structures and utilities for managing explorer configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use explorer_types::{
	Environment, Network, NetworksConfig, SolverAddress, SolverEntry, DEFAULT_BATCH_DURATION,
	DEFAULT_FINALITY_MARGIN, DEFAULT_GRAPH_FILE, DEFAULT_RESULT_FILE,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the explorer.
///
/// Backend sections (`storage`, `indexer`) keep their implementation tables
/// as raw TOML so each backend can validate its own fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Explorer-wide settings.
	#[serde(default)]
	pub explorer: ExplorerConfig,
	/// Batch timing constants.
	#[serde(default)]
	pub batch: BatchConfig,
	/// Per-network endpoints and instance locations.
	pub networks: NetworksConfig,
	/// Known solvers, across environments.
	#[serde(default)]
	pub solvers: Vec<SolverEntry>,
	/// Configuration for the artifact listing backend.
	pub storage: StorageConfig,
	/// Configuration for the indexer backend.
	pub indexer: IndexerConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Explorer-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplorerConfig {
	/// Which solver registry entries to load.
	#[serde(default)]
	pub environment: Environment,
	/// Network used when a request does not name one.
	#[serde(default = "default_network")]
	pub network: Network,
	/// Number of batches returned by default.
	#[serde(default = "default_batch_count")]
	pub batch_count: usize,
	/// Whether to skip batches without solutions by default.
	#[serde(default)]
	pub filter_unsolved: bool,
	/// Interval between timeline polls.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
}

impl Default for ExplorerConfig {
	fn default() -> Self {
		Self {
			environment: Environment::default(),
			network: default_network(),
			batch_count: default_batch_count(),
			filter_unsolved: false,
			poll_interval_seconds: default_poll_interval_seconds(),
		}
	}
}

fn default_network() -> Network {
	Network::Mainnet
}

fn default_batch_count() -> usize {
	10
}

fn default_poll_interval_seconds() -> u64 {
	5
}

/// Batch timing constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
	/// Length of a batch window in seconds.
	#[serde(default = "default_batch_duration")]
	pub duration_seconds: u64,
	/// Trailing part of a solving window treated as provisional.
	#[serde(default = "default_finality_margin")]
	pub finality_margin_seconds: u64,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			duration_seconds: DEFAULT_BATCH_DURATION,
			finality_margin_seconds: DEFAULT_FINALITY_MARGIN,
		}
	}
}

fn default_batch_duration() -> u64 {
	DEFAULT_BATCH_DURATION
}

fn default_finality_margin() -> u64 {
	DEFAULT_FINALITY_MARGIN
}

/// Configuration for the artifact listing backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of listing implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Per-bucket overrides of the public base URL.
	#[serde(default)]
	pub buckets: HashMap<String, BucketConfig>,
	/// File linked as a solver's result inside a result folder.
	#[serde(default = "default_result_file")]
	pub result_file: String,
	/// File linked as a solver's solution graph inside a result folder.
	#[serde(default = "default_graph_file")]
	pub graph_file: String,
}

impl StorageConfig {
	/// Base URL under which the objects of `bucket` are published.
	pub fn base_url_for(&self, bucket: &str) -> String {
		self.buckets
			.get(bucket)
			.map(|b| b.base_url.clone())
			.unwrap_or_else(|| format!("https://{}.s3.amazonaws.com/", bucket))
	}
}

fn default_result_file() -> String {
	DEFAULT_RESULT_FILE.to_string()
}

fn default_graph_file() -> String {
	DEFAULT_GRAPH_FILE.to_string()
}

/// Public location of one storage bucket.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BucketConfig {
	pub base_url: String,
}

/// Configuration for the indexer backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of indexer implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds, also used for proxied storage requests.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Directory of static files served outside `/api`.
	#[serde(default = "default_static_dir")]
	pub static_dir: String,
	/// Bucket exposed through `/api/s3proxy`; the proxy is disabled when unset.
	pub proxy_bucket: Option<String>,
}

/// Returns the default API host.
fn default_api_host() -> String {
	"0.0.0.0".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	8476
}

/// Returns the default API timeout in seconds.
fn default_api_timeout() -> u64 {
	30
}

fn default_static_dir() -> String {
	"./build".to_string()
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Solver entries of the configured environment.
	pub fn active_solvers(&self) -> impl Iterator<Item = &SolverEntry> {
		self.solvers
			.iter()
			.filter(|entry| entry.environment == self.explorer.environment)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// Checks batch constants, default request parameters, that every
	/// referenced network is configured, solver addresses, and that both
	/// backend sections name a configured primary implementation.
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate batch constants
		if self.batch.duration_seconds == 0 {
			return Err(ConfigError::Validation(
				"Batch duration_seconds must be greater than 0".into(),
			));
		}
		if self.batch.finality_margin_seconds >= self.batch.duration_seconds {
			return Err(ConfigError::Validation(format!(
				"Batch finality_margin_seconds ({}) must be less than duration_seconds ({})",
				self.batch.finality_margin_seconds, self.batch.duration_seconds
			)));
		}

		// Validate explorer config
		if self.explorer.batch_count == 0 || self.explorer.batch_count > 1000 {
			return Err(ConfigError::Validation(
				"Explorer batch_count must be between 1 and 1000".into(),
			));
		}
		if self.explorer.poll_interval_seconds == 0 || self.explorer.poll_interval_seconds > 3600
		{
			return Err(ConfigError::Validation(
				"Explorer poll_interval_seconds must be between 1 and 3600".into(),
			));
		}

		// Validate networks config
		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		if !self.networks.contains_key(&self.explorer.network) {
			return Err(ConfigError::Validation(format!(
				"Default network '{}' is not configured",
				self.explorer.network
			)));
		}
		for (network, config) in &self.networks {
			if config.instance_bucket.is_empty() || config.instance_namespace.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have instance_bucket and instance_namespace",
					network
				)));
			}
		}

		// Validate solver entries
		for entry in &self.solvers {
			SolverAddress::from_str(entry.address.as_str())
				.map_err(|e| ConfigError::Validation(format!("Solver '{}': {}", entry.name, e)))?;
			if !self.networks.contains_key(&entry.network) {
				return Err(ConfigError::Validation(format!(
					"Solver '{}' references network {} which is not configured",
					entry.name, entry.network
				)));
			}
			if entry.bucket.is_empty() || entry.namespace.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Solver '{}' must have bucket and namespace",
					entry.name
				)));
			}
		}

		// Validate storage config
		validate_primary("Storage", &self.storage.primary, &self.storage.implementations)?;
		if self.storage.result_file.is_empty() || self.storage.graph_file.is_empty() {
			return Err(ConfigError::Validation(
				"Storage result_file and graph_file cannot be empty".into(),
			));
		}

		// Validate indexer config
		validate_primary("Indexer", &self.indexer.primary, &self.indexer.implementations)?;

		// Validate API config if enabled
		if let Some(ref api) = self.api {
			if api.enabled && api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section.to_lowercase()
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section.to_lowercase(),
			primary
		)));
	}
	Ok(())
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// This allows configuration to be parsed from TOML strings using the standard
/// string parsing interface. Environment variables are resolved and the
/// configuration is automatically validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_CONFIG: &str = r#"
[networks.mainnet]
instance_bucket = "gnosis-dev-dfusion"
instance_namespace = "data/mainnet_prod/standard-solver/instances"

[storage]
primary = "s3"
[storage.implementations.s3]

[indexer]
primary = "graph"
[indexer.implementations.graph]
"#;

	#[test]
	fn test_env_var_resolution() {
		// Set up test environment variables
		std::env::set_var("TEST_HOST", "localhost");
		std::env::set_var("TEST_PORT", "5432");

		let input = "host = \"${TEST_HOST}:${TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		// Clean up
		std::env::remove_var("TEST_HOST");
		std::env::remove_var("TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.batch.duration_seconds, 300);
		assert_eq!(config.batch.finality_margin_seconds, 60);
		assert_eq!(config.explorer.batch_count, 10);
		assert_eq!(config.explorer.poll_interval_seconds, 5);
		assert_eq!(config.explorer.network, Network::Mainnet);
		assert_eq!(config.explorer.environment, Environment::Production);
		assert_eq!(config.storage.result_file, "06_solution_int_valid.json");
		assert_eq!(config.storage.graph_file, "solution_graph.html");
		assert!(config.api.is_none());
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("TEST_INSTANCE_BUCKET", "my-bucket");

		let config_str = BASE_CONFIG.replace("gnosis-dev-dfusion", "${TEST_INSTANCE_BUCKET}");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(
			config.networks[&Network::Mainnet].instance_bucket,
			"my-bucket"
		);

		std::env::remove_var("TEST_INSTANCE_BUCKET");
	}

	#[test]
	fn test_bucket_base_url_override() {
		let config_str = format!(
			"{}\n[storage.buckets.gnosis-dev-dfusion]\nbase_url = \"http://localhost:8476/api/s3proxy/\"\n",
			BASE_CONFIG
		);
		let config: Config = config_str.parse().unwrap();
		assert_eq!(
			config.storage.base_url_for("gnosis-dev-dfusion"),
			"http://localhost:8476/api/s3proxy/"
		);
		assert_eq!(
			config.storage.base_url_for("other"),
			"https://other.s3.amazonaws.com/"
		);
	}

	#[test]
	fn test_finality_must_fit_in_batch() {
		let config_str = format!(
			"[batch]\nduration_seconds = 60\nfinality_margin_seconds = 60\n{}",
			BASE_CONFIG
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("finality_margin_seconds"));
	}

	#[test]
	fn test_default_network_must_be_configured() {
		let config_str = format!("[explorer]\nnetwork = \"xdai\"\n{}", BASE_CONFIG);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Default network 'xdai'"));
	}

	#[test]
	fn test_primary_must_exist() {
		let config_str = BASE_CONFIG.replace("primary = \"graph\"", "primary = \"missing\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary indexer 'missing' not found"));
	}

	#[test]
	fn test_solver_entries() {
		let config_str = format!(
			r#"{}
[[solvers]]
address = "0x00000000000000000000000000000000000000AA"
network = "mainnet"
name = "Standard Solver"
bucket = "gnosis-dev-dfusion"
namespace = "data/mainnet_prod/standard-solver"

[[solvers]]
address = "0x00000000000000000000000000000000000000bb"
network = "mainnet"
environment = "staging"
name = "Staging Solver"
bucket = "gnosis-dev-dfusion"
namespace = "data/mainnet_dev/standard-solver"
"#,
			BASE_CONFIG
		);
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.solvers.len(), 2);
		let active: Vec<_> = config.active_solvers().map(|e| e.name.as_str()).collect();
		assert_eq!(active, vec!["Standard Solver"]);
		assert_eq!(
			config.solvers[0].address.as_str(),
			"0x00000000000000000000000000000000000000aa"
		);
	}

	#[test]
	fn test_invalid_solver_address_rejected() {
		let config_str = format!(
			r#"{}
[[solvers]]
address = "0x1234"
network = "mainnet"
name = "Broken"
bucket = "b"
namespace = "n"
"#,
			BASE_CONFIG
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Solver 'Broken'"));
	}

	#[test]
	fn test_solver_network_must_be_configured() {
		let config_str = format!(
			r#"{}
[[solvers]]
address = "0x00000000000000000000000000000000000000aa"
network = "rinkeby"
name = "Rinkeby Solver"
bucket = "b"
namespace = "n"
"#,
			BASE_CONFIG
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("network rinkeby"));
	}
}
