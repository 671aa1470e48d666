//! Main entry point for the batch explorer service.
//!
//! This binary loads the configuration, builds the explorer with the
//! configured listing and indexer backends, keeps the batch timeline fresh in
//! the background and serves it over HTTP.

use clap::Parser;
use explorer_config::Config;
use explorer_core::{MonitorSettings, TimelineMonitor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the explorer service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the explorer service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the explorer with all implementations
/// 5. Runs the timeline monitor and, if enabled, the API server until
///    interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started explorer");

	// Load configuration
	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path {} is not valid UTF-8", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!(
		environment = %config.explorer.environment,
		network = %config.explorer.network,
		solvers = config.active_solvers().count(),
		"Loaded configuration"
	);

	let explorer = Arc::new(factory_registry::build_explorer_from_config(config.clone())?);
	let monitor = Arc::new(TimelineMonitor::new(
		explorer.clone(),
		MonitorSettings::from(&config),
	));

	let (stop_tx, stop_rx) = mpsc::channel(1);
	let monitor_task = {
		let monitor = monitor.clone();
		tokio::spawn(async move { monitor.run(stop_rx).await })
	};

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let state = server::AppState::new(&config, explorer, monitor)?;
			tokio::select! {
				result = server::start_server(api_config, state) => {
					tracing::info!("API server finished");
					result?;
				}
				_ = tokio::signal::ctrl_c() => {}
			}
		},
		None => {
			tracing::info!("Starting timeline monitor only");
			tokio::signal::ctrl_c().await?;
		},
	}

	let _ = stop_tx.send(()).await;
	monitor_task.await?;

	tracing::info!("Stopped explorer");
	Ok(())
}
