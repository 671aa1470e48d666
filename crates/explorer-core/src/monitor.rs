//! Periodic refresh of the batch timeline.
//!
//! The monitor polls the explorer for the configured window of batches and
//! keeps the last successful answer. A failed poll leaves the previous
//! snapshot in place, so readers always see stale-but-valid data rather
//! than nothing.

use crate::{BatchExplorer, ExplorerError};
use explorer_config::Config;
use explorer_types::{BatchSolutions, Network};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// What the monitor polls for.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
	pub count: usize,
	pub filter_unsolved: bool,
	pub network: Network,
	pub interval: Duration,
}

impl From<&Config> for MonitorSettings {
	fn from(config: &Config) -> Self {
		Self {
			count: config.explorer.batch_count,
			filter_unsolved: config.explorer.filter_unsolved,
			network: config.explorer.network,
			interval: Duration::from_secs(config.explorer.poll_interval_seconds),
		}
	}
}

/// Last successfully fetched window of batches.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineSnapshot {
	/// Clock time of the poll, in seconds.
	pub updated_at: u64,
	pub batches: Vec<BatchSolutions>,
}

/// Polls the batch timeline at a fixed interval.
pub struct TimelineMonitor {
	explorer: Arc<BatchExplorer>,
	settings: MonitorSettings,
	snapshot: RwLock<Option<Arc<TimelineSnapshot>>>,
}

impl TimelineMonitor {
	pub fn new(explorer: Arc<BatchExplorer>, settings: MonitorSettings) -> Self {
		Self {
			explorer,
			settings,
			snapshot: RwLock::new(None),
		}
	}

	pub fn settings(&self) -> &MonitorSettings {
		&self.settings
	}

	/// Last good snapshot, if any poll has succeeded yet.
	pub async fn snapshot(&self) -> Option<Arc<TimelineSnapshot>> {
		self.snapshot.read().await.clone()
	}

	/// Runs one poll and stores its result.
	pub async fn poll_once(&self) -> Result<(), ExplorerError> {
		let batches = self
			.explorer
			.latest_batch_solutions(
				self.settings.count,
				self.settings.filter_unsolved,
				self.settings.network,
			)
			.await?;

		tracing::debug!(
			network = %self.settings.network,
			batches = batches.len(),
			head = batches.first().map(|b| b.batch),
			"Timeline refreshed"
		);
		*self.snapshot.write().await = Some(Arc::new(TimelineSnapshot {
			updated_at: self.explorer.clock().now(),
			batches,
		}));
		Ok(())
	}

	/// Polls until a message arrives on `stop_rx` or its sender is dropped.
	///
	/// The first poll happens immediately.
	pub async fn run(&self, mut stop_rx: mpsc::Receiver<()>) {
		let mut interval = tokio::time::interval(self.settings.interval);
		// Skip missed ticks instead of bursting after a slow poll
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		tracing::info!(
			network = %self.settings.network,
			interval_secs = self.settings.interval.as_secs(),
			"Timeline monitor started"
		);
		loop {
			tokio::select! {
				_ = interval.tick() => {
					if let Err(e) = self.poll_once().await {
						tracing::warn!(
							network = %self.settings.network,
							error = %e,
							"Timeline refresh failed, keeping previous snapshot"
						);
					}
				}
				_ = stop_rx.recv() => {
					break;
				}
			}
		}
		tracing::info!("Timeline monitor stopped");
	}
}
