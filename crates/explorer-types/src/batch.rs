//! Batch arithmetic for the periodic auction.
//!
//! The auction runs in fixed-length windows of wall-clock time. Batch `b`
//! collects orders during `[b * D, (b + 1) * D)` and is solved during the
//! window that follows it, so at any point in time the batch being solved is
//! the current batch minus one. All conversions use integer floor division.

use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Index of a batch window.
pub type Batch = u64;

/// Default length of a batch window in seconds.
pub const DEFAULT_BATCH_DURATION: u64 = 300;

/// Default finality margin in seconds.
pub const DEFAULT_FINALITY_MARGIN: u64 = 60;

/// Errors raised when constructing a batch clock with inconsistent constants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchMathError {
	/// The batch duration was zero.
	#[error("Batch duration must be greater than 0")]
	ZeroDuration,
	/// The finality margin does not fit inside a batch window.
	#[error("Finality margin {finality}s must be shorter than the batch duration {duration}s")]
	FinalityTooLong { finality: u64, duration: u64 },
}

/// Source of wall-clock time for batch computations.
pub trait TimeSource: Send + Sync {
	/// Current UNIX timestamp in whole seconds.
	fn now(&self) -> u64;
}

/// Time source backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
	fn now(&self) -> u64 {
		current_timestamp()
	}
}

/// Manually driven time source.
///
/// Used wherever batch math needs to be reproducible, most notably in tests.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
	now: AtomicU64,
}

impl FixedTimeSource {
	/// Creates a time source frozen at `now`.
	pub fn new(now: u64) -> Self {
		Self {
			now: AtomicU64::new(now),
		}
	}

	/// Moves the clock to `now`.
	pub fn set(&self, now: u64) {
		self.now.store(now, Ordering::SeqCst);
	}

	/// Moves the clock forward by `seconds`.
	pub fn advance(&self, seconds: u64) {
		self.now.fetch_add(seconds, Ordering::SeqCst);
	}
}

impl TimeSource for FixedTimeSource {
	fn now(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}

/// Time left for a batch that is currently in its solving window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveTimeRemaining {
	/// Seconds until the result stops being provisional.
	pub until_final: u64,
	/// Seconds until the solving window closes.
	pub until_window_end: u64,
}

impl SolveTimeRemaining {
	/// Whether the batch has entered its finality margin.
	pub fn is_final(&self) -> bool {
		self.until_final == 0
	}
}

/// Half-open wall-clock interval `[start, end)` covered by a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
	pub start: u64,
	pub end: u64,
}

/// Maps wall-clock time to batch indices and solving windows.
#[derive(Clone)]
pub struct BatchClock {
	duration: u64,
	finality: u64,
	time: Arc<dyn TimeSource>,
}

impl fmt::Debug for BatchClock {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BatchClock")
			.field("duration", &self.duration)
			.field("finality", &self.finality)
			.field("now", &self.time.now())
			.finish()
	}
}

impl Default for BatchClock {
	fn default() -> Self {
		Self {
			duration: DEFAULT_BATCH_DURATION,
			finality: DEFAULT_FINALITY_MARGIN,
			time: Arc::new(SystemTimeSource),
		}
	}
}

impl BatchClock {
	/// Creates a clock with the given batch duration and finality margin.
	///
	/// The margin must be strictly shorter than the batch duration.
	pub fn new(
		duration: u64,
		finality: u64,
		time: Arc<dyn TimeSource>,
	) -> Result<Self, BatchMathError> {
		if duration == 0 {
			return Err(BatchMathError::ZeroDuration);
		}
		if finality >= duration {
			return Err(BatchMathError::FinalityTooLong { finality, duration });
		}
		Ok(Self {
			duration,
			finality,
			time,
		})
	}

	/// Length of a batch window in seconds.
	pub fn duration(&self) -> u64 {
		self.duration
	}

	/// Finality margin in seconds.
	pub fn finality(&self) -> u64 {
		self.finality
	}

	/// Current UNIX timestamp according to the clock's time source.
	pub fn now(&self) -> u64 {
		self.time.now()
	}

	pub fn batch_for_timestamp(&self, timestamp: u64) -> Batch {
		timestamp / self.duration
	}

	pub fn timestamp_for_batch(&self, batch: Batch) -> u64 {
		batch.saturating_mul(self.duration)
	}

	/// Start of the batch as an absolute UTC time.
	pub fn batch_date(&self, batch: Batch) -> DateTime<Utc> {
		i64::try_from(self.timestamp_for_batch(batch))
			.ok()
			.and_then(|seconds| DateTime::from_timestamp(seconds, 0))
			.unwrap_or(DateTime::<Utc>::MAX_UTC)
	}

	pub fn batch_window(&self, batch: Batch) -> BatchWindow {
		let start = self.timestamp_for_batch(batch);
		BatchWindow {
			start,
			end: start.saturating_add(self.duration),
		}
	}

	/// Batch whose trading window contains the current time.
	pub fn current_batch(&self) -> Batch {
		self.batch_for_timestamp(self.now())
	}

	/// Batch currently being solved, if the auction has been running for a
	/// full window.
	pub fn solving_batch(&self) -> Option<Batch> {
		self.current_batch().checked_sub(1)
	}

	/// Seconds until the current window rolls over.
	///
	/// Only meant for scheduling cosmetic transitions; it says nothing about
	/// solution state.
	pub fn time_remaining_in_current_batch(&self) -> u64 {
		self.duration - self.now() % self.duration
	}

	/// Time left in the solving window of `batch`.
	///
	/// Returns `None` unless the current time falls inside
	/// `[timestamp_for_batch(batch + 1), timestamp_for_batch(batch + 2))`.
	pub fn solve_time_remaining(&self, batch: Batch) -> Option<SolveTimeRemaining> {
		let now = self.now();
		let solve_start = self.timestamp_for_batch(batch.checked_add(1)?);
		let solve_end = solve_start.checked_add(self.duration)?;
		if now < solve_start || now >= solve_end {
			return None;
		}

		let until_window_end = solve_end - now;
		Some(SolveTimeRemaining {
			until_final: until_window_end.saturating_sub(self.finality),
			until_window_end,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn clock_at(now: u64) -> (BatchClock, Arc<FixedTimeSource>) {
		let time = Arc::new(FixedTimeSource::new(now));
		let clock = BatchClock::new(300, 60, time.clone()).unwrap();
		(clock, time)
	}

	#[test]
	fn test_rejects_inconsistent_constants() {
		let time = Arc::new(FixedTimeSource::new(0));
		assert_eq!(
			BatchClock::new(0, 0, time.clone()).unwrap_err(),
			BatchMathError::ZeroDuration
		);
		assert_eq!(
			BatchClock::new(300, 300, time).unwrap_err(),
			BatchMathError::FinalityTooLong {
				finality: 300,
				duration: 300
			}
		);
	}

	#[test]
	fn test_floor_round_trip_is_idempotent() {
		let (clock, _) = clock_at(0);
		for t in (0..5_000u64).chain([u64::MAX / 2, 1_600_000_123]) {
			let batch = clock.batch_for_timestamp(t);
			assert_eq!(
				clock.batch_for_timestamp(clock.timestamp_for_batch(batch)),
				batch,
				"round trip failed for t = {}",
				t
			);
			assert!(clock.timestamp_for_batch(batch) <= t);
		}
	}

	#[test]
	fn test_windows_are_contiguous() {
		let (clock, _) = clock_at(0);
		for batch in [0u64, 1, 41, 5_333_333] {
			assert_eq!(
				clock.timestamp_for_batch(batch + 1),
				clock.timestamp_for_batch(batch) + clock.duration()
			);
			let window = clock.batch_window(batch);
			assert_eq!(window.end, clock.batch_window(batch + 1).start);
		}
	}

	#[test]
	fn test_batch_date() {
		let (clock, _) = clock_at(0);
		let date = clock.batch_date(5_333_333);
		assert_eq!(date.timestamp(), 1_599_999_900);
		assert_eq!(date.format("%Y-%m-%d").to_string(), "2020-09-13");
	}

	#[test]
	fn test_current_and_solving_batch() {
		let (clock, time) = clock_at(299);
		assert_eq!(clock.current_batch(), 0);
		assert_eq!(clock.solving_batch(), None);

		time.set(600);
		assert_eq!(clock.current_batch(), 2);
		assert_eq!(clock.solving_batch(), Some(1));
	}

	#[test]
	fn test_time_remaining_in_current_batch() {
		let (clock, time) = clock_at(3_000);
		assert_eq!(clock.time_remaining_in_current_batch(), 300);
		time.advance(299);
		assert_eq!(clock.time_remaining_in_current_batch(), 1);
	}

	#[test]
	fn test_solve_time_remaining_outside_window() {
		let batch = 10;
		let (clock, time) = clock_at(0);
		let solve_start = clock.timestamp_for_batch(batch + 1);

		time.set(solve_start - 1);
		assert_eq!(clock.solve_time_remaining(batch), None);

		time.set(solve_start + 300);
		assert_eq!(clock.solve_time_remaining(batch), None);
	}

	#[test]
	fn test_solve_time_remaining_inside_window() {
		let batch = 10;
		let (clock, time) = clock_at(0);
		let solve_start = clock.timestamp_for_batch(batch + 1);

		for offset in 0..300 {
			time.set(solve_start + offset);
			let remaining = clock.solve_time_remaining(batch).unwrap();
			assert!(remaining.until_final <= remaining.until_window_end);
			assert_eq!(remaining.until_window_end, 300 - offset);
			// Final exactly during the last 60 seconds.
			assert_eq!(remaining.is_final(), offset >= 240, "offset {}", offset);
		}

		time.set(solve_start);
		assert_eq!(
			clock.solve_time_remaining(batch),
			Some(SolveTimeRemaining {
				until_final: 240,
				until_window_end: 300
			})
		);
	}
}
