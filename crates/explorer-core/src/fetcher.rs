//! Batch solution fetcher.
//!
//! Queries the indexer for recent batches and reconciles the answer with the
//! batch currently being solved, which the indexer only knows about once a
//! solution for it has been mined.

use explorer_indexer::{BatchQuery, IndexerError, IndexerService};
use explorer_types::{Batch, BatchClock, BatchSolutions, IndexedBatch, Network, SolutionState};
use std::collections::HashMap;
use std::sync::Arc;

/// Fetches windows of recent batches with their solution state.
pub struct BatchFetcher {
	indexer: Arc<IndexerService>,
	clock: BatchClock,
}

impl BatchFetcher {
	pub fn new(indexer: Arc<IndexerService>, clock: BatchClock) -> Self {
		Self { indexer, clock }
	}

	/// Up to `count` batches of `network`, most recent first.
	///
	/// Without `filter_unsolved` the result covers every batch from the
	/// solving batch downwards, filling batches unknown to the indexer with an
	/// empty solution list. With it, only indexed batches and the solving
	/// batch placeholder are returned.
	pub async fn latest_batch_solutions(
		&self,
		count: usize,
		filter_unsolved: bool,
		network: Network,
	) -> Result<Vec<BatchSolutions>, IndexerError> {
		let Some(solving) = self.clock.solving_batch() else {
			tracing::debug!(%network, "No batch has been solved yet");
			return Ok(Vec::new());
		};
		if count == 0 {
			return Ok(Vec::new());
		}

		let query = if filter_unsolved {
			BatchQuery::Latest(count)
		} else {
			match solving.checked_sub(count as u64) {
				Some(after) => BatchQuery::After(after),
				// Every batch down to zero fits in the window
				None => BatchQuery::Latest(count),
			}
		};
		let indexed = self.indexer.query_batches(network, query).await?;

		let placeholder = placeholder_state(&self.clock, solving);
		Ok(reconcile(
			network,
			solving,
			placeholder,
			indexed,
			count,
			filter_unsolved,
		))
	}
}

/// State shown for the solving batch while the indexer has nothing for it.
///
/// Pending until the finality margin starts; after that, or once the window
/// has closed, nothing is expected to arrive in time and the batch is shown
/// as empty.
pub fn placeholder_state(clock: &BatchClock, solving: Batch) -> SolutionState {
	match clock.solve_time_remaining(solving) {
		Some(remaining) if !remaining.is_final() => SolutionState::Pending,
		_ => SolutionState::Empty,
	}
}

/// Merges indexed batches with the placeholder of the solving batch.
///
/// `indexed` must be ordered highest batch first. Batches beyond `solving`
/// are ignored.
pub fn reconcile(
	network: Network,
	solving: Batch,
	placeholder: SolutionState,
	indexed: Vec<IndexedBatch>,
	count: usize,
	filter_unsolved: bool,
) -> Vec<BatchSolutions> {
	let indexed = indexed.into_iter().filter(|batch| {
		let ahead = batch.batch > solving;
		if ahead {
			tracing::warn!(%network, batch = batch.batch, solving, "Indexer reports a batch that is not solved yet");
		}
		!ahead
	});

	if filter_unsolved {
		let mut indexed = indexed.peekable();
		let mut result = Vec::with_capacity(count);
		if indexed.peek().map(|batch| batch.batch) != Some(solving) {
			result.push(BatchSolutions {
				batch: solving,
				network,
				solutions: placeholder,
			});
		}
		result.extend(indexed.map(|batch| BatchSolutions {
			batch: batch.batch,
			network,
			solutions: SolutionState::from_solutions(batch.solutions),
		}));
		result.truncate(count);
		return result;
	}

	let mut by_batch: HashMap<Batch, Vec<_>> = indexed
		.map(|batch| (batch.batch, batch.solutions))
		.collect();
	let mut placeholder = Some(placeholder);

	// Batch 0 is the oldest one, so the window may be shorter than `count`
	let window = count.min(usize::try_from(solving).map_or(usize::MAX, |s| s.saturating_add(1)));
	(0..window as u64)
		.map(|offset| solving - offset)
		.map(|batch| {
			let solutions = match by_batch.remove(&batch) {
				Some(solutions) => SolutionState::from_solutions(solutions),
				None if batch == solving => placeholder.take().unwrap_or(SolutionState::Empty),
				None => SolutionState::Empty,
			};
			BatchSolutions {
				batch,
				network,
				solutions,
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;
	use explorer_indexer::implementations::memory::MemoryIndexer;
	use explorer_types::{FixedTimeSource, Solution, SolverAddress};

	fn solution(tx: &str) -> Solution {
		Solution {
			solver: SolverAddress::normalize("0x00000000000000000000000000000000000000aa"),
			fee_reward: U256::from(10u64),
			objective_value: U256::from(20u64),
			tx_hash: tx.to_string(),
			reverted: false,
		}
	}

	fn indexed(batch: Batch) -> IndexedBatch {
		IndexedBatch {
			batch,
			solutions: vec![solution(&format!("0x{:x}", batch))],
		}
	}

	fn batches(result: &[BatchSolutions]) -> Vec<Batch> {
		result.iter().map(|b| b.batch).collect()
	}

	#[test]
	fn test_unfiltered_window_is_contiguous() {
		let result = reconcile(
			Network::Mainnet,
			100,
			SolutionState::Pending,
			vec![indexed(99), indexed(97)],
			5,
			false,
		);

		assert_eq!(batches(&result), vec![100, 99, 98, 97, 96]);
		assert_eq!(result[0].solutions, SolutionState::Pending);
		assert!(matches!(result[1].solutions, SolutionState::Found(_)));
		assert_eq!(result[2].solutions, SolutionState::Empty);
		assert!(matches!(result[3].solutions, SolutionState::Found(_)));
		assert_eq!(result[4].solutions, SolutionState::Empty);
	}

	#[test]
	fn test_unfiltered_window_stops_at_batch_zero() {
		for (solving, count, expected) in [(2, 10, 3), (0, 4, 1), (9, 10, 10), (50, 10, 10)] {
			let result = reconcile(
				Network::Mainnet,
				solving,
				SolutionState::Pending,
				vec![],
				count,
				false,
			);
			assert_eq!(result.len(), expected, "solving {} count {}", solving, count);
			assert_eq!(result[0].batch, solving);
			assert!(result.windows(2).all(|w| w[0].batch == w[1].batch + 1));
		}
	}

	#[test]
	fn test_indexed_solving_batch_wins_over_placeholder() {
		let result = reconcile(
			Network::Mainnet,
			100,
			SolutionState::Pending,
			vec![indexed(100)],
			2,
			false,
		);
		assert_eq!(result[0].solutions.lead().unwrap().tx_hash, "0x64");

		let result = reconcile(
			Network::Mainnet,
			100,
			SolutionState::Pending,
			vec![indexed(100), indexed(90)],
			5,
			true,
		);
		assert_eq!(batches(&result), vec![100, 90]);
	}

	#[test]
	fn test_filtered_never_exceeds_count() {
		let result = reconcile(
			Network::Mainnet,
			100,
			SolutionState::Pending,
			vec![indexed(98), indexed(95), indexed(90)],
			3,
			true,
		);
		assert_eq!(batches(&result), vec![100, 98, 95]);
		assert_eq!(result[0].solutions, SolutionState::Pending);

		let result = reconcile(Network::Mainnet, 100, SolutionState::Empty, vec![], 3, true);
		assert_eq!(batches(&result), vec![100]);
		assert_eq!(result[0].solutions, SolutionState::Empty);
	}

	#[test]
	fn test_batches_ahead_of_solving_are_ignored() {
		let result = reconcile(
			Network::Mainnet,
			100,
			SolutionState::Pending,
			vec![indexed(101), indexed(100)],
			2,
			true,
		);
		assert_eq!(batches(&result), vec![100]);
		assert!(matches!(result[0].solutions, SolutionState::Found(_)));
	}

	#[test]
	fn test_placeholder_at_window_open_and_close() {
		let solving = 5_333_333;
		let time = Arc::new(FixedTimeSource::new(0));
		let clock = BatchClock::new(300, 60, time.clone()).unwrap();
		let solve_start = clock.timestamp_for_batch(solving + 1);

		time.set(solve_start);
		assert_eq!(placeholder_state(&clock, solving), SolutionState::Pending);

		time.set(solve_start + 239);
		assert_eq!(placeholder_state(&clock, solving), SolutionState::Pending);

		time.set(solve_start + 240);
		assert_eq!(placeholder_state(&clock, solving), SolutionState::Empty);

		time.set(solve_start + 300);
		assert_eq!(placeholder_state(&clock, solving), SolutionState::Empty);
	}

	#[tokio::test]
	async fn test_fetch_against_indexer() {
		let solving = 5_333_333;
		let time = Arc::new(FixedTimeSource::new(0));
		let clock = BatchClock::new(300, 60, time.clone()).unwrap();
		time.set(clock.timestamp_for_batch(solving + 1) + 10);

		let backend = MemoryIndexer::default();
		backend
			.record(Network::Mainnet, solving - 1, vec![solution("0x1")])
			.await;
		backend
			.record(Network::Mainnet, solving - 20, vec![solution("0x2")])
			.await;
		let fetcher = BatchFetcher::new(
			Arc::new(IndexerService::new(Box::new(backend))),
			clock,
		);

		let result = fetcher
			.latest_batch_solutions(3, false, Network::Mainnet)
			.await
			.unwrap();
		assert_eq!(batches(&result), vec![solving, solving - 1, solving - 2]);
		assert_eq!(result[0].solutions, SolutionState::Pending);
		assert_eq!(result[1].solutions.lead().unwrap().tx_hash, "0x1");
		assert_eq!(result[2].solutions, SolutionState::Empty);

		let result = fetcher
			.latest_batch_solutions(3, true, Network::Mainnet)
			.await
			.unwrap();
		assert_eq!(batches(&result), vec![solving, solving - 1, solving - 20]);

		assert!(fetcher
			.latest_batch_solutions(0, false, Network::Mainnet)
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test]
	async fn test_nothing_before_first_solving_window() {
		let clock = BatchClock::new(300, 60, Arc::new(FixedTimeSource::new(299))).unwrap();
		let fetcher = BatchFetcher::new(
			Arc::new(IndexerService::new(Box::new(MemoryIndexer::default()))),
			clock,
		);
		let result = fetcher
			.latest_batch_solutions(5, false, Network::Mainnet)
			.await
			.unwrap();
		assert!(result.is_empty());
	}

	#[tokio::test]
	async fn test_indexer_failure_is_returned() {
		let clock = BatchClock::new(300, 60, Arc::new(FixedTimeSource::new(3_000))).unwrap();
		let backend = MemoryIndexer::default();
		backend.set_failing(true);
		let fetcher = BatchFetcher::new(Arc::new(IndexerService::new(Box::new(backend))), clock);
		assert!(fetcher
			.latest_batch_solutions(5, false, Network::Mainnet)
			.await
			.is_err());
	}
}
