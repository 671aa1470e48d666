//! Solutions submitted for a batch and the per-batch solution state.

use crate::{Batch, Network, SolverAddress};
use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One solver's submission for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
	/// Submitting solver.
	pub solver: SolverAddress,
	/// Fee reward, exact.
	#[serde(with = "u256_serde")]
	pub fee_reward: U256,
	/// Objective value, exact.
	#[serde(with = "u256_serde")]
	pub objective_value: U256,
	/// Hash of the submitting transaction.
	pub tx_hash: String,
	/// Whether the solution was later reverted.
	pub reverted: bool,
}

/// Outcome of a batch as far as it is known.
///
/// The three states are exhaustive: a batch is either still being solved, has
/// closed without a solution, or has at least one recorded solution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SolutionState {
	/// The batch is in its solving window and nothing has been observed yet.
	#[default]
	Pending,
	/// The solving window closed without a solution.
	Empty,
	/// Recorded solutions, most recent first.
	Found(Vec<Solution>),
}

impl SolutionState {
	/// Builds the state for a batch whose solving window has closed.
	pub fn from_solutions(solutions: Vec<Solution>) -> Self {
		if solutions.is_empty() {
			SolutionState::Empty
		} else {
			SolutionState::Found(solutions)
		}
	}

	/// Displayed submission, the most recent one.
	pub fn lead(&self) -> Option<&Solution> {
		match self {
			SolutionState::Found(solutions) => solutions.first(),
			_ => None,
		}
	}

	pub fn solutions(&self) -> &[Solution] {
		match self {
			SolutionState::Found(solutions) => solutions,
			_ => &[],
		}
	}
}

// Wire format keeps the `null` / `[]` / `[...]` encoding consumers expect.
impl Serialize for SolutionState {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self {
			SolutionState::Pending => serializer.serialize_none(),
			SolutionState::Empty => serializer.serialize_some(&[] as &[Solution]),
			SolutionState::Found(solutions) => serializer.serialize_some(solutions),
		}
	}
}

impl<'de> Deserialize<'de> for SolutionState {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(match Option::<Vec<Solution>>::deserialize(deserializer)? {
			None => SolutionState::Pending,
			Some(solutions) => SolutionState::from_solutions(solutions),
		})
	}
}

/// A batch together with what is known about its solutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSolutions {
	pub batch: Batch,
	pub network: Network,
	pub solutions: SolutionState,
}

/// A batch as reported by the indexer, solutions most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBatch {
	pub batch: Batch,
	pub solutions: Vec<Solution>,
}

/// Serde module for exact decimal U256 values.
pub mod u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		U256::from_str_radix(&s, 10).map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn solution(tx: &str) -> Solution {
		Solution {
			solver: SolverAddress::normalize("0x00000000000000000000000000000000000000aa"),
			fee_reward: U256::from(1u64),
			objective_value: U256::from(2u64),
			tx_hash: tx.to_string(),
			reverted: false,
		}
	}

	#[test]
	fn test_state_from_solutions() {
		assert_eq!(SolutionState::from_solutions(vec![]), SolutionState::Empty);
		let state = SolutionState::from_solutions(vec![solution("0x1"), solution("0x2")]);
		assert_eq!(state.lead().unwrap().tx_hash, "0x1");
		assert_eq!(state.solutions().len(), 2);
		assert!(SolutionState::Pending.lead().is_none());
	}

	#[test]
	fn test_state_wire_format() {
		let pending = BatchSolutions {
			batch: 7,
			network: Network::Mainnet,
			solutions: SolutionState::Pending,
		};
		let value = serde_json::to_value(&pending).unwrap();
		assert!(value["solutions"].is_null());

		let empty = BatchSolutions {
			solutions: SolutionState::Empty,
			..pending.clone()
		};
		let value = serde_json::to_value(&empty).unwrap();
		assert_eq!(value["solutions"], serde_json::json!([]));

		let back: BatchSolutions = serde_json::from_value(value).unwrap();
		assert_eq!(back.solutions, SolutionState::Empty);
		let back: BatchSolutions =
			serde_json::from_value(serde_json::to_value(&pending).unwrap()).unwrap();
		assert_eq!(back.solutions, SolutionState::Pending);
	}

	#[test]
	fn test_big_integers_are_exact() {
		let json = serde_json::json!({
			"solver": "0x00000000000000000000000000000000000000AA",
			"feeReward": "123456789012345678901234567890",
			"objectiveValue": "0",
			"txHash": "0xdead",
			"reverted": false,
		});
		let parsed: Solution = serde_json::from_value(json).unwrap();
		assert_eq!(parsed.fee_reward.to_string(), "123456789012345678901234567890");
		assert_eq!(
			parsed.solver.as_str(),
			"0x00000000000000000000000000000000000000aa"
		);
	}
}
