//! Solver registry.
//!
//! Maps solver addresses to display names and artifact locations. Built once
//! from configuration and never modified afterwards.

use crate::ExplorerError;
use explorer_types::{Network, SolverAddress, SolverData, SolverEntry, UNKNOWN_SOLVER};
use std::collections::HashMap;

/// Known solvers, partitioned by network.
#[derive(Debug, Clone, Default)]
pub struct SolverRegistry {
	solvers: HashMap<Network, HashMap<SolverAddress, SolverData>>,
}

impl SolverRegistry {
	/// Builds the registry from the entries of one environment.
	///
	/// Entries must carry well-formed addresses, and an address may only be
	/// registered once per network.
	pub fn from_entries<'a>(
		entries: impl IntoIterator<Item = &'a SolverEntry>,
	) -> Result<Self, ExplorerError> {
		let mut solvers: HashMap<Network, HashMap<SolverAddress, SolverData>> = HashMap::new();
		for entry in entries {
			if !entry.address.is_well_formed() {
				return Err(ExplorerError::Config(format!(
					"Solver '{}' has malformed address {}",
					entry.name, entry.address
				)));
			}
			let network = solvers.entry(entry.network).or_default();
			if network.insert(entry.address.clone(), entry.data()).is_some() {
				return Err(ExplorerError::Config(format!(
					"Solver {} is registered twice on {}",
					entry.address, entry.network
				)));
			}
		}

		let registry = Self { solvers };
		tracing::info!(solvers = registry.len(), "Loaded solver registry");
		Ok(registry)
	}

	/// Looks up `address` on `network`, ignoring case.
	pub fn get(&self, network: Network, address: &str) -> Option<&SolverData> {
		self.solvers
			.get(&network)?
			.get(&SolverAddress::normalize(address))
	}

	/// Display name of `address`, or [`UNKNOWN_SOLVER`].
	pub fn display_name(&self, network: Network, address: &str) -> &str {
		self.get(network, address)
			.map(|solver| solver.name.as_str())
			.unwrap_or(UNKNOWN_SOLVER)
	}

	pub fn len(&self) -> usize {
		self.solvers.values().map(HashMap::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
