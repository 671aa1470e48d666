//! Solver identity types.

use crate::{Network, ValidationError};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display name used when a solver address is not registered.
pub const UNKNOWN_SOLVER: &str = "Unknown Solver";

/// Lower-cased solver address.
///
/// Addresses reported by the indexer are treated as opaque identifiers and
/// only normalized; registry entries are additionally checked to be
/// well-formed through [`FromStr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SolverAddress(String);

impl SolverAddress {
	/// Normalizes an address without validating it.
	pub fn normalize(raw: &str) -> Self {
		Self(raw.trim().to_ascii_lowercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether the address is `0x` followed by 20 hex-encoded bytes.
	pub fn is_well_formed(&self) -> bool {
		self.0
			.strip_prefix("0x")
			.filter(|digits| digits.len() == 40)
			.is_some_and(|digits| hex::decode(digits).is_ok())
	}
}

impl fmt::Display for SolverAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for SolverAddress {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let address = Self::normalize(s);
		if !address.is_well_formed() {
			return Err(ValidationError::InvalidValue {
				field: "address".to_string(),
				message: format!("'{}' is not a 20 byte hex address", s),
			});
		}
		Ok(address)
	}
}

impl<'de> Deserialize<'de> for SolverAddress {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		Ok(Self::normalize(&raw))
	}
}

/// Deployment environment a solver entry belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	Staging,
	#[default]
	Production,
}

impl fmt::Display for Environment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Environment::Staging => f.write_str("staging"),
			Environment::Production => f.write_str("production"),
		}
	}
}

/// Registry record of a known solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverData {
	/// Canonical display name.
	pub name: String,
	/// Storage bucket holding the solver's artifacts.
	pub bucket: String,
	/// Storage path of the solver's artifact folder.
	pub namespace: String,
}

/// Solver entry as written in configuration.
///
/// # Fields
///
/// * `address` - Submitting account of the solver
/// * `network` - Network the solver submits to
/// * `environment` - Staging or production deployment
/// * `name`, `bucket`, `namespace` - Registry data, see [`SolverData`]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverEntry {
	pub address: SolverAddress,
	pub network: Network,
	#[serde(default)]
	pub environment: Environment,
	pub name: String,
	pub bucket: String,
	pub namespace: String,
}

impl SolverEntry {
	pub fn data(&self) -> SolverData {
		SolverData {
			name: self.name.clone(),
			bucket: self.bucket.clone(),
			namespace: self.namespace.clone(),
		}
	}
}
