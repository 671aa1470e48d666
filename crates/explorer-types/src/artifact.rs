//! Artifact naming conventions and link construction.
//!
//! Every solver run publishes its inputs and outputs to object storage under a
//! date-partitioned folder. Instance files and result folders share the
//! `instance_<batch>_<suffix>` naming scheme, from which the batch index is
//! recovered.

use crate::Batch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Prefix shared by instance files and result folders.
const INSTANCE_PREFIX: &str = "instance_";

/// Default name of the solution validity file inside a result folder.
pub const DEFAULT_RESULT_FILE: &str = "06_solution_int_valid.json";

/// Default name of the solution graph inside a result folder.
pub const DEFAULT_GRAPH_FILE: &str = "solution_graph.html";

/// Entries of one non-recursive storage listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
	/// Object keys directly under the listed prefix.
	pub keys: Vec<String>,
	/// Sub-folders under the listed prefix, each ending in `/`.
	pub prefixes: Vec<String>,
}

impl Listing {
	/// All entries, objects first.
	pub fn entries(&self) -> impl Iterator<Item = &str> {
		self.keys
			.iter()
			.chain(self.prefixes.iter())
			.map(String::as_str)
	}

	/// Entries that follow the artifact naming scheme.
	pub fn artifacts(&self) -> impl Iterator<Item = ArtifactName<'_>> {
		self.entries().filter_map(ArtifactName::parse)
	}
}

/// A listing entry whose name carries a batch index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactName<'a> {
	/// Batch the artifact belongs to.
	pub batch: Batch,
	/// Full storage path of the entry.
	pub path: &'a str,
}

impl<'a> ArtifactName<'a> {
	/// Parses the last path segment as `instance_<digits>_<anything>`.
	///
	/// Returns `None` for entries that do not follow the convention, including
	/// batch numbers that do not fit in a [`Batch`].
	pub fn parse(path: &'a str) -> Option<Self> {
		let name = path.trim_end_matches('/').rsplit('/').next()?;
		let rest = name.strip_prefix(INSTANCE_PREFIX)?;
		let (digits, _) = rest.split_once('_')?;
		if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
			return None;
		}
		let batch = digits.parse().ok()?;
		Some(Self { batch, path })
	}
}

/// Storage folder name for the day containing `date`.
pub fn date_partition(date: DateTime<Utc>) -> String {
	date.format("%Y-%m-%d").to_string()
}

/// Joins `namespace` and the date folder into a listing prefix ending in `/`.
pub fn partition_prefix(namespace: &str, date: DateTime<Utc>) -> String {
	format!("{}/{}/", namespace.trim_end_matches('/'), date_partition(date))
}

/// Builds a link to an object by appending `path` to `base`.
///
/// Each segment of `path` is percent-encoded on its own so the `/`
/// separators are kept.
pub fn object_url(base: &Url, path: &str) -> Url {
	let mut url = base.clone();
	if let Ok(mut segments) = url.path_segments_mut() {
		segments
			.pop_if_empty()
			.extend(path.trim_start_matches('/').split('/'));
	}
	url
}

/// Links to a solver's published result for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLinks {
	/// Solution validity file.
	pub result: Url,
	/// Solution graph visualization.
	pub graph: Url,
}

/// Resolved solver identity and, once published, its artifact links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultData {
	/// Display name of the solver.
	pub solver: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub links: Option<ArtifactLinks>,
}
