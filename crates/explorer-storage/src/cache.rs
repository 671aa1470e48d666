//! Upgrade-only artifact cache.
//!
//! Entries go from absent to present and then never change. A published
//! artifact does not move, so the first link seen for a key stays valid for
//! the lifetime of the process.

use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::RwLock;

/// Cache from an artifact key to its resolved link.
pub struct ArtifactCache<K, V> {
	entries: RwLock<HashMap<K, V>>,
}

impl<K, V> ArtifactCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	pub fn new() -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
		}
	}

	pub async fn get(&self, key: &K) -> Option<V> {
		self.entries.read().await.get(key).cloned()
	}

	/// Records `value` for `key` unless the key is already present.
	///
	/// Returns whether the value was inserted.
	pub async fn upgrade(&self, key: K, value: V) -> bool {
		let mut entries = self.entries.write().await;
		if entries.contains_key(&key) {
			return false;
		}
		entries.insert(key, value);
		true
	}

	/// Records every pair whose key is still absent, under one lock.
	pub async fn upgrade_all(&self, pairs: impl IntoIterator<Item = (K, V)>) -> usize {
		let mut entries = self.entries.write().await;
		let mut inserted = 0;
		for (key, value) in pairs {
			if let std::collections::hash_map::Entry::Vacant(entry) = entries.entry(key) {
				entry.insert(value);
				inserted += 1;
			}
		}
		inserted
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}
}

impl<K, V> Default for ArtifactCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_entries_are_never_overwritten() {
		let cache: ArtifactCache<u64, String> = ArtifactCache::new();
		assert!(cache.get(&1).await.is_none());

		assert!(cache.upgrade(1, "first".to_string()).await);
		assert!(!cache.upgrade(1, "second".to_string()).await);
		assert_eq!(cache.get(&1).await.as_deref(), Some("first"));
	}

	#[tokio::test]
	async fn test_upgrade_all() {
		let cache: ArtifactCache<u64, &str> = ArtifactCache::new();
		cache.upgrade(2, "kept").await;

		let inserted = cache.upgrade_all([(1, "a"), (2, "b"), (3, "c")]).await;
		assert_eq!(inserted, 2);
		assert_eq!(cache.len().await, 3);
		assert_eq!(cache.get(&2).await, Some("kept"));
	}
}
