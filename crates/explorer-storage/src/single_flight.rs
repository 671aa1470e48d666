//! Single-flight coordination of storage listings.
//!
//! Concurrent callers asking for the same (bucket, prefix) share one
//! in-flight listing. Every caller registers a listener; the first one also
//! spawns the listing task, which hands its result to all listeners that
//! registered before it finished. Because the listing runs in its own task, a
//! caller that is dropped mid-wait does not strand the others.

use crate::{BucketLocation, ListingInterface, StorageError};
use explorer_types::Listing;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Result handed to every waiter of a shared listing.
pub type SharedListing = Result<Arc<Listing>, StorageError>;

type ListingKey = (String, String);
type Listeners = HashMap<ListingKey, Vec<oneshot::Sender<SharedListing>>>;

/// Coordinates listings so at most one is in flight per (bucket, prefix).
pub struct ListingCoordinator {
	backend: Arc<dyn ListingInterface>,
	listeners: Arc<Mutex<Listeners>>,
}

fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
	// The map stays consistent even if a holder panicked
	listeners
		.lock()
		.unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ListingCoordinator {
	pub fn new(backend: Arc<dyn ListingInterface>) -> Self {
		Self {
			backend,
			listeners: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Lists `prefix` in `bucket`, joining an in-flight listing if one exists.
	pub async fn list(&self, bucket: &BucketLocation, prefix: &str) -> SharedListing {
		let key = (bucket.name.clone(), prefix.to_string());
		let (sender, receiver) = oneshot::channel();

		let needs_listing = match lock(&self.listeners).entry(key.clone()) {
			Entry::Vacant(entry) => {
				entry.insert(vec![sender]);
				true
			},
			Entry::Occupied(mut entry) => {
				entry.get_mut().push(sender);
				false
			},
		};

		if needs_listing {
			tracing::debug!(bucket = %bucket.name, prefix, "Starting shared listing");
			let backend = self.backend.clone();
			let bucket = bucket.clone();
			let guard = InFlight {
				listeners: self.listeners.clone(),
				key: Some(key),
			};
			tokio::spawn(async move {
				let result = backend.list(&bucket, &guard.prefix()).await.map(Arc::new);
				guard.complete(result);
			});
		} else {
			tracing::debug!(bucket = %bucket.name, prefix, "Joining in-flight listing");
		}

		receiver.await.unwrap_or_else(|_| {
			Err(StorageError::Backend(
				"Listing task ended without a result".to_string(),
			))
		})
	}

	/// Number of listings currently in flight.
	pub fn in_flight(&self) -> usize {
		lock(&self.listeners).len()
	}
}

/// Ownership of an in-flight entry.
///
/// Completing it notifies every listener. Dropping it without completing,
/// which only happens if the listing task panics, removes the entry so its
/// listeners observe an error and later callers start a fresh listing.
struct InFlight {
	listeners: Arc<Mutex<Listeners>>,
	key: Option<ListingKey>,
}

impl InFlight {
	fn prefix(&self) -> String {
		self.key
			.as_ref()
			.map(|(_, prefix)| prefix.clone())
			.unwrap_or_default()
	}

	fn complete(mut self, result: SharedListing) {
		let Some(key) = self.key.take() else {
			return;
		};
		let waiters = lock(&self.listeners).remove(&key).unwrap_or_default();
		tracing::debug!(
			bucket = %key.0,
			prefix = %key.1,
			waiters = waiters.len(),
			ok = result.is_ok(),
			"Shared listing finished"
		);
		for waiter in waiters {
			// A dropped receiver means that caller went away
			let _ = waiter.send(result.clone());
		}
	}
}

impl Drop for InFlight {
	fn drop(&mut self) {
		if let Some(key) = self.key.take() {
			lock(&self.listeners).remove(&key);
		}
	}
}
