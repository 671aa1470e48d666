//! Registry trait for self-registering backend implementations.
//!
//! Listing and indexer backends each provide a `Registry` struct so the
//! builder can map the names used in configuration to factory functions.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Name used in configuration to select this implementation, for example
	/// `"s3"` for `[storage.implementations.s3]`.
	const NAME: &'static str;

	/// Factory function type of the implementation's module.
	type Factory;

	/// Returns the factory that builds the implementation from its TOML table.
	fn factory() -> Self::Factory;
}
