//! Common types module for the batch explorer.
//!
//! This module defines the core data types shared by every explorer
//! component: batch arithmetic, networks, solver identities, solution
//! states, artifact naming and the HTTP API views.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Artifact naming conventions and storage link construction.
pub mod artifact;
/// Batch arithmetic and time sources.
pub mod batch;
/// Network configuration types.
pub mod networks;
/// Registry trait for pluggable backends.
pub mod registry;
/// Solutions and per-batch solution states.
pub mod solution;
/// Solver identities and registry entries.
pub mod solver;
/// Utility functions for display formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use artifact::*;
pub use batch::*;
pub use networks::{Network, NetworkConfig, NetworksConfig};
pub use registry::ImplementationRegistry;
pub use solution::*;
pub use solver::*;
pub use utils::{current_timestamp, format_time, format_tx, with_0x_prefix};
pub use validation::*;
