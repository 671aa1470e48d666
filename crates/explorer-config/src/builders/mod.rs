//! Builders for constructing configurations in tests.

pub mod config;

pub use config::ConfigBuilder;
