//! Utility functions for display formatting and time.

pub mod formatting;
pub mod helpers;

pub use formatting::{format_time, format_tx, with_0x_prefix};
pub use helpers::current_timestamp;
