//! String formatting utilities.
//!
//! Provides the display forms used by batch summaries: shortened transaction
//! hashes and `m:ss` countdowns.

/// Shortens a transaction hash to its first 6 and last 4 characters.
///
/// Hashes of 10 characters or fewer are returned unchanged.
pub fn format_tx(hash: &str) -> String {
	let chars: Vec<char> = hash.chars().collect();
	if chars.len() <= 10 {
		return hash.to_string();
	}
	let head: String = chars[..6].iter().collect();
	let tail: String = chars[chars.len() - 4..].iter().collect();
	format!("{}...{}", head, tail)
}

/// Formats a number of seconds as `m:ss`.
pub fn format_time(seconds: u64) -> String {
	format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}
