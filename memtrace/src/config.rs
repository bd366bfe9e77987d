//! Configuration

// Imports
use std::path::PathBuf;

/// Default output path
pub const DEFAULT_OUTPUT: &str = "memtrace.out";

/// Trace configuration
#[derive(PartialEq, Eq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TraceConfig {
	/// Output path
	pub output: PathBuf,

	/// Whether to record instruction fetches
	pub trace_fetch: bool,
}

impl Default for TraceConfig {
	fn default() -> Self {
		Self {
			output:      PathBuf::from(DEFAULT_OUTPUT),
			trace_fetch: true,
		}
	}
}
