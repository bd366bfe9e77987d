//! Errors

// Imports
use std::{io, path::PathBuf};

/// Startup error.
///
/// Any of these aborts the run before the target executes.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
	/// The host failed to initialize
	#[error("Unable to initialize instrumentation host")]
	HostInit(#[source] anyhow::Error),

	/// The trace output couldn't be opened
	#[error("Unable to open trace output {path:?}")]
	Io {
		path:   PathBuf,
		#[source]
		source: io::Error,
	},

	/// The tracer couldn't become ready
	#[error("Unable to ready tracer")]
	Lifecycle(#[source] anyhow::Error),
}
