//! Logger
//!
//! Logging goes to stderr, filtered by `RUST_LOG` (defaults to `info`),
//! and optionally to a file, filtered by `RUST_LOG_FILE` (defaults to `debug`).

// Imports
use {
	crate::LockUnpoisoned,
	std::{fs, path::Path, sync::Mutex},
	tracing::Level,
	tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer},
};

/// Default stderr filter
const DEFAULT_STDERR_FILTER: &str = "info";

/// Default file filter
const DEFAULT_FILE_FILTER: &str = "debug";

/// Initializes the logger.
///
/// If `log_file` is given, verbose logs are also written to it, truncating
/// it unless `append` is set.
/// Any messages logged with [`pre_init`] are emitted after initialization.
///
/// # Panics
/// Panics if a global subscriber was already set.
pub fn init(log_file: Option<&Path>, append: bool) {
	let stderr_layer = fmt::layer()
		.with_writer(std::io::stderr)
		.with_filter(self::env_filter("RUST_LOG", DEFAULT_STDERR_FILTER));

	// Note: If we can't open the log file, we still want to log to stderr, so
	//       we report the error after initializing instead of failing.
	let (file_layer, file_err) = match log_file.map(|path| self::open_log_file(path, append)) {
		Some(Ok(file)) => {
			let layer = fmt::layer()
				.with_ansi(false)
				.with_writer(Mutex::new(file))
				.with_filter(self::env_filter("RUST_LOG_FILE", DEFAULT_FILE_FILTER));
			(Some(layer), None)
		},
		Some(Err(err)) => (None, Some(err)),
		None => (None, None),
	};

	tracing_subscriber::registry()
		.with(stderr_layer)
		.with(file_layer)
		.init();

	if let Some(err) = file_err {
		tracing::warn!(?log_file, ?err, "Unable to open log file");
	}

	pre_init::flush();
}

/// Creates an env filter from `var`, or `default` if unset or invalid
fn env_filter(var: &str, default: &str) -> EnvFilter {
	EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Opens the log file
fn open_log_file(path: &Path, append: bool) -> Result<fs::File, std::io::Error> {
	fs::OpenOptions::new()
		.create(true)
		.write(true)
		.append(append)
		.truncate(!append)
		.open(path)
}

/// Logging before the logger is initialized.
///
/// Messages are buffered and emitted once [`init`](super::init) is called.
pub mod pre_init {
	// Imports
	use super::*;

	/// Buffered messages
	static MESSAGES: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

	/// Buffers a message with `level`
	fn push(level: Level, msg: impl Into<String>) {
		MESSAGES.lock_unpoisoned().push((level, msg.into()));
	}

	/// Buffers a debug message
	pub fn debug(msg: impl Into<String>) {
		self::push(Level::DEBUG, msg);
	}

	/// Buffers an info message
	pub fn info(msg: impl Into<String>) {
		self::push(Level::INFO, msg);
	}

	/// Buffers a warning message
	pub fn warn(msg: impl Into<String>) {
		self::push(Level::WARN, msg);
	}

	/// Emits all buffered messages
	pub(super) fn flush() {
		let messages = std::mem::take(&mut *MESSAGES.lock_unpoisoned());
		for (level, msg) in messages {
			match level {
				Level::TRACE => tracing::trace!("{msg}"),
				Level::DEBUG => tracing::debug!("{msg}"),
				Level::INFO => tracing::info!("{msg}"),
				Level::WARN => tracing::warn!("{msg}"),
				_ => tracing::error!("{msg}"),
			}
		}
	}

	#[cfg(test)]
	mod tests {
		use super::*;

		#[test]
		fn flush_drains_messages() {
			super::debug("first");
			super::warn(String::from("second"));
			assert!(MESSAGES.lock_unpoisoned().len() >= 2);

			// Note: Without a subscriber the messages are simply discarded
			super::flush();
			assert!(MESSAGES.lock_unpoisoned().is_empty());
		}
	}
}
