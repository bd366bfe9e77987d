//! Arguments

// Imports
use std::path::PathBuf;

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
pub struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	pub log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	pub log_file_append: bool,

	/// Target script
	pub script: PathBuf,

	/// Output file
	///
	/// Defaults to `memtrace.out`
	#[clap(short = 'o', long = "output")]
	pub output: Option<PathBuf>,

	/// Config file
	#[clap(long = "config")]
	pub config_file: Option<PathBuf>,

	/// Don't record instruction fetches
	#[clap(long = "no-fetch")]
	pub no_fetch: bool,
}
