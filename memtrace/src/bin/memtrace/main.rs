//! Memory access tracer (`memtrace`)

// Modules
mod args;

// Imports
use {
	self::args::Args,
	anyhow::Context,
	clap::Parser,
	memtrace::{ScriptHost, TraceConfig, Tracer},
	memtrace_util::logger,
	std::fs,
};

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	// Read the config file, then apply any overrides
	let mut config = match &args.config_file {
		Some(config_path) => {
			let config_file = fs::File::open(config_path).context("Unable to open config file")?;
			serde_json::from_reader::<_, TraceConfig>(config_file).context("Unable to parse config file")?
		},
		None => TraceConfig::default(),
	};
	if let Some(output) = args.output {
		config.output = output;
	}
	if args.no_fetch {
		config.trace_fetch = false;
	}

	// Then trace the target
	let host = ScriptHost::from_path(&args.script);
	let tracer = Tracer::init(config, host).context("Unable to start tracing")?;
	let finished = tracer.run().context("Unable to trace target")?;
	tracing::debug!(exit_code = finished.exit_code, "Target exited");

	Ok(())
}
