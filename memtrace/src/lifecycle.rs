//! Lifecycle
//!
//! Ties the image tracker, classifier and recorder to a host, runs the
//! target and finalizes the trace once it terminates.

// Imports
use {
	crate::{
		classifier,
		config::TraceConfig,
		context::{LifecycleState, TraceContext},
		error::StartupError,
		host::{Image, Instruction, InstrumentationHost},
		trace::{TraceEvent, TraceSink},
	},
	anyhow::Context,
	memtrace_util::LockUnpoisoned,
	std::{
		fs,
		io::{self, BufWriter},
		path::Path,
		sync::{Arc, Mutex},
	},
};

/// Tracer, ready to run the target
#[derive(Debug)]
pub struct Tracer<H, W> {
	/// Host
	host: H,

	/// Context
	ctx: Arc<TraceContext<W>>,
}

/// Result of a finished trace
#[derive(Debug)]
pub struct Finished<W> {
	/// Target exit code
	pub exit_code: i32,

	/// Closed trace writer
	pub writer: W,
}

impl<H: InstrumentationHost> Tracer<H, BufWriter<fs::File>> {
	/// Initializes the host and opens the trace file at `config.output`.
	///
	/// # Errors
	/// Returns an error if the host fails to initialize or the trace file
	/// can't be created. In both cases no trace file is left behind.
	pub fn init(config: TraceConfig, host: H) -> Result<Self, StartupError> {
		Self::init_with(config, host, TraceSink::create)
	}
}

impl<H, W> Tracer<H, W>
where
	H: InstrumentationHost,
	W: io::Write + Send + 'static,
{
	/// Initializes the host and opens the trace with `open_sink`.
	///
	/// The host is initialized first, so the sink is only opened once nothing
	/// else can fail.
	///
	/// # Errors
	/// Returns an error if the host fails to initialize or the sink can't be opened.
	pub fn init_with<F>(config: TraceConfig, mut host: H, open_sink: F) -> Result<Self, StartupError>
	where
		F: FnOnce(&Path) -> Result<TraceSink<W>, io::Error>,
	{
		tracing::debug!(?config, "Initializing tracer");
		host.init().map_err(StartupError::HostInit)?;

		let sink = open_sink(&config.output).map_err(|source| StartupError::Io {
			path: config.output.clone(),
			source,
		})?;
		tracing::debug!(output = ?config.output, "Opened trace");

		let ctx = Arc::new(TraceContext::new(config, sink));
		ctx.advance(LifecycleState::Ready).map_err(StartupError::Lifecycle)?;
		tracing::debug!("Tracer initialized");

		Ok(Self { host, ctx })
	}

	/// Registers all callbacks with the host and runs the target until it terminates.
	///
	/// # Errors
	/// Returns an error if the target terminated abnormally, if the host never
	/// finalized it, or if the trace couldn't be closed.
	pub fn run(mut self) -> Result<Finished<W>, anyhow::Error> {
		let ctx = Arc::clone(&self.ctx);
		self.host.on_image_load(Box::new(move |image: &Image| {
			ctx.images().image_loaded(image, ctx.sink());
		}));

		let ctx = Arc::clone(&self.ctx);
		self.host.on_instruction(Box::new(move |inst: &mut dyn Instruction| {
			classifier::instrument(&ctx, inst);
		}));

		let ctx = Arc::clone(&self.ctx);
		let finished = Arc::new(Mutex::new(None));
		let finished_slot = Arc::clone(&finished);
		self.host.on_finalize(Box::new(move |exit_code: i32| {
			let res = self::finalize(&ctx, exit_code);
			*finished_slot.lock_unpoisoned() = Some((exit_code, res));
		}));

		self.ctx.advance(LifecycleState::Running)?;
		tracing::info!("Running target");
		let run_res = self.host.run();

		let finished = finished.lock_unpoisoned().take();
		let (exit_code, writer) = match finished {
			Some((exit_code, res)) => (exit_code, res.context("Unable to finalize trace")?),
			None => {
				debug_assert!(self.ctx.sink().is_open(), "Trace was closed without being finalized");
				tracing::warn!("Host never finalized the target, trace is missing its finish marker");
				run_res.context("Target terminated abnormally")?;
				anyhow::bail!("Target terminated without being finalized");
			},
		};
		run_res.context("Target terminated abnormally")?;

		tracing::info!(exit_code, "Target finished");
		Ok(Finished { exit_code, writer })
	}
}

/// Finalizes the trace, writing the finish marker and closing it
fn finalize<W: io::Write>(ctx: &TraceContext<W>, exit_code: i32) -> Result<W, anyhow::Error> {
	tracing::debug!(exit_code, "Finalizing trace");

	ctx.sink().append(&TraceEvent::Finish);
	let events_appended = ctx.sink().events_appended();
	let writer = ctx.sink().close().context("Unable to close trace")?;
	ctx.advance(LifecycleState::Finalized)?;

	tracing::info!(events_appended, "Trace finished");
	Ok(writer)
}
