//! Trace context

// Imports
use {
	crate::{config::TraceConfig, image::ImageTracker, recorder::EventRecorder, trace::TraceSink},
	memtrace_util::LockUnpoisoned,
	std::{fmt, io, sync::Mutex},
};

/// Trace context.
///
/// Everything the host callbacks share while tracing a target.
#[derive(Debug)]
pub struct TraceContext<W> {
	/// Config
	config: TraceConfig,

	/// Sink
	sink: TraceSink<W>,

	/// Image tracker
	images: ImageTracker,

	/// Lifecycle state
	state: Mutex<LifecycleState>,
}

impl<W: io::Write> TraceContext<W> {
	/// Creates a new context, in the `Uninitialized` state
	pub fn new(config: TraceConfig, sink: TraceSink<W>) -> Self {
		Self {
			config,
			sink,
			images: ImageTracker::new(),
			state: Mutex::new(LifecycleState::Uninitialized),
		}
	}

	/// Returns the config
	pub fn config(&self) -> &TraceConfig {
		&self.config
	}

	/// Returns the sink
	pub fn sink(&self) -> &TraceSink<W> {
		&self.sink
	}

	/// Returns the image tracker
	pub fn images(&self) -> &ImageTracker {
		&self.images
	}

	/// Returns a recorder over our sink
	pub fn recorder(&self) -> EventRecorder<'_, W> {
		EventRecorder::new(&self.sink)
	}

	/// Returns the current lifecycle state
	pub fn state(&self) -> LifecycleState {
		*self.state.lock_unpoisoned()
	}

	/// Advances the lifecycle state to `next`.
	///
	/// # Errors
	/// Returns an error if `next` doesn't immediately follow the current state.
	pub fn advance(&self, next: LifecycleState) -> Result<(), anyhow::Error> {
		let mut state = self.state.lock_unpoisoned();
		anyhow::ensure!(
			state.next() == Some(next),
			"Cannot transition from {} to {next}",
			*state
		);

		let prev = std::mem::replace(&mut *state, next);
		tracing::debug!(from = %prev, to = %next, "Lifecycle transition");
		Ok(())
	}
}

/// Lifecycle state
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug)]
pub enum LifecycleState {
	/// Nothing set up yet
	Uninitialized,

	/// Host initialized and trace opened
	Ready,

	/// Target is running
	Running,

	/// Trace finished and closed
	Finalized,
}

impl LifecycleState {
	/// Returns the state after this one
	pub fn next(self) -> Option<Self> {
		match self {
			Self::Uninitialized => Some(Self::Ready),
			Self::Ready => Some(Self::Running),
			Self::Running => Some(Self::Finalized),
			Self::Finalized => None,
		}
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Uninitialized => "uninitialized",
			Self::Ready => "ready",
			Self::Running => "running",
			Self::Finalized => "finalized",
		};
		f.write_str(name)
	}
}
