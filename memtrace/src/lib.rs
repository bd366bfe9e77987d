//! Memory access tracer (`memtrace`)
//!
//! Traces every instruction of a target's main executable, along with
//! the effective addresses of its memory operands.

// Modules
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod image;
pub mod lifecycle;
pub mod recorder;
pub mod trace;

// Exports
pub use self::{
	config::TraceConfig,
	context::{LifecycleState, TraceContext},
	error::StartupError,
	host::{InstrumentationHost, ScriptHost},
	lifecycle::{Finished, Tracer},
	trace::{TraceEvent, TraceReader, TraceSink},
};
