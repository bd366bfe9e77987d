//! Instrumentation host.
//!
//! The host is the dynamic-instrumentation engine running the target program.
//! It reports image loads, lets us instrument each instruction once when it's
//! discovered, invokes the inserted calls whenever the instruction executes, and
//! finally reports the target's termination.

// Modules
pub mod script;

// Exports
pub use self::script::ScriptHost;

// Imports
use std::{fmt, sync::Arc};

/// Instrumentation host
pub trait InstrumentationHost {
	/// Initializes the host.
	///
	/// # Errors
	/// Returns an error if the host cannot run the target.
	fn init(&mut self) -> Result<(), anyhow::Error>;

	/// Registers a callback for each image load
	fn on_image_load(&mut self, callback: ImageLoadFn);

	/// Registers a callback for each discovered instruction
	fn on_instruction(&mut self, callback: InstructionFn);

	/// Registers a callback for the target's termination
	fn on_finalize(&mut self, callback: FinalizeFn);

	/// Runs the target until it terminates.
	///
	/// # Errors
	/// Returns an error if the target terminated abnormally.
	fn run(&mut self) -> Result<(), anyhow::Error>;
}

/// Image load callback
pub type ImageLoadFn = Box<dyn Fn(&Image) + Send + Sync>;

/// Instruction discovery callback
pub type InstructionFn = Box<dyn Fn(&mut dyn Instruction) + Send + Sync>;

/// Finalize callback, receiving the target's exit code
pub type FinalizeFn = Box<dyn FnOnce(i32) + Send>;

/// Analysis callback, invoked on each execution of an instruction
pub type AnalysisFn = Arc<dyn Fn(&CallArgs) + Send + Sync>;

/// A discovered instruction
pub trait Instruction {
	/// Returns the address of this instruction
	fn address(&self) -> u64;

	/// Returns the image this instruction belongs to, if any
	fn image(&self) -> Option<&Image>;

	/// Returns whether this instruction reads memory
	fn has_memory_read(&self) -> bool;

	/// Returns whether this instruction has a second memory read operand
	fn has_memory_read2(&self) -> bool;

	/// Returns whether this instruction writes memory
	fn has_memory_write(&self) -> bool;

	/// Inserts a call to `callback` on every execution of this instruction.
	///
	/// If `operand` is given, the effective address of that operand is passed
	/// in [`CallArgs::ea`].
	fn insert_call(&mut self, point: InsertPoint, operand: Option<MemOperand>, callback: AnalysisFn);
}

/// Where to insert a call relative to the instruction
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum InsertPoint {
	/// Before the instruction executes
	Before,

	/// After the instruction executes
	After,
}

/// Memory operand of an instruction
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum MemOperand {
	/// First memory read
	Read,

	/// Second memory read
	Read2,

	/// Memory write
	Write,
}

/// Arguments passed to an analysis callback
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct CallArgs {
	/// Instruction pointer
	pub ip: u64,

	/// Effective address of the requested operand
	pub ea: Option<u64>,

	/// Executing thread
	pub tid: ThreadId,
}

/// Thread id, as assigned by the host
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// A loaded image
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Image {
	/// Name
	name: String,

	/// Base (lowest) address
	base: u64,

	/// Size, in bytes
	size: u64,

	/// Whether this is the main executable
	is_main: bool,
}

impl Image {
	/// Creates a new image
	pub fn new(name: impl Into<String>, base: u64, size: u64, is_main: bool) -> Self {
		Self {
			name: name.into(),
			base,
			size,
			is_main,
		}
	}

	/// Returns the name of this image
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns the base address of this image
	pub fn base(&self) -> u64 {
		self.base
	}

	/// Returns the size of this image
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Returns whether this image is the main executable
	pub fn is_main(&self) -> bool {
		self.is_main
	}

	/// Returns the end address (exclusive) of this image
	pub fn end(&self) -> u64 {
		self.base.saturating_add(self.size)
	}

	/// Returns whether `addr` lies within this image
	pub fn contains(&self, addr: u64) -> bool {
		(self.base..self.end()).contains(&addr)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn image_contains() {
		let image = Image::new("a.out", 0x1000, 0x2000, true);
		assert!(!image.contains(0xfff));
		assert!(image.contains(0x1000));
		assert!(image.contains(0x2fff));
		assert!(!image.contains(0x3000));
	}

	#[test]
	fn image_end_saturates() {
		let image = Image::new("top", u64::MAX - 1, 0x10, false);
		assert_eq!(image.end(), u64::MAX);
		assert!(image.contains(u64::MAX - 1));
	}
}
