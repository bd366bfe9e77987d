//! Instruction classifier
//!
//! Decides, once per static instruction, which calls to insert. Only
//! instructions within the main executable recorded by the image tracker
//! are ever instrumented.

// Imports
use {
	crate::{
		context::TraceContext,
		host::{AnalysisFn, CallArgs, InsertPoint, Instruction, MemOperand},
		image::ImageTracker,
	},
	std::{io, sync::Arc},
};

/// Instrumentation plan for an instruction
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct InstrumentationPlan {
	/// Record the instruction fetch
	pub fetch: bool,

	/// Record the first memory read
	pub read: bool,

	/// Record the second memory read
	pub read2: bool,

	/// Record the memory write
	pub write: bool,
}

impl InstrumentationPlan {
	/// Plan that inserts nothing
	pub const EMPTY: Self = Self {
		fetch: false,
		read:  false,
		read2: false,
		write: false,
	};

	/// Classifies an instruction.
	///
	/// Instructions outside the main executable `images` recorded, or
	/// discovered before it was loaded, get the empty plan.
	pub fn classify(inst: &dyn Instruction, images: &ImageTracker, trace_fetch: bool) -> Self {
		if !images.in_main(inst.address()) {
			return Self::EMPTY;
		}

		Self {
			fetch: trace_fetch,
			read:  inst.has_memory_read(),
			read2: inst.has_memory_read2(),
			write: inst.has_memory_write(),
		}
	}

	/// Returns whether this plan inserts nothing
	pub fn is_empty(&self) -> bool {
		*self == Self::EMPTY
	}
}

/// Instruments an instruction, returning the plan applied.
///
/// All calls are inserted before the instruction, so effective addresses are
/// captured before the instruction can modify the registers they depend on.
/// Within an instruction the fetch is recorded first, followed by the reads and then the write.
pub fn instrument<W>(ctx: &Arc<TraceContext<W>>, inst: &mut dyn Instruction) -> InstrumentationPlan
where
	W: io::Write + Send + 'static,
{
	let plan = InstrumentationPlan::classify(inst, ctx.images(), ctx.config().trace_fetch);

	if plan.fetch {
		let ctx = Arc::clone(ctx);
		inst.insert_call(
			InsertPoint::Before,
			None,
			Arc::new(move |args: &CallArgs| ctx.recorder().record_fetch(args.ip)),
		);
	}

	let operands = [
		(plan.read, MemOperand::Read),
		(plan.read2, MemOperand::Read2),
		(plan.write, MemOperand::Write),
	];
	for (_, operand) in operands.into_iter().filter(|&(enabled, _)| enabled) {
		inst.insert_call(InsertPoint::Before, Some(operand), self::mem_access_fn(ctx, operand));
	}

	plan
}

/// Returns the analysis function recording accesses to `operand`
fn mem_access_fn<W>(ctx: &Arc<TraceContext<W>>, operand: MemOperand) -> AnalysisFn
where
	W: io::Write + Send + 'static,
{
	let ctx = Arc::clone(ctx);
	Arc::new(move |args: &CallArgs| {
		// Note: The host always passes the effective address of the operand we asked for
		let ea = args.ea.unwrap_or_default();
		let recorder = ctx.recorder();
		match operand {
			MemOperand::Read => recorder.record_read(args.ip, ea, args.tid),
			MemOperand::Read2 => recorder.record_read2(args.ip, ea, args.tid),
			MemOperand::Write => recorder.record_write(args.ip, ea, args.tid),
		}
	})
}
