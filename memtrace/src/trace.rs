//! Trace events, and the sink they're written to.
//!
//! A trace is a sequence of newline-terminated ascii lines, one per event:
//!
//! ```text
//! Main executable loaded at address:<base>
//! I 0x<ip>
//! R tid=<tid> ip=0x<ip> ea=0x<ea>
//! R2 tid=<tid> ip=0x<ip> ea=0x<ea>
//! W tid=<tid> ip=0x<ip> ea=0x<ea>
//! # Program finished
//! ```
//!
//! All addresses are lowercase hexadecimal.

// Imports
use {
	crate::host::ThreadId,
	anyhow::Context,
	memtrace_util::LockUnpoisoned,
	std::{
		fmt,
		fs,
		io::{self, BufRead, BufWriter, Write},
		path::Path,
		str::FromStr,
		sync::Mutex,
	},
};

/// Trace event
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum TraceEvent {
	/// Main executable was loaded
	ImageLoad { base: u64 },

	/// Instruction fetch
	Fetch { ip: u64 },

	/// Memory read
	Read(MemAccess),

	/// Second memory read of the same instruction
	Read2(MemAccess),

	/// Memory write
	Write(MemAccess),

	/// Program finished
	Finish,
}

/// A memory access by an instruction
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct MemAccess {
	/// Instruction pointer
	pub ip: u64,

	/// Effective address
	pub ea: u64,

	/// Executing thread
	pub tid: ThreadId,
}

impl TraceEvent {
	/// Returns the instruction pointer of this event, if it has one
	pub fn ip(&self) -> Option<u64> {
		match *self {
			Self::Fetch { ip } => Some(ip),
			Self::Read(access) | Self::Read2(access) | Self::Write(access) => Some(access.ip),
			Self::ImageLoad { .. } | Self::Finish => None,
		}
	}

	/// Returns the memory access of this event, if it has one
	pub fn mem_access(&self) -> Option<MemAccess> {
		match *self {
			Self::Read(access) | Self::Read2(access) | Self::Write(access) => Some(access),
			Self::ImageLoad { .. } | Self::Fetch { .. } | Self::Finish => None,
		}
	}
}

/// Image load line prefix
const IMAGE_LOAD_PREFIX: &str = "Main executable loaded at address:";

/// Finish line
const FINISH_LINE: &str = "# Program finished";

impl fmt::Display for TraceEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ImageLoad { base } => write!(f, "{IMAGE_LOAD_PREFIX}{base:x}"),
			Self::Fetch { ip } => write!(f, "I 0x{ip:x}"),
			Self::Read(access) => write!(f, "R {access}"),
			Self::Read2(access) => write!(f, "R2 {access}"),
			Self::Write(access) => write!(f, "W {access}"),
			Self::Finish => f.write_str(FINISH_LINE),
		}
	}
}

impl fmt::Display for MemAccess {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let Self { ip, ea, tid } = self;
		write!(f, "tid={tid} ip=0x{ip:x} ea=0x{ea:x}")
	}
}

impl FromStr for TraceEvent {
	type Err = anyhow::Error;

	fn from_str(line: &str) -> Result<Self, Self::Err> {
		if line == FINISH_LINE {
			return Ok(Self::Finish);
		}

		if let Some(base) = line.strip_prefix(IMAGE_LOAD_PREFIX) {
			let base = self::parse_hex(base).context("Unable to parse image base")?;
			return Ok(Self::ImageLoad { base });
		}

		let (kind, rest) = line.split_once(' ').context("Missing event kind")?;
		let event = match kind {
			"I" => {
				let ip = rest.strip_prefix("0x").context("Missing `0x` prefix")?;
				let ip = self::parse_hex(ip).context("Unable to parse instruction pointer")?;
				Self::Fetch { ip }
			},
			"R" => Self::Read(rest.parse().context("Unable to parse read")?),
			"R2" => Self::Read2(rest.parse().context("Unable to parse second read")?),
			"W" => Self::Write(rest.parse().context("Unable to parse write")?),
			_ => anyhow::bail!("Unknown event kind: {kind:?}"),
		};

		Ok(event)
	}
}

impl FromStr for MemAccess {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut fields = s.split(' ');
		let mut next_field = |name: &str| {
			fields
				.next()
				.and_then(|field| field.strip_prefix(name))
				.with_context(|| format!("Missing field {name:?}"))
		};

		let tid = next_field("tid=")?.parse().context("Unable to parse thread id")?;
		let ip = next_field("ip=0x").and_then(self::parse_hex)?;
		let ea = next_field("ea=0x").and_then(self::parse_hex)?;
		anyhow::ensure!(fields.next().is_none(), "Unexpected trailing fields");

		Ok(Self {
			ip,
			ea,
			tid: ThreadId(tid),
		})
	}
}

/// Parses a lowercase hexadecimal address
fn parse_hex(s: &str) -> Result<u64, anyhow::Error> {
	anyhow::ensure!(
		!s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')),
		"Expected lowercase hexadecimal, found {s:?}"
	);
	u64::from_str_radix(s, 16).with_context(|| format!("Address out of range: {s:?}"))
}

/// Trace sink.
///
/// The single shared output of a trace. Appends are serialized, so each
/// event ends up as a whole line even when appended from many threads.
#[derive(Debug)]
pub struct TraceSink<W> {
	/// Inner state
	inner: Mutex<SinkInner<W>>,
}

/// Trace sink inner state
#[derive(Debug)]
struct SinkInner<W> {
	/// Writer, `None` once closed
	writer: Option<W>,

	/// First error encountered while appending
	err: Option<io::Error>,

	/// Events appended
	events_appended: u64,

	/// Events dropped because the sink was closed
	events_dropped: u64,
}

impl<W: Write> TraceSink<W> {
	/// Creates a sink writing to `writer`
	pub fn new(writer: W) -> Self {
		Self {
			inner: Mutex::new(SinkInner {
				writer:          Some(writer),
				err:             None,
				events_appended: 0,
				events_dropped:  0,
			}),
		}
	}

	/// Appends an event to the trace.
	///
	/// Never fails: the first write error is kept and returned by [`Self::close`],
	/// and events appended after closing are dropped.
	pub fn append(&self, event: &TraceEvent) {
		let mut inner = self.inner.lock_unpoisoned();
		let inner = &mut *inner;

		let Some(writer) = &mut inner.writer else {
			if inner.events_dropped == 0 {
				tracing::warn!(%event, "Event appended after trace was closed, dropping it");
			}
			inner.events_dropped += 1;
			return;
		};

		// Note: After an error the stream may already be missing lines, so
		//       we stop writing to avoid producing an inconsistent trace.
		if inner.err.is_some() {
			return;
		}

		match writeln!(writer, "{event}") {
			Ok(()) => inner.events_appended += 1,
			Err(err) => {
				tracing::error!(?err, "Unable to write to trace");
				inner.err = Some(err);
			},
		}
	}

	/// Returns the number of events written so far
	pub fn events_appended(&self) -> u64 {
		self.inner.lock_unpoisoned().events_appended
	}

	/// Returns whether the sink is still open
	pub fn is_open(&self) -> bool {
		self.inner.lock_unpoisoned().writer.is_some()
	}

	/// Flushes and closes the sink, returning the writer.
	///
	/// # Errors
	/// Returns an error if any append failed, if unable to flush,
	/// or if the sink was already closed.
	pub fn close(&self) -> Result<W, anyhow::Error> {
		let mut inner = self.inner.lock_unpoisoned();
		let mut writer = inner.writer.take().context("Trace was already closed")?;

		if let Some(err) = inner.err.take() {
			return Err(err).context("Unable to append to trace");
		}
		writer.flush().context("Unable to flush trace")?;

		tracing::debug!(events_appended = inner.events_appended, "Closed trace");
		Ok(writer)
	}
}

impl TraceSink<BufWriter<fs::File>> {
	/// Creates a sink writing to a file at `path`, truncating it if it exists
	pub fn create(path: &Path) -> Result<Self, io::Error> {
		let file = fs::File::create(path)?;
		Ok(Self::new(BufWriter::new(file)))
	}
}

/// Trace reader
#[derive(Debug)]
pub struct TraceReader<R> {
	/// Reader
	reader: R,

	/// Current line number
	line_idx: usize,

	/// Line buffer
	line: String,
}

impl<R: BufRead> TraceReader<R> {
	/// Creates a trace reader
	pub fn new(reader: R) -> Self {
		Self {
			reader,
			line_idx: 0,
			line: String::new(),
		}
	}

	/// Reads the next event
	pub fn read_next(&mut self) -> Result<Option<TraceEvent>, anyhow::Error> {
		self.line.clear();
		let bytes_read = self
			.reader
			.read_line(&mut self.line)
			.with_context(|| format!("Unable to read line {}", self.line_idx + 1))?;
		if bytes_read == 0 {
			return Ok(None);
		}
		self.line_idx += 1;

		let line = self
			.line
			.strip_suffix('\n')
			.with_context(|| format!("Line {} is missing its newline", self.line_idx))?;
		let event = line
			.parse()
			.with_context(|| format!("Unable to parse line {}: {line:?}", self.line_idx))?;

		Ok(Some(event))
	}

	/// Reads all remaining events
	pub fn read_all(&mut self) -> Result<Vec<TraceEvent>, anyhow::Error> {
		std::iter::from_fn(|| self.read_next().transpose()).collect()
	}
}
