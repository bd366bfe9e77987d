//! Event recorder

// Imports
use {
	crate::{
		host::ThreadId,
		trace::{MemAccess, TraceEvent, TraceSink},
	},
	std::io,
};

/// Event recorder.
///
/// Called on every execution of an instrumented instruction, so it
/// doesn't filter anything, it just forwards each event to the sink.
#[derive(Debug)]
pub struct EventRecorder<'a, W> {
	/// Sink
	sink: &'a TraceSink<W>,
}

impl<'a, W: io::Write> EventRecorder<'a, W> {
	/// Creates a recorder over `sink`
	pub fn new(sink: &'a TraceSink<W>) -> Self {
		Self { sink }
	}

	/// Records an instruction fetch
	pub fn record_fetch(&self, ip: u64) {
		self.sink.append(&TraceEvent::Fetch { ip });
	}

	/// Records a memory read
	pub fn record_read(&self, ip: u64, ea: u64, tid: ThreadId) {
		self.sink.append(&TraceEvent::Read(MemAccess { ip, ea, tid }));
	}

	/// Records a second memory read
	pub fn record_read2(&self, ip: u64, ea: u64, tid: ThreadId) {
		self.sink.append(&TraceEvent::Read2(MemAccess { ip, ea, tid }));
	}

	/// Records a memory write
	pub fn record_write(&self, ip: u64, ea: u64, tid: ThreadId) {
		self.sink.append(&TraceEvent::Write(MemAccess { ip, ea, tid }));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn records_each_kind() {
		let sink = TraceSink::new(vec![]);
		let recorder = EventRecorder::new(&sink);
		recorder.record_fetch(0x401000);
		recorder.record_read(0x401000, 0x7ff0, ThreadId(0));
		recorder.record_read2(0x401000, 0x7ff8, ThreadId(0));
		recorder.record_write(0x401004, 0x6000, ThreadId(1));

		let bytes = sink.close().unwrap();
		assert_eq!(
			String::from_utf8(bytes).unwrap(),
			"I 0x401000\nR tid=0 ip=0x401000 ea=0x7ff0\nR2 tid=0 ip=0x401000 ea=0x7ff8\nW tid=1 ip=0x401004 ea=0x6000\n"
		);
	}
}
