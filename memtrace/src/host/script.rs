//! Script host.
//!
//! Replays a target described by a json script: the images it loads, the
//! operand shape of its instructions and what each of its threads executes.

// Imports
use {
	super::{
		AnalysisFn,
		CallArgs,
		FinalizeFn,
		Image,
		ImageLoadFn,
		InsertPoint,
		Instruction,
		InstructionFn,
		InstrumentationHost,
		MemOperand,
		ThreadId,
	},
	anyhow::Context,
	itertools::Itertools,
	memtrace_util::LockUnpoisoned,
	std::{
		collections::{hash_map, HashMap},
		fs,
		fmt,
		path::PathBuf,
		sync::{
			atomic::{self, AtomicBool},
			Arc,
			Mutex,
		},
		thread,
	},
};

/// Exit code reported when a target thread panics
pub const PANIC_EXIT_CODE: i32 = 101;

/// Exit code reported when the target faults, as a shell reports a segmentation fault
pub const FAULT_EXIT_CODE: i32 = 139;

/// Target script
#[derive(PartialEq, Eq, Clone, Default, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
	/// Images, in load order
	#[serde(default)]
	pub images: Vec<ScriptImage>,

	/// Instructions
	#[serde(default)]
	pub instructions: Vec<ScriptInstruction>,

	/// Executions of each thread
	#[serde(default)]
	pub threads: Vec<Vec<Execution>>,

	/// Exit code
	#[serde(default)]
	pub exit_code: i32,
}

/// Script image
#[derive(PartialEq, Eq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptImage {
	pub name: String,
	pub base: u64,
	pub size: u64,
	#[serde(default)]
	pub main: bool,
}

/// Script instruction
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptInstruction {
	pub ip:    u64,
	#[serde(default)]
	pub read:  bool,
	#[serde(default)]
	pub read2: bool,
	#[serde(default)]
	pub write: bool,
}

/// Execution of an instruction
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Execution {
	pub ip:       u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub read_ea:  Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub read2_ea: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub write_ea: Option<u64>,

	/// Whether the target faults on this execution, after the calls inserted before it
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub fault:    bool,
}

impl Execution {
	/// Returns the effective address of `operand`
	pub fn ea(&self, operand: MemOperand) -> Option<u64> {
		match operand {
			MemOperand::Read => self.read_ea,
			MemOperand::Read2 => self.read2_ea,
			MemOperand::Write => self.write_ea,
		}
	}
}

/// Script host
pub struct ScriptHost {
	/// Script source
	source: Option<ScriptSource>,

	/// Target, once initialized
	target: Option<Target>,

	/// Image load callbacks
	image_load_fns: Vec<ImageLoadFn>,

	/// Instruction callbacks
	instruction_fns: Vec<InstructionFn>,

	/// Finalize callbacks
	finalize_fns: Vec<FinalizeFn>,
}

/// Script source
#[derive(Debug)]
enum ScriptSource {
	/// Json file
	Path(PathBuf),

	/// Already parsed
	Script(Script),
}

impl ScriptHost {
	/// Creates a host that will read its script from `path`
	pub fn from_path(path: impl Into<PathBuf>) -> Self {
		Self::new(ScriptSource::Path(path.into()))
	}

	/// Creates a host for `script`
	pub fn from_script(script: Script) -> Self {
		Self::new(ScriptSource::Script(script))
	}

	fn new(source: ScriptSource) -> Self {
		Self {
			source:          Some(source),
			target:          None,
			image_load_fns:  vec![],
			instruction_fns: vec![],
			finalize_fns:    vec![],
		}
	}
}

impl std::fmt::Debug for ScriptHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScriptHost")
			.field("source", &self.source)
			.field("target", &self.target)
			.field("image_load_fns", &self.image_load_fns.len())
			.field("instruction_fns", &self.instruction_fns.len())
			.field("finalize_fns", &self.finalize_fns.len())
			.finish()
	}
}

impl InstrumentationHost for ScriptHost {
	fn init(&mut self) -> Result<(), anyhow::Error> {
		let source = self.source.take().context("Host was already initialized")?;
		let script = match source {
			ScriptSource::Path(path) => {
				let contents = fs::read_to_string(&path).with_context(|| format!("Unable to read script {path:?}"))?;
				serde_json::from_str::<Script>(&contents).with_context(|| format!("Unable to parse script {path:?}"))?
			},
			ScriptSource::Script(script) => script,
		};

		let target = Target::new(script).context("Invalid script")?;
		tracing::debug!(
			images = target.images.len(),
			instructions = target.shapes.len(),
			threads = target.threads.len(),
			"Loaded script"
		);
		self.target = Some(target);

		Ok(())
	}

	fn on_image_load(&mut self, callback: ImageLoadFn) {
		self.image_load_fns.push(callback);
	}

	fn on_instruction(&mut self, callback: InstructionFn) {
		self.instruction_fns.push(callback);
	}

	fn on_finalize(&mut self, callback: FinalizeFn) {
		self.finalize_fns.push(callback);
	}

	fn run(&mut self) -> Result<(), anyhow::Error> {
		let target = self.target.as_ref().context("Host wasn't initialized")?;

		// Note: Every image is loaded before any instruction runs
		for image in &target.images {
			for image_load_fn in &self.image_load_fns {
				image_load_fn(image);
			}
		}

		let code_cache = CodeCache {
			target,
			instruction_fns: &self.instruction_fns,
			calls: Mutex::new(HashMap::new()),
			faulted: AtomicBool::new(false),
		};

		// Run all threads, remembering which ones ended abnormally
		let abnormal_ends = thread::scope(|s| {
			let handles = target
				.threads
				.iter()
				.enumerate()
				.map(|(thread_idx, executions)| {
					let tid = ThreadId(u32::try_from(thread_idx).context("Too many threads")?);
					let code_cache = &code_cache;
					thread::Builder::new()
						.name(format!("target-{tid}"))
						.spawn_scoped(s, move || code_cache.run_thread(tid, executions))
						.map(|handle| (tid, handle))
						.context("Unable to spawn target thread")
				})
				.collect::<Vec<_>>();

			handles
				.into_iter()
				.filter_map(|handle| match handle {
					Ok((tid, handle)) => match handle.join() {
						Ok(None) => None,
						Ok(Some(ip)) => {
							tracing::warn!(%tid, ip = format_args!("{ip:#x}"), "Target faulted");
							Some(AbnormalEnd::Fault { tid, ip })
						},
						Err(_) => {
							tracing::error!(%tid, "Target thread panicked");
							Some(AbnormalEnd::Panic { tid })
						},
					},
					Err(err) => Some(AbnormalEnd::Spawn(err)),
				})
				.collect::<Vec<_>>()
		});

		// Then finalize, however the target ended
		let exit_code = abnormal_ends
			.first()
			.map_or(target.exit_code, AbnormalEnd::exit_code);
		for finalize_fn in self.finalize_fns.drain(..) {
			finalize_fn(exit_code);
		}

		anyhow::ensure!(
			abnormal_ends.is_empty(),
			"Target terminated abnormally: {}",
			abnormal_ends.iter().join(", ")
		);

		Ok(())
	}
}

/// How a target thread ended abnormally
#[derive(Debug)]
enum AbnormalEnd {
	/// The target faulted on an instruction
	Fault { tid: ThreadId, ip: u64 },

	/// The thread panicked
	Panic { tid: ThreadId },

	/// The thread couldn't be spawned
	Spawn(anyhow::Error),
}

impl AbnormalEnd {
	/// Returns the exit code the target reports
	fn exit_code(&self) -> i32 {
		match self {
			Self::Fault { .. } => FAULT_EXIT_CODE,
			Self::Panic { .. } | Self::Spawn(_) => PANIC_EXIT_CODE,
		}
	}
}

impl fmt::Display for AbnormalEnd {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Fault { tid, ip } => write!(f, "thread {tid} faulted at {ip:#x}"),
			Self::Panic { tid } => write!(f, "thread {tid} panicked"),
			Self::Spawn(err) => write!(f, "{err:#}"),
		}
	}
}

/// Validated target
#[derive(Debug)]
struct Target {
	/// Images
	images: Vec<Image>,

	/// Instruction shapes by address
	shapes: HashMap<u64, ScriptInstruction>,

	/// Executions of each thread
	threads: Vec<Vec<Execution>>,

	/// Exit code
	exit_code: i32,
}

impl Target {
	/// Validates a script
	fn new(script: Script) -> Result<Self, anyhow::Error> {
		let images = script
			.images
			.into_iter()
			.map(|image| Image::new(image.name, image.base, image.size, image.main))
			.collect::<Vec<_>>();

		if let Some(image) = images.iter().find(|image| image.size() == 0) {
			anyhow::bail!("Image {:?} is empty", image.name());
		}

		let main_images = images.iter().filter(|image| image.is_main()).collect::<Vec<_>>();
		anyhow::ensure!(
			main_images.len() <= 1,
			"Multiple main images: {}",
			main_images.iter().map(|image| image.name()).join(", ")
		);

		for (prev, next) in images.iter().sorted_by_key(|image| image.base()).tuple_windows() {
			anyhow::ensure!(
				prev.end() <= next.base(),
				"Image {:?} overlaps image {:?}",
				prev.name(),
				next.name()
			);
		}

		let mut shapes = HashMap::new();
		for inst in script.instructions {
			anyhow::ensure!(
				!inst.read2 || inst.read,
				"Instruction {:#x} has a second read without a first",
				inst.ip
			);
			match shapes.entry(inst.ip) {
				hash_map::Entry::Occupied(_) => anyhow::bail!("Instruction {:#x} declared twice", inst.ip),
				hash_map::Entry::Vacant(entry) => entry.insert(inst),
			};
		}

		for (thread_idx, executions) in script.threads.iter().enumerate() {
			for (exec_idx, exec) in executions.iter().enumerate() {
				let shape = shapes
					.get(&exec.ip)
					.with_context(|| format!("Thread {thread_idx} executes undeclared instruction {:#x}", exec.ip))?;

				let operands = [
					(MemOperand::Read, shape.read),
					(MemOperand::Read2, shape.read2),
					(MemOperand::Write, shape.write),
				];
				for (operand, has_operand) in operands {
					anyhow::ensure!(
						exec.ea(operand).is_some() == has_operand,
						"Thread {thread_idx} execution {exec_idx} of instruction {:#x}: {operand:?} effective address \
						 doesn't match the instruction",
						exec.ip,
					);
				}
			}
		}

		Ok(Self {
			images,
			shapes,
			threads: script.threads,
			exit_code: script.exit_code,
		})
	}

	/// Returns the image containing `addr`
	fn image_at(&self, addr: u64) -> Option<&Image> {
		self.images.iter().find(|image| image.contains(addr))
	}
}

/// Calls inserted into an instruction
type InsertedCalls = Arc<[InsertedCall]>;

/// A call inserted into an instruction
struct InsertedCall {
	point:    InsertPoint,
	operand:  Option<MemOperand>,
	callback: AnalysisFn,
}

/// Code cache.
///
/// Keeps the calls inserted into each discovered instruction.
struct CodeCache<'a> {
	/// Target
	target: &'a Target,

	/// Instruction callbacks
	instruction_fns: &'a [InstructionFn],

	/// Inserted calls by address
	calls: Mutex<HashMap<u64, InsertedCalls>>,

	/// Whether any thread faulted, which terminates all of them
	faulted: AtomicBool,
}

impl CodeCache<'_> {
	/// Runs all executions of a thread.
	///
	/// Returns the address of the instruction the thread faulted on, if any.
	fn run_thread(&self, tid: ThreadId, executions: &[Execution]) -> Option<u64> {
		// Note: Each thread keeps its own view of the cache so executing an
		//       already discovered instruction doesn't need the lock.
		let mut local_calls = HashMap::<u64, InsertedCalls>::new();

		for exec in executions {
			if self.faulted.load(atomic::Ordering::Acquire) {
				tracing::debug!(%tid, "Stopping thread, target faulted");
				return None;
			}

			let calls = local_calls
				.entry(exec.ip)
				.or_insert_with(|| self.discover(exec.ip));

			let invoke = |call: &InsertedCall| {
				(call.callback)(&CallArgs {
					ip: exec.ip,
					ea: call.operand.and_then(|operand| exec.ea(operand)),
					tid,
				});
			};
			calls.iter().filter(|call| call.point == InsertPoint::Before).for_each(&invoke);
			if exec.fault {
				self.faulted.store(true, atomic::Ordering::Release);
				return Some(exec.ip);
			}
			calls.iter().filter(|call| call.point == InsertPoint::After).for_each(&invoke);
		}

		None
	}

	/// Returns the calls of an instruction, discovering it if it's the first time it's executed
	fn discover(&self, ip: u64) -> InsertedCalls {
		let mut calls = self.calls.lock_unpoisoned();
		if let Some(calls) = calls.get(&ip) {
			return Arc::clone(calls);
		}

		let mut inst = DiscoveredInstruction {
			// Note: Executions are validated to only reference declared instructions
			shape: self.target.shapes[&ip],
			image: self.target.image_at(ip),
			calls: vec![],
		};
		for instruction_fn in self.instruction_fns {
			instruction_fn(&mut inst);
		}

		let inst_calls = InsertedCalls::from(inst.calls);
		calls.insert(ip, Arc::clone(&inst_calls));
		inst_calls
	}
}

/// An instruction being discovered
struct DiscoveredInstruction<'a> {
	/// Shape
	shape: ScriptInstruction,

	/// Image
	image: Option<&'a Image>,

	/// Inserted calls
	calls: Vec<InsertedCall>,
}

impl Instruction for DiscoveredInstruction<'_> {
	fn address(&self) -> u64 {
		self.shape.ip
	}

	fn image(&self) -> Option<&Image> {
		self.image
	}

	fn has_memory_read(&self) -> bool {
		self.shape.read
	}

	fn has_memory_read2(&self) -> bool {
		self.shape.read2
	}

	fn has_memory_write(&self) -> bool {
		self.shape.write
	}

	fn insert_call(&mut self, point: InsertPoint, operand: Option<MemOperand>, callback: AnalysisFn) {
		self.calls.push(InsertedCall {
			point,
			operand,
			callback,
		});
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		std::sync::atomic::{self, AtomicUsize},
	};

	fn main_image(base: u64) -> ScriptImage {
		ScriptImage {
			name: "a.out".to_owned(),
			base,
			size: 0x1000,
			main: true,
		}
	}

	fn inst(ip: u64, read: bool, read2: bool, write: bool) -> ScriptInstruction {
		ScriptInstruction { ip, read, read2, write }
	}

	fn exec(ip: u64) -> Execution {
		Execution {
			ip,
			read_ea: None,
			read2_ea: None,
			write_ea: None,
			fault: false,
		}
	}

	fn init_err(script: Script) -> String {
		let err = ScriptHost::from_script(script).init().unwrap_err();
		format!("{err:#}")
	}

	#[test]
	fn parses_json() {
		let script = serde_json::from_str::<Script>(
			r#"{
				"images": [{ "name": "a.out", "base": 4096, "size": 4096, "main": true }],
				"instructions": [{ "ip": 4096, "read": true }],
				"threads": [[{ "ip": 4096, "read_ea": 16 }]],
				"exit_code": 3
			}"#,
		)
		.unwrap();

		assert_eq!(script, Script {
			images:       vec![self::main_image(0x1000)],
			instructions: vec![self::inst(0x1000, true, false, false)],
			threads:      vec![vec![Execution {
				read_ea: Some(0x10),
				..self::exec(0x1000)
			}]],
			exit_code:    3,
		});
	}

	#[test]
	fn rejects_invalid_scripts() {
		let multiple_main = Script {
			images: vec![self::main_image(0x1000), self::main_image(0x8000)],
			..Script::default()
		};
		assert!(self::init_err(multiple_main).contains("Multiple main images"));

		let overlapping = Script {
			images: vec![self::main_image(0x1000), ScriptImage {
				name: "libc.so.6".to_owned(),
				base: 0x1800,
				size: 0x1000,
				main: false,
			}],
			..Script::default()
		};
		assert!(self::init_err(overlapping).contains("overlaps"));

		let duplicate_inst = Script {
			instructions: vec![self::inst(0x10, false, false, false), self::inst(0x10, true, false, false)],
			..Script::default()
		};
		assert!(self::init_err(duplicate_inst).contains("declared twice"));

		let read2_without_read = Script {
			instructions: vec![self::inst(0x10, false, true, false)],
			..Script::default()
		};
		assert!(self::init_err(read2_without_read).contains("second read without a first"));

		let undeclared = Script {
			threads: vec![vec![self::exec(0x10)]],
			..Script::default()
		};
		assert!(self::init_err(undeclared).contains("undeclared instruction"));

		let missing_ea = Script {
			instructions: vec![self::inst(0x10, false, false, true)],
			threads: vec![vec![self::exec(0x10)]],
			..Script::default()
		};
		assert!(self::init_err(missing_ea).contains("Write effective address"));
	}

	#[test]
	fn missing_script_fails_init() {
		let mut host = ScriptHost::from_path("/nonexistent/target.json");
		assert!(host.init().is_err());
	}

	#[test]
	fn init_twice_fails() {
		let mut host = ScriptHost::from_script(Script::default());
		host.init().unwrap();
		assert!(host.init().is_err());
	}

	#[test]
	fn discovers_each_instruction_once() {
		const THREADS: usize = 4;

		let script = Script {
			images: vec![self::main_image(0x1000)],
			instructions: vec![self::inst(0x1000, false, false, false), self::inst(0x1004, false, false, false)],
			threads: (0..THREADS)
				.map(|_| (0..100).flat_map(|_| [self::exec(0x1000), self::exec(0x1004)]).collect())
				.collect(),
			exit_code: 0,
		};

		let discovered = Arc::new(AtomicUsize::new(0));
		let executed = Arc::new(AtomicUsize::new(0));
		let mut host = ScriptHost::from_script(script);
		host.init().unwrap();

		let (discovered_fn, executed_fn) = (Arc::clone(&discovered), Arc::clone(&executed));
		host.on_instruction(Box::new(move |inst: &mut dyn Instruction| {
			discovered_fn.fetch_add(1, atomic::Ordering::Relaxed);
			let executed_fn = Arc::clone(&executed_fn);
			inst.insert_call(
				InsertPoint::Before,
				None,
				Arc::new(move |_: &CallArgs| {
					executed_fn.fetch_add(1, atomic::Ordering::Relaxed);
				}),
			);
		}));
		host.run().unwrap();

		assert_eq!(discovered.load(atomic::Ordering::Relaxed), 2);
		assert_eq!(executed.load(atomic::Ordering::Relaxed), THREADS * 200);
	}

	#[test]
	fn reports_images_and_passes_call_args() {
		let script = Script {
			images: vec![
				ScriptImage {
					name: "libc.so.6".to_owned(),
					base: 0x8000,
					size: 0x1000,
					main: false,
				},
				self::main_image(0x1000),
			],
			instructions: vec![self::inst(0x1000, true, true, true), self::inst(0x8000, false, false, false)],
			threads: vec![vec![self::exec(0x8000), Execution {
				read_ea: Some(0xa),
				read2_ea: Some(0xb),
				write_ea: Some(0xc),
				..self::exec(0x1000)
			}]],
			exit_code: 0,
		};

		let log = Arc::new(Mutex::new(vec![]));
		let mut host = ScriptHost::from_script(script);
		host.init().unwrap();

		let image_log = Arc::clone(&log);
		host.on_image_load(Box::new(move |image: &Image| {
			image_log.lock_unpoisoned().push(format!("load {} {}", image.name(), image.is_main()));
		}));

		let inst_log = Arc::clone(&log);
		host.on_instruction(Box::new(move |inst: &mut dyn Instruction| {
			let image = inst.image().map(|image| image.name().to_owned());
			inst_log.lock_unpoisoned().push(format!("discover {:#x} {image:?}", inst.address()));
			for (point, operand) in [
				(InsertPoint::After, None),
				(InsertPoint::Before, Some(MemOperand::Read)),
				(InsertPoint::Before, Some(MemOperand::Read2)),
				(InsertPoint::Before, Some(MemOperand::Write)),
			] {
				let call_log = Arc::clone(&inst_log);
				inst.insert_call(
					point,
					operand,
					Arc::new(move |args: &CallArgs| {
						call_log
							.lock_unpoisoned()
							.push(format!("{point:?} {:#x} {:?} {}", args.ip, args.ea, args.tid));
					}),
				);
			}
		}));

		let finalize_log = Arc::clone(&log);
		host.on_finalize(Box::new(move |exit_code: i32| {
			finalize_log.lock_unpoisoned().push(format!("finalize {exit_code}"));
		}));
		host.run().unwrap();

		let log = log.lock_unpoisoned().clone();
		assert_eq!(log, [
			"load libc.so.6 false",
			"load a.out true",
			"discover 0x8000 Some(\"libc.so.6\")",
			"Before 0x8000 None 0",
			"Before 0x8000 None 0",
			"Before 0x8000 None 0",
			"After 0x8000 None 0",
			"discover 0x1000 Some(\"a.out\")",
			"Before 0x1000 Some(10) 0",
			"Before 0x1000 Some(11) 0",
			"Before 0x1000 Some(12) 0",
			"After 0x1000 None 0",
			"finalize 0",
		]);
	}

	#[test]
	fn finalizes_once_when_a_thread_panics() {
		let script = Script {
			images: vec![self::main_image(0x1000)],
			instructions: vec![self::inst(0x1000, false, false, false), self::inst(0x1004, false, false, false)],
			threads: vec![vec![self::exec(0x1000)], vec![self::exec(0x1004)]],
			exit_code: 0,
		};

		let finalized = Arc::new(Mutex::new(vec![]));
		let mut host = ScriptHost::from_script(script);
		host.init().unwrap();

		host.on_instruction(Box::new(|inst: &mut dyn Instruction| {
			if inst.address() == 0x1004 {
				inst.insert_call(InsertPoint::Before, None, Arc::new(|_: &CallArgs| panic!("Target crashed")));
			}
		}));
		let finalized_fn = Arc::clone(&finalized);
		host.on_finalize(Box::new(move |exit_code: i32| finalized_fn.lock_unpoisoned().push(exit_code)));

		let err = host.run().unwrap_err();
		assert!(format!("{err:#}").contains("thread 1 panicked"), "Unexpected error: {err:#}");
		assert_eq!(*finalized.lock_unpoisoned(), [PANIC_EXIT_CODE]);
	}

	#[test]
	fn fault_skips_later_calls_and_finalizes() {
		let script = serde_json::from_str::<Script>(
			r#"{
				"images": [{ "name": "a.out", "base": 4096, "size": 4096, "main": true }],
				"instructions": [{ "ip": 4096 }, { "ip": 4100 }],
				"threads": [[{ "ip": 4096 }, { "ip": 4100, "fault": true }, { "ip": 4096 }]]
			}"#,
		)
		.unwrap();

		let log = Arc::new(Mutex::new(vec![]));
		let mut host = ScriptHost::from_script(script);
		host.init().unwrap();

		let inst_log = Arc::clone(&log);
		host.on_instruction(Box::new(move |inst: &mut dyn Instruction| {
			for point in [InsertPoint::Before, InsertPoint::After] {
				let call_log = Arc::clone(&inst_log);
				inst.insert_call(
					point,
					None,
					Arc::new(move |args: &CallArgs| call_log.lock_unpoisoned().push(format!("{point:?} {:#x}", args.ip))),
				);
			}
		}));
		let finalize_log = Arc::clone(&log);
		host.on_finalize(Box::new(move |exit_code: i32| {
			finalize_log.lock_unpoisoned().push(format!("finalize {exit_code}"));
		}));

		let err = host.run().unwrap_err();
		assert!(format!("{err:#}").contains("thread 0 faulted at 0x1004"), "Unexpected error: {err:#}");
		assert_eq!(*log.lock_unpoisoned(), [
			"Before 0x1000",
			"After 0x1000",
			"Before 0x1004",
			format!("finalize {FAULT_EXIT_CODE}").as_str(),
		]);
	}
}
