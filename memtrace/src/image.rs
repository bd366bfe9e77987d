//! Image tracker

// Imports
use {
	crate::{
		host::Image,
		trace::{TraceEvent, TraceSink},
	},
	std::{io, sync::OnceLock},
};

/// Image tracker.
///
/// Remembers the main executable and announces it in the trace.
#[derive(Debug, Default)]
pub struct ImageTracker {
	/// Main executable
	main: OnceLock<MainImage>,
}

/// The main executable
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MainImage {
	/// Name
	pub name: String,

	/// Base address
	pub base: u64,

	/// Size
	pub size: u64,
}

impl MainImage {
	/// Returns whether `addr` lies within this image
	pub fn contains(&self, addr: u64) -> bool {
		(self.base..self.base.saturating_add(self.size)).contains(&addr)
	}
}

impl ImageTracker {
	/// Creates a new tracker
	pub fn new() -> Self {
		Self::default()
	}

	/// Handles an image load.
	///
	/// Returns whether `image` was recorded as the main executable.
	pub fn image_loaded<W: io::Write>(&self, image: &Image, sink: &TraceSink<W>) -> bool {
		if !image.is_main() {
			tracing::debug!(name = image.name(), base = format_args!("{:#x}", image.base()), "Ignoring image");
			return false;
		}

		let main = MainImage {
			name: image.name().to_owned(),
			base: image.base(),
			size: image.size(),
		};
		if let Err(main) = self.main.set(main) {
			tracing::warn!(?main, existing = ?self.main.get(), "Main executable loaded twice, ignoring");
			return false;
		}

		tracing::info!(name = image.name(), base = format_args!("{:#x}", image.base()), "Main executable loaded");
		sink.append(&TraceEvent::ImageLoad { base: image.base() });

		true
	}

	/// Returns the main executable, if loaded
	pub fn main(&self) -> Option<&MainImage> {
		self.main.get()
	}

	/// Returns whether `addr` lies within the main executable
	pub fn in_main(&self, addr: u64) -> bool {
		self.main().is_some_and(|main| main.contains(addr))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn records_only_main_image() {
		let tracker = ImageTracker::new();
		let sink = TraceSink::new(vec![]);

		assert!(!tracker.image_loaded(&Image::new("libc.so.6", 0x7f00_0000, 0x1000, false), &sink));
		assert_eq!(tracker.main(), None);
		assert!(!tracker.in_main(0x7f00_0010));

		assert!(tracker.image_loaded(&Image::new("a.out", 0x40_0000, 0x1000, true), &sink));
		assert_eq!(tracker.main(), Some(&MainImage {
			name: "a.out".to_owned(),
			base: 0x40_0000,
			size: 0x1000,
		}));
		assert!(tracker.in_main(0x40_0000));
		assert!(tracker.in_main(0x40_0fff));
		assert!(!tracker.in_main(0x40_1000));
		assert!(!tracker.in_main(0x7f00_0010));

		let bytes = sink.close().unwrap();
		assert_eq!(bytes, b"Main executable loaded at address:400000\n");
	}

	#[test]
	fn main_image_is_set_once() {
		let tracker = ImageTracker::new();
		let sink = TraceSink::new(vec![]);

		assert!(tracker.image_loaded(&Image::new("a.out", 0x1000, 0x1000, true), &sink));
		assert!(!tracker.image_loaded(&Image::new("b.out", 0x8000, 0x1000, true), &sink));

		assert_eq!(tracker.main().map(|main| main.base), Some(0x1000));
		assert!(!tracker.in_main(0x8010));
		assert_eq!(sink.events_appended(), 1);
	}
}
