//! Utilities

// Modules
pub mod logger;

// Imports
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Extension trait for `Mutex<T>` to lock it regardless of poisoning
#[extend::ext(name = LockUnpoisoned)]
pub impl<T> Mutex<T> {
	/// Locks this mutex.
	///
	/// If a previous holder panicked, the poisoning is ignored and
	/// the guard is returned anyway.
	fn lock_unpoisoned(&self) -> MutexGuard<'_, T> {
		self.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
mod tests {
	use {super::*, std::thread};

	#[test]
	fn lock_after_panic() {
		let mutex = Mutex::new(5);
		let _ = thread::scope(|s| {
			s.spawn(|| {
				let _guard = mutex.lock_unpoisoned();
				panic!("Poisoning the mutex");
			})
			.join()
		});

		assert!(mutex.is_poisoned());
		assert_eq!(*mutex.lock_unpoisoned(), 5);
	}
}
