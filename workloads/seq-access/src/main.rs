//! Sequential array access

// Imports
use std::hint;

const LEN: usize = 100;

fn main() {
	let mut values = [0i32; LEN];
	for (idx, value) in values.iter_mut().enumerate() {
		*value = hint::black_box(idx as i32);
	}

	let mut sum = 0;
	for value in &values {
		sum += hint::black_box(*value);
	}

	println!("Sum={sum}");
}
