//! Random array access

// Imports
use {rand::Rng, std::hint};

const LEN: usize = 100;

fn main() {
	let mut values = [0i32; LEN];
	for (idx, value) in values.iter_mut().enumerate() {
		*value = hint::black_box(idx as i32);
	}

	let mut rng = rand::thread_rng();
	let mut sum = 0;
	for _ in 0..LEN {
		let idx = rng.gen_range(0..LEN);
		sum += hint::black_box(values[idx]);
	}

	println!("Sum={sum}");
}
