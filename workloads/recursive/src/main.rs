//! Recursion, growing and shrinking the stack

// Imports
use std::hint;

const DEPTH: i32 = 100;

fn recurse(n: i32) -> i32 {
	match n <= 0 {
		true => 0,
		false => n + recurse(hint::black_box(n - 1)),
	}
}

fn main() {
	let result = recurse(hint::black_box(DEPTH));
	println!("Result={result}");
}
