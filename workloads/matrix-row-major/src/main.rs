//! Row-major matrix scan

// Imports
use std::hint;

const ROWS: usize = 30;
const COLS: usize = 30;

fn main() {
	let mut matrix = [[0i32; COLS]; ROWS];
	for (row, values) in matrix.iter_mut().enumerate() {
		for (col, value) in values.iter_mut().enumerate() {
			*value = hint::black_box((row + col) as i32);
		}
	}

	// Note: Rows are contiguous, so this walks memory in order
	let mut sum = 0;
	for row in 0..ROWS {
		for col in 0..COLS {
			sum += hint::black_box(matrix[row][col]);
		}
	}

	println!("Sum={sum}");
}
