//! Linked list traversal

// Imports
use std::hint;

const NODES: i32 = 100;

/// List node
struct Node {
	value: i32,
	next:  Option<Box<Node>>,
}

fn main() {
	// Note: We build the list back to front so the head ends up with value `0`
	let mut head = None;
	for value in (0..NODES).rev() {
		head = Some(Box::new(Node {
			value: hint::black_box(value),
			next:  head,
		}));
	}

	// Then chase the pointers
	let mut sum = 0;
	let mut cur = head.as_deref();
	while let Some(node) = cur {
		sum += hint::black_box(node.value);
		cur = node.next.as_deref();
	}

	println!("Sum={sum}");
}
