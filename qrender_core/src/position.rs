use std::ops::Range;

use serde::Deserialize;
use serde::Serialize;

/// A location in a document. `line` and `column` are 1-indexed, `offset` is
/// a 0-indexed byte offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
	pub line: usize,
	pub column: usize,
	pub offset: usize,
}

impl Point {
	pub const fn new(line: usize, column: usize, offset: usize) -> Self {
		Self {
			line,
			column,
			offset,
		}
	}
}

/// The byte range of a block in its document together with the point where
/// it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
	pub start: Point,
	pub range: Range<usize>,
}

/// Pre-computed line starts so that byte offsets can be turned into points
/// with a binary search.
pub(crate) struct LineTable {
	/// `line_starts[0]` is always 0.
	line_starts: Vec<usize>,
}

impl LineTable {
	pub(crate) fn new(content: &str) -> Self {
		let mut line_starts = vec![0];
		line_starts.extend(
			content
				.bytes()
				.enumerate()
				.filter(|(_, byte)| *byte == b'\n')
				.map(|(index, _)| index + 1),
		);

		Self { line_starts }
	}

	pub(crate) fn point(&self, offset: usize) -> Point {
		let line_index = match self.line_starts.binary_search(&offset) {
			Ok(exact) => exact,
			Err(insert) => insert.saturating_sub(1),
		};

		Point {
			line: line_index + 1,
			column: offset - self.line_starts[line_index] + 1,
			offset,
		}
	}
}
