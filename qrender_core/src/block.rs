use serde::Deserialize;
use serde::Serialize;

use crate::Span;

/// Text placed between the start delimiter, the output and the end delimiter
/// when a block is composed.
pub const SEPARATOR: &str = "\n\n";

/// The marker phrases that identify block delimiters.
///
/// ````text
/// %% render block: start
/// ```sh
/// date +%Y
/// ```
/// %%
///
/// 2024
///
/// %% render block: end %%
/// ````
///
/// Whitespace between and around the words of a marker is not significant,
/// so `%%render   block:start%%` matches the default start marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
	/// Phrase following the opening `%%` of a start delimiter.
	#[serde(default = "default_start_marker")]
	pub start: String,
	/// Phrase between the `%%` pair of an end delimiter.
	#[serde(default = "default_end_marker")]
	pub end: String,
}

impl Markers {
	pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
		Self {
			start: start.into(),
			end: end.into(),
		}
	}
}

impl Default for Markers {
	fn default() -> Self {
		Self {
			start: default_start_marker(),
			end: default_end_marker(),
		}
	}
}

fn default_start_marker() -> String {
	"render block: start".to_string()
}

fn default_end_marker() -> String {
	"render block: end".to_string()
}

/// A rendered region of a document: the start delimiter with its embedded
/// expression, the output last rendered for it, and the end delimiter.
///
/// `content` is the exact text of the region in the document it was parsed
/// from and is used as the search key when the region is replaced. Only
/// `output` (and therefore `content`) changes when a block is re-rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
	/// The literal text of the whole region, delimiters included.
	pub content: String,
	/// The start delimiter including the fenced expression.
	pub start_marker: String,
	/// Language tag of the fence. Empty when the fence has no tag.
	pub language: String,
	/// The trimmed expression source inside the fence.
	pub expression: String,
	/// The trimmed output between the fence and the end delimiter.
	pub output: String,
	/// The end delimiter.
	pub end_marker: String,
	/// Where `content` was found in the source document.
	pub span: Span,
}

impl Block {
	/// Return a copy of this block holding `output`, with `content` recomposed
	/// to match.
	#[must_use]
	pub fn with_output(&self, output: impl Into<String>) -> Self {
		let mut block = Self {
			output: output.into(),
			..self.clone()
		};
		block.content = compose(&block);
		block
	}
}

/// Serialize a block back into literal text.
///
/// The result always parses back into a block with the same expression and
/// output, including when the output is empty.
pub fn compose(block: &Block) -> String {
	let mut text = String::with_capacity(
		block.start_marker.len() + block.output.len() + block.end_marker.len() + 4,
	);
	text.push_str(&block.start_marker);
	text.push_str(SEPARATOR);
	text.push_str(&block.output);
	text.push_str(SEPARATOR);
	text.push_str(&block.end_marker);
	text
}
