/// A position in an editor buffer. Both fields are 0-indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cursor {
	pub line: usize,
	pub ch: usize,
}

impl Cursor {
	pub const fn new(line: usize, ch: usize) -> Self {
		Self { line, ch }
	}
}

/// The host document-editing environment.
///
/// Replacing the whole text of an editor usually moves its cursor, so the
/// updater reads the cursor first and restores it after writing.
pub trait Editor {
	fn text(&self) -> String;
	fn set_text(&mut self, text: String);
	fn cursor(&self) -> Cursor;
	fn set_cursor(&mut self, cursor: Cursor);
}

/// An in-memory editor buffer.
///
/// `set_text` resets the cursor to the start of the buffer the way most
/// editors do when their whole content is replaced.
#[derive(Debug, Clone, Default)]
pub struct BufferEditor {
	text: String,
	cursor: Cursor,
	revision: usize,
}

impl BufferEditor {
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			cursor: Cursor::default(),
			revision: 0,
		}
	}

	#[must_use]
	pub fn with_cursor(mut self, cursor: Cursor) -> Self {
		self.cursor = cursor;
		self
	}

	/// Number of times `set_text` was called.
	pub fn revision(&self) -> usize {
		self.revision
	}

	pub fn is_modified(&self) -> bool {
		self.revision > 0
	}

	pub fn into_text(self) -> String {
		self.text
	}
}

impl Editor for BufferEditor {
	fn text(&self) -> String {
		self.text.clone()
	}

	fn set_text(&mut self, text: String) {
		self.text = text;
		self.cursor = Cursor::default();
		self.revision += 1;
	}

	fn cursor(&self) -> Cursor {
		self.cursor
	}

	fn set_cursor(&mut self, cursor: Cursor) {
		self.cursor = cursor;
	}
}
