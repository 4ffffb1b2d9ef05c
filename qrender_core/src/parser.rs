use std::iter::FusedIterator;

use crate::Block;
use crate::Markers;
use crate::RenderError;
use crate::RenderResult;
use crate::Span;
use crate::lexer::Lexeme;
use crate::lexer::Token;
use crate::lexer::tokenize;
use crate::position::LineTable;

/// Scan `content` for blocks delimited by `markers`.
///
/// The returned iterator is lazy and yields blocks in document order. It
/// stops after the first malformed block, which is yielded as an error.
/// Scanning resumes strictly after the end delimiter of the previous block,
/// so blocks never overlap.
pub fn parse<'a>(content: &'a str, markers: &Markers) -> BlockIter<'a> {
	BlockIter::new(content, markers)
}

/// Collect every block in `content`, failing on the first malformed one.
pub fn parse_blocks(content: &str, markers: &Markers) -> RenderResult<Vec<Block>> {
	parse(content, markers).collect()
}

/// Whether `text` contains a start or end delimiter for `markers`. Output
/// containing one would not parse back into the same block.
pub fn contains_delimiter(text: &str, markers: &Markers) -> bool {
	let scanner = BlockIter::new(text, markers);

	(0..scanner.lexemes.len())
		.any(|index| scanner.start_at(index).is_some() || scanner.end_at(index).is_some())
}

/// Iterator over the blocks of a document. Created by [`parse`].
pub struct BlockIter<'a> {
	source: &'a str,
	lexemes: Vec<Lexeme>,
	/// Index of the next lexeme to examine.
	cursor: usize,
	/// Start marker with all whitespace removed.
	start_phrase: String,
	/// End marker with all whitespace removed.
	end_phrase: String,
	lines: LineTable,
	finished: bool,
}

/// Where the expression fence of a start delimiter was found.
enum FenceSection {
	/// `%% start %%` followed by the fence.
	AfterDelimiter(usize),
	/// `%% start` with the fence inside the comment, closed by a later `%%`.
	InsideDelimiter(usize),
}

impl<'a> BlockIter<'a> {
	fn new(source: &'a str, markers: &Markers) -> Self {
		Self {
			source,
			lexemes: tokenize(source),
			cursor: 0,
			start_phrase: compact(&markers.start),
			end_phrase: compact(&markers.end),
			lines: LineTable::new(source),
			finished: false,
		}
	}

	fn token(&self, index: usize) -> Option<Token> {
		self.lexemes.get(index).map(|lexeme| lexeme.token)
	}

	fn slice(&self, index: usize) -> &'a str {
		&self.source[self.lexemes[index].span.clone()]
	}

	fn skip_blank(&self, mut index: usize) -> usize {
		while self.token(index).is_some_and(Token::is_blank) {
			index += 1;
		}
		index
	}

	fn skip_whitespace(&self, mut index: usize) -> usize {
		while self.token(index) == Some(Token::Whitespace) {
			index += 1;
		}
		index
	}

	/// Match a whitespace-insensitive phrase starting at `index`. Returns the
	/// index after the last lexeme of the phrase. Delimiters never span lines.
	fn match_phrase(&self, index: usize, phrase: &str) -> Option<usize> {
		if phrase.is_empty() {
			return None;
		}

		let mut index = self.skip_whitespace(index);
		let mut matched = 0;

		while matched < phrase.len() {
			match self.token(index)? {
				Token::Whitespace => {}
				Token::Newline | Token::Delimiter | Token::Fence => return None,
				Token::Text => {
					let text = self.slice(index);
					if !phrase[matched..].starts_with(text) {
						return None;
					}
					matched += text.len();
				}
			}
			index += 1;
		}

		Some(index)
	}

	/// If a start delimiter opens at `index`, return the index after its
	/// marker phrase.
	fn start_at(&self, index: usize) -> Option<usize> {
		if self.token(index)? != Token::Delimiter {
			return None;
		}

		self.match_phrase(index + 1, &self.start_phrase)
	}

	/// If an end delimiter opens at `index`, return the index after its
	/// closing `%%`.
	fn end_at(&self, index: usize) -> Option<usize> {
		if self.token(index)? != Token::Delimiter {
			return None;
		}

		let after_phrase = self.match_phrase(index + 1, &self.end_phrase)?;
		let closing = self.skip_whitespace(after_phrase);

		(self.token(closing)? == Token::Delimiter).then_some(closing + 1)
	}

	fn offset(&self, index: usize) -> usize {
		self.lexemes
			.get(index)
			.map_or(self.source.len(), |lexeme| lexeme.span.start)
	}

	fn end_offset(&self, index: usize) -> usize {
		self.lexemes[index].span.end
	}

	fn start_block_not_found(&self, index: usize, reason: &str) -> RenderError {
		let point = self.lines.point(self.offset(index));
		RenderError::StartBlockNotFound {
			reason: reason.to_string(),
			line: point.line,
			column: point.column,
		}
	}

	fn code_block_not_found(&self, block_start: usize) -> RenderError {
		let point = self.lines.point(block_start);
		RenderError::CodeBlockNotFound {
			line: point.line,
			column: point.column,
		}
	}

	fn end_block_not_found(&self, block_start: usize) -> RenderError {
		let point = self.lines.point(block_start);
		RenderError::EndBlockNotFound {
			line: point.line,
			column: point.column,
		}
	}

	/// Find the next block opening after the cursor.
	fn next_block(&mut self) -> RenderResult<Option<Block>> {
		while self.cursor < self.lexemes.len() {
			if let Some(after_marker) = self.start_at(self.cursor) {
				return self.read_block(self.cursor, after_marker).map(Some);
			}

			if self.end_at(self.cursor).is_some() {
				return Err(self.start_block_not_found(
					self.cursor,
					"end delimiter has no matching start delimiter",
				));
			}

			self.cursor += 1;
		}

		Ok(None)
	}

	fn find_fence_section(&self, after_marker: usize, block_start: usize) -> RenderResult<FenceSection> {
		let mut index = after_marker;

		while let Some(token) = self.token(index) {
			match token {
				Token::Fence => return Ok(FenceSection::InsideDelimiter(index)),
				Token::Delimiter => {
					let fence = self.skip_blank(index + 1);
					return match self.token(fence) {
						Some(Token::Fence) => Ok(FenceSection::AfterDelimiter(fence)),
						_ => Err(self.code_block_not_found(block_start)),
					};
				}
				_ => index += 1,
			}
		}

		Err(self.code_block_not_found(block_start))
	}

	/// Read `language`, `expression` and the index of the closing fence for
	/// the fence opening at `fence`.
	///
	/// The closing fence must come before the next start or end delimiter. A
	/// fence inside the start delimiter must also close before its `%%`.
	fn read_fence(
		&self,
		fence: usize,
		inside: bool,
		block_start: usize,
	) -> RenderResult<(String, String, usize)> {
		let mut index = fence + 1;
		let newline = loop {
			match self.token(index) {
				Some(Token::Newline) => break index,
				Some(Token::Fence) | None => return Err(self.code_block_not_found(block_start)),
				Some(_) => index += 1,
			}
		};

		let mut closing = newline + 1;
		loop {
			match self.token(closing) {
				Some(Token::Fence) => break,
				Some(Token::Delimiter)
					if inside || self.start_at(closing).is_some() || self.end_at(closing).is_some() =>
				{
					return Err(self.code_block_not_found(block_start));
				}
				Some(_) => closing += 1,
				None => return Err(self.code_block_not_found(block_start)),
			}
		}

		let language = self.source[self.end_offset(fence)..self.offset(newline)].trim();
		let expression = self.source[self.end_offset(newline)..self.offset(closing)].trim();

		Ok((language.to_string(), expression.to_string(), closing))
	}

	fn read_block(&mut self, start: usize, after_marker: usize) -> RenderResult<Block> {
		let block_start = self.offset(start);
		let section = self.find_fence_section(after_marker, block_start)?;
		let (fence, inside) = match section {
			FenceSection::AfterDelimiter(fence) => (fence, false),
			FenceSection::InsideDelimiter(fence) => (fence, true),
		};
		let (language, expression, closing_fence) = self.read_fence(fence, inside, block_start)?;

		// Index of the first lexeme after the start delimiter.
		let body_start = match section {
			FenceSection::AfterDelimiter(_) => closing_fence + 1,
			FenceSection::InsideDelimiter(_) => {
				let mut index = closing_fence + 1;
				loop {
					match self.token(index) {
						Some(Token::Delimiter) => {
							if self.end_at(index).is_some() || self.start_at(index).is_some() {
								return Err(self.start_block_not_found(
									start,
									"start delimiter is not closed with `%%`",
								));
							}
							break index + 1;
						}
						Some(_) => index += 1,
						None => {
							return Err(self.start_block_not_found(
								start,
								"start delimiter is not closed with `%%`",
							));
						}
					}
				}
			}
		};
		let start_marker_end = self.end_offset(body_start - 1);

		let mut index = body_start;
		while index < self.lexemes.len() {
			if let Some(after_end) = self.end_at(index) {
				let end_start = self.offset(index);
				let end_end = self.end_offset(after_end - 1);
				self.cursor = after_end;

				return Ok(Block {
					content: self.source[block_start..end_end].to_string(),
					start_marker: self.source[block_start..start_marker_end].to_string(),
					language,
					expression,
					output: self.source[start_marker_end..end_start].trim().to_string(),
					end_marker: self.source[end_start..end_end].to_string(),
					span: Span {
						start: self.lines.point(block_start),
						range: block_start..end_end,
					},
				});
			}

			if self.start_at(index).is_some() {
				return Err(self.end_block_not_found(block_start));
			}

			index += 1;
		}

		Err(self.end_block_not_found(block_start))
	}
}

impl Iterator for BlockIter<'_> {
	type Item = RenderResult<Block>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}

		match self.next_block() {
			Ok(Some(block)) => Some(Ok(block)),
			Ok(None) => {
				self.finished = true;
				None
			}
			Err(error) => {
				self.finished = true;
				Some(Err(error))
			}
		}
	}
}

impl FusedIterator for BlockIter<'_> {}

fn compact(phrase: &str) -> String {
	phrase.split_whitespace().collect()
}
