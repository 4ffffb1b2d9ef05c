use std::ops::Range;

use logos::Logos;

/// Flat tokens for block scanning. Only the characters that take part in the
/// delimiter grammar get their own token; everything else is `Text`.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
	/// `%%`
	#[token("%%")]
	Delimiter,
	/// ```` ``` ````
	#[token("```")]
	Fence,
	/// `\n`
	#[token("\n")]
	Newline,
	/// Any run of whitespace other than `\n`.
	#[regex(r"[^\S\n]+")]
	Whitespace,
	/// A run of non-whitespace text, or a lone `%` or backtick.
	#[regex(r"[^%`\s]+")]
	#[token("%")]
	#[token("`")]
	Text,
}

impl Token {
	pub(crate) fn is_blank(self) -> bool {
		matches!(self, Self::Whitespace | Self::Newline)
	}
}

/// A token together with the byte range it covers in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lexeme {
	pub token: Token,
	pub span: Range<usize>,
}

/// Split the source into lexemes. Bytes logos cannot classify are kept as
/// `Text` so that every byte of the source is covered by exactly one lexeme.
pub(crate) fn tokenize(source: &str) -> Vec<Lexeme> {
	Token::lexer(source)
		.spanned()
		.map(|(result, span)| {
			Lexeme {
				token: result.unwrap_or(Token::Text),
				span,
			}
		})
		.collect()
}
