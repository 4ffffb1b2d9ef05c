use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum RenderError {
	#[error(transparent)]
	#[diagnostic(code(qrender::io_error))]
	Io(#[from] std::io::Error),

	#[error("start block is not found at {line}:{column}: {reason}")]
	#[diagnostic(
		code(qrender::start_block_not_found),
		help("every end delimiter needs a preceding `%% <start marker>` delimiter")
	)]
	StartBlockNotFound {
		reason: String,
		line: usize,
		column: usize,
	},

	#[error("end block is not found for the block starting at {line}:{column}")]
	#[diagnostic(
		code(qrender::end_block_not_found),
		help("close the block with `%% <end marker> %%` before the next block starts")
	)]
	EndBlockNotFound { line: usize, column: usize },

	#[error("query code block is not found in the block starting at {line}:{column}")]
	#[diagnostic(
		code(qrender::code_block_not_found),
		help("add a fenced code block (```lang ... ```) right after the start delimiter")
	)]
	CodeBlockNotFound { line: usize, column: usize },

	#[error("Error executing query: {0}")]
	#[diagnostic(code(qrender::evaluation))]
	Evaluation(String),

	#[error("evaluation backend `{0}` is not available")]
	#[diagnostic(
		code(qrender::backend_unavailable),
		help("make sure the evaluation backend is installed and enabled")
	)]
	BackendUnavailable(String),

	#[error("query `{selector}` failed: {reason}")]
	#[diagnostic(code(qrender::query))]
	Query { selector: String, reason: String },

	#[error("file not found: `{0}`")]
	#[diagnostic(code(qrender::file_not_found))]
	FileNotFound(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(qrender::config_parse),
		help("check that qrender.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("failed to load data file `{path}`: {reason}")]
	#[diagnostic(code(qrender::data_file))]
	DataFile { path: String, reason: String },

	#[error("unsupported data file format: `{0}`")]
	#[diagnostic(
		code(qrender::unsupported_format),
		help("supported formats: text, json, toml, yaml, yml")
	)]
	UnsupportedDataFormat(String),

	#[error("unconvertible float value in data file `{path}`: {value}")]
	#[diagnostic(
		code(qrender::unconvertible_float),
		help("NaN and Infinity are not valid JSON numbers")
	)]
	UnconvertibleFloat { path: String, value: String },

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(qrender::file_too_large),
		help("increase `max_file_size` in qrender.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },
}

impl RenderError {
	/// Whether this error describes malformed block markup.
	pub fn is_structural(&self) -> bool {
		matches!(
			self,
			Self::StartBlockNotFound { .. }
				| Self::EndBlockNotFound { .. }
				| Self::CodeBlockNotFound { .. }
		)
	}
}

pub type RenderResult<T> = Result<T, RenderError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
