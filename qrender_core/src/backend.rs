use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::RenderResult;

/// A file matched by [`EvaluationBackend::query`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryRow {
	/// Path of the matched document, relative to the store root.
	pub path: PathBuf,
}

impl QueryRow {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
	/// Literal text used as the block output.
	Text(String),
	/// A structured value that is turned into text by
	/// [`EvaluationBackend::format_value`].
	Value(serde_json::Value),
}

/// Information about the document that is being rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationContext {
	/// The document path relative to the store root, when known.
	pub file: Option<PathBuf>,
}

impl EvaluationContext {
	pub fn for_file(path: impl Into<PathBuf>) -> Self {
		Self {
			file: Some(path.into()),
		}
	}

	pub fn file(&self) -> Option<&Path> {
		self.file.as_deref()
	}
}

/// How structured values are rendered into text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSettings {
	/// Text emitted for `null`.
	#[serde(default)]
	pub null: String,
	/// Prefix of every line produced for an array item.
	#[serde(default = "default_list_marker")]
	pub list_marker: String,
}

impl Default for FormatSettings {
	fn default() -> Self {
		Self {
			null: String::new(),
			list_marker: default_list_marker(),
		}
	}
}

fn default_list_marker() -> String {
	"- ".to_string()
}

/// The query engine that blocks are evaluated against.
///
/// The pipeline never interprets expressions itself. It only hands the fence
/// language and the expression source to [`evaluate`](Self::evaluate) and
/// turns the result into text.
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
	/// Human readable name used in diagnostics.
	fn name(&self) -> &str;

	/// Whether the backend can serve requests. A renderer refuses to start
	/// with an unavailable backend.
	fn is_available(&self) -> bool {
		true
	}

	/// Resolve a selector into the documents it matches.
	async fn query(&self, selector: &str) -> RenderResult<Vec<QueryRow>>;

	/// Evaluate `expression` written in `language`.
	async fn evaluate(
		&self,
		language: &str,
		expression: &str,
		context: &EvaluationContext,
	) -> RenderResult<Evaluated>;

	/// Render a structured value as block output.
	fn format_value(&self, value: &serde_json::Value, settings: &FormatSettings) -> String {
		format_value(value, settings)
	}
}

/// Default text rendering for structured values.
///
/// - `null` becomes `settings.null`
/// - strings are emitted verbatim
/// - numbers and booleans use their display form
/// - arrays become one line per item, each prefixed with
///   `settings.list_marker`
/// - objects become pretty printed JSON
pub fn format_value(value: &serde_json::Value, settings: &FormatSettings) -> String {
	match value {
		serde_json::Value::Null => settings.null.clone(),
		serde_json::Value::String(text) => text.clone(),
		serde_json::Value::Bool(flag) => flag.to_string(),
		serde_json::Value::Number(number) => number.to_string(),
		serde_json::Value::Array(items) => {
			items
				.iter()
				.map(|item| format!("{}{}", settings.list_marker, format_item(item, settings)))
				.collect::<Vec<_>>()
				.join("\n")
		}
		serde_json::Value::Object(_) => {
			serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
		}
	}
}

/// List items are kept on a single line.
fn format_item(value: &serde_json::Value, settings: &FormatSettings) -> String {
	match value {
		serde_json::Value::Array(_) | serde_json::Value::Object(_) => value.to_string(),
		other => format_value(other, settings),
	}
}
