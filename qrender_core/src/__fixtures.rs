use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;

use crate::EvaluationBackend;
use crate::EvaluationContext;
use crate::Evaluated;
use crate::FileHandle;
use crate::FileStore;
use crate::Markers;
use crate::QueryRow;
use crate::RenderError;
use crate::RenderResult;
use crate::Renderer;

/// How the mock backend answers one expression.
#[derive(Debug, Clone)]
pub enum Answer {
	Text(&'static str),
	Value(serde_json::Value),
	Fail(&'static str),
	Panic(&'static str),
}

/// A backend answering from a fixed table of expressions.
#[derive(Debug, Default)]
pub struct MockBackend {
	answers: HashMap<String, Answer>,
	delays: HashMap<String, u64>,
	rows: Vec<QueryRow>,
	unavailable: bool,
	calls: AtomicUsize,
	completed: Mutex<Vec<String>>,
}

impl MockBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn answer(mut self, expression: &str, answer: Answer) -> Self {
		self.answers.insert(expression.to_string(), answer);
		self
	}

	pub fn text(self, expression: &str, text: &'static str) -> Self {
		self.answer(expression, Answer::Text(text))
	}

	pub fn delay(mut self, expression: &str, millis: u64) -> Self {
		self.delays.insert(expression.to_string(), millis);
		self
	}

	pub fn rows(mut self, paths: &[&str]) -> Self {
		self.rows = paths.iter().map(|path| QueryRow::new(*path)).collect();
		self
	}

	pub fn unavailable(mut self) -> Self {
		self.unavailable = true;
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Expressions in the order their evaluations finished.
	pub fn completed(&self) -> Vec<String> {
		self.completed
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.clone()
	}
}

#[async_trait]
impl EvaluationBackend for MockBackend {
	fn name(&self) -> &str {
		"mock"
	}

	fn is_available(&self) -> bool {
		!self.unavailable
	}

	async fn query(&self, _selector: &str) -> RenderResult<Vec<QueryRow>> {
		Ok(self.rows.clone())
	}

	async fn evaluate(
		&self,
		_language: &str,
		expression: &str,
		_context: &EvaluationContext,
	) -> RenderResult<Evaluated> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if let Some(millis) = self.delays.get(expression) {
			tokio::time::sleep(Duration::from_millis(*millis)).await;
		}

		self.completed
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.push(expression.to_string());

		match self.answers.get(expression) {
			Some(Answer::Text(text)) => Ok(Evaluated::Text((*text).to_string())),
			Some(Answer::Value(value)) => Ok(Evaluated::Value(value.clone())),
			Some(Answer::Fail(message)) => Err(RenderError::Evaluation((*message).to_string())),
			Some(Answer::Panic(message)) => panic!("{message}"),
			None => Err(RenderError::Evaluation(format!("unknown expression `{expression}`"))),
		}
	}
}

/// An in-memory file store.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
	files: Mutex<BTreeMap<PathBuf, String>>,
	read_only: HashSet<PathBuf>,
	writes: AtomicUsize,
}

impl MemoryFileStore {
	pub fn new(files: &[(&str, &str)]) -> Self {
		Self {
			files: Mutex::new(
				files
					.iter()
					.map(|(path, text)| (PathBuf::from(path), (*text).to_string()))
					.collect(),
			),
			..Self::default()
		}
	}

	/// Writing `path` fails.
	pub fn read_only(mut self, path: &str) -> Self {
		self.read_only.insert(PathBuf::from(path));
		self
	}

	pub fn get(&self, path: &str) -> Option<String> {
		self.files
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.get(Path::new(path))
			.cloned()
	}

	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl FileStore for MemoryFileStore {
	async fn resolve_by_path(&self, path: &Path) -> RenderResult<Option<FileHandle>> {
		let files = self
			.files
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner);

		Ok(files.contains_key(path).then(|| {
			FileHandle {
				path: path.to_path_buf(),
				relative: path.to_path_buf(),
			}
		}))
	}

	async fn read_text(&self, handle: &FileHandle) -> RenderResult<String> {
		self.files
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.get(&handle.path)
			.cloned()
			.ok_or_else(|| RenderError::FileNotFound(handle.path.display().to_string()))
	}

	async fn write_text(&self, handle: &FileHandle, text: &str) -> RenderResult<()> {
		if self.read_only.contains(&handle.path) {
			return Err(std::io::Error::new(
				std::io::ErrorKind::PermissionDenied,
				"read-only file",
			)
			.into());
		}

		self.writes.fetch_add(1, Ordering::SeqCst);
		self.files
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.insert(handle.path.clone(), text.to_string());

		Ok(())
	}
}

/// The short markers used by most tests.
pub fn short_markers() -> Markers {
	Markers::new("start", "end")
}

pub fn renderer(backend: MockBackend) -> (Arc<MockBackend>, Renderer) {
	let backend = Arc::new(backend);
	let renderer = Renderer::new(backend.clone())
		.unwrap_or_else(|e| panic!("renderer: {e}"))
		.with_markers(short_markers());

	(backend, renderer)
}

/// A block in the short marker syntax with the fence after the closed start
/// delimiter.
pub fn short_block(expression: &str, output: &str) -> String {
	format!("%%start%%\n```q\n{expression}\n```\n\n{output}\n\n%%end%%")
}

/// A block with the default markers and the fence inside the start
/// delimiter comment.
pub fn default_block(language: &str, expression: &str, output: &str) -> String {
	format!(
		"%% render block: start\n```{language}\n{expression}\n```\n%%\n\n{output}\n\n%% render \
		 block: end %%"
	)
}
