use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;

use crate::DEFAULT_CONCURRENCY;
use crate::Editor;
use crate::EvaluationBackend;
use crate::EvaluationContext;
use crate::FileStore;
use crate::FormatSettings;
use crate::Markers;
use crate::Plan;
use crate::QrenderConfig;
use crate::RenderError;
use crate::RenderResult;
use crate::planner;

/// Apply every replacer of `plan` to `text` in order.
///
/// Each search starts right after the text inserted by the previous
/// replacer, so a block is replaced at most once and a replacement is never
/// searched again. A search that cannot be found is skipped.
pub fn fold(text: &str, plan: &Plan) -> String {
	let mut result = String::with_capacity(text.len());
	let mut cursor = 0;

	for replacer in plan.iter() {
		let Some(found) = text[cursor..].find(&replacer.search) else {
			tracing::warn!(
				search = %first_line(&replacer.search),
				"block text not found in document, skipping"
			);
			continue;
		};

		let start = cursor + found;
		result.push_str(&text[cursor..start]);
		result.push_str(&replacer.replace);
		cursor = start + replacer.search.len();
	}

	result.push_str(&text[cursor..]);
	result
}

fn first_line(text: &str) -> &str {
	text.lines().next().unwrap_or_default()
}

/// Result of [`Renderer::update_editor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
	/// The document has no blocks. The editor was not touched.
	NoBlocks,
	/// Rendering produced the current text. The editor was not touched.
	Unchanged,
	/// The editor text was replaced. `changes` counts the blocks whose
	/// output changed.
	Updated { changes: usize },
}

/// Options for [`Renderer::update_from_selector`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
	/// Compute every change but write nothing.
	pub dry_run: bool,
}

/// What happened to one file in batch mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
	/// The rendered text differs from the stored text. It was written unless
	/// this was a dry run.
	Updated { original: String, rendered: String },
	Unchanged,
	/// The file could not be processed.
	Skipped { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
	pub path: PathBuf,
	pub status: FileStatus,
}

/// The outcome of a batch update, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
	pub files: Vec<FileReport>,
}

impl BatchReport {
	pub fn updated(&self) -> impl Iterator<Item = &FileReport> {
		self.files
			.iter()
			.filter(|file| matches!(file.status, FileStatus::Updated { .. }))
	}

	pub fn unchanged(&self) -> impl Iterator<Item = &FileReport> {
		self.files
			.iter()
			.filter(|file| file.status == FileStatus::Unchanged)
	}

	pub fn skipped(&self) -> impl Iterator<Item = &FileReport> {
		self.files
			.iter()
			.filter(|file| matches!(file.status, FileStatus::Skipped { .. }))
	}

	pub fn is_clean(&self) -> bool {
		self.files
			.iter()
			.all(|file| file.status == FileStatus::Unchanged)
	}
}

/// Renders the blocks of documents against an evaluation backend.
#[derive(Clone)]
pub struct Renderer {
	backend: Arc<dyn EvaluationBackend>,
	markers: Markers,
	format: FormatSettings,
	concurrency: usize,
}

impl std::fmt::Debug for Renderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Renderer")
			.field("backend", &self.backend.name())
			.field("markers", &self.markers)
			.field("format", &self.format)
			.field("concurrency", &self.concurrency)
			.finish()
	}
}

impl Renderer {
	/// Create a renderer. Fails with [`RenderError::BackendUnavailable`] when
	/// the backend cannot serve requests.
	pub fn new(backend: Arc<dyn EvaluationBackend>) -> RenderResult<Self> {
		if !backend.is_available() {
			return Err(RenderError::BackendUnavailable(backend.name().to_string()));
		}

		Ok(Self {
			backend,
			markers: Markers::default(),
			format: FormatSettings::default(),
			concurrency: DEFAULT_CONCURRENCY,
		})
	}

	/// Create a renderer using the markers, formatting and concurrency of
	/// `config`.
	pub fn from_config(
		backend: Arc<dyn EvaluationBackend>,
		config: &QrenderConfig,
	) -> RenderResult<Self> {
		Ok(Self::new(backend)?
			.with_markers(config.markers.clone())
			.with_format(config.format.clone())
			.with_concurrency(config.concurrency))
	}

	#[must_use]
	pub fn with_markers(mut self, markers: Markers) -> Self {
		self.markers = markers;
		self
	}

	#[must_use]
	pub fn with_format(mut self, format: FormatSettings) -> Self {
		self.format = format;
		self
	}

	/// Maximum number of files processed at once in batch mode. Zero is
	/// treated as one.
	#[must_use]
	pub fn with_concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency.max(1);
		self
	}

	pub fn markers(&self) -> &Markers {
		&self.markers
	}

	pub fn backend(&self) -> &dyn EvaluationBackend {
		self.backend.as_ref()
	}

	/// Build the replacement plan for `text`.
	pub async fn plan(&self, text: &str, context: &EvaluationContext) -> RenderResult<Plan> {
		planner::plan(
			text,
			&self.markers,
			self.backend.as_ref(),
			context,
			&self.format,
		)
		.await
	}

	/// Render every block of `text`. Returns `None` when the document has no
	/// blocks or rendering would not change it.
	pub async fn render_text(
		&self,
		text: &str,
		context: &EvaluationContext,
	) -> RenderResult<Option<String>> {
		let plan = self.plan(text, context).await?;

		if plan.is_empty() {
			return Ok(None);
		}

		let rendered = fold(text, &plan);
		Ok((rendered != text).then_some(rendered))
	}

	/// Render the document open in `editor`.
	///
	/// The editor is only written to when the rendered text differs from its
	/// current text, so a change listener that calls this again settles after
	/// one round. The cursor is restored after writing.
	pub async fn update_editor<E: Editor + ?Sized>(
		&self,
		editor: &mut E,
		context: &EvaluationContext,
	) -> RenderResult<UpdateOutcome> {
		let cursor = editor.cursor();
		let text = editor.text();
		let plan = self.plan(&text, context).await?;

		if plan.is_empty() {
			return Ok(UpdateOutcome::NoBlocks);
		}

		let rendered = fold(&text, &plan);

		if rendered == text {
			tracing::debug!(file = ?context.file(), "document is up to date");
			return Ok(UpdateOutcome::Unchanged);
		}

		editor.set_text(rendered);
		editor.set_cursor(cursor);

		Ok(UpdateOutcome::Updated {
			changes: plan.changes(),
		})
	}

	/// Render one document of `store` and write it back when it changes.
	pub async fn update_file(
		&self,
		store: &dyn FileStore,
		path: &Path,
		options: BatchOptions,
	) -> RenderResult<FileStatus> {
		let handle = store
			.resolve_by_path(path)
			.await?
			.ok_or_else(|| RenderError::FileNotFound(path.display().to_string()))?;
		let original = store.read_text(&handle).await?;
		let context = EvaluationContext::for_file(&handle.relative);

		let Some(rendered) = self.render_text(&original, &context).await? else {
			return Ok(FileStatus::Unchanged);
		};

		if options.dry_run {
			tracing::info!(path = %path.display(), "file would be updated");
		} else {
			store.write_text(&handle, &rendered).await?;
			tracing::info!(path = %path.display(), "updated file");
		}

		Ok(FileStatus::Updated { original, rendered })
	}

	/// Update every document matched by `selector`.
	///
	/// Files are processed concurrently. A file that fails to resolve, read,
	/// parse or write is reported as skipped and does not stop the batch.
	pub async fn update_from_selector(
		&self,
		store: &dyn FileStore,
		selector: &str,
		options: BatchOptions,
	) -> RenderResult<BatchReport> {
		let mut rows = self.backend.query(selector).await?;
		rows.sort_by(|a, b| a.path.cmp(&b.path));
		rows.dedup_by(|a, b| a.path == b.path);
		tracing::debug!(selector, files = rows.len(), "resolved selector");

		let mut files: Vec<FileReport> = stream::iter(rows)
			.map(|row| {
				async move {
					let status = match self.update_file(store, &row.path, options).await {
						Ok(status) => status,
						Err(error) => {
							tracing::warn!(path = %row.path.display(), %error, "skipping file");
							FileStatus::Skipped {
								error: error.to_string(),
							}
						}
					};

					FileReport {
						path: row.path,
						status,
					}
				}
			})
			.buffer_unordered(self.concurrency)
			.collect()
			.await;

		files.sort_by(|a, b| a.path.cmp(&b.path));

		Ok(BatchReport { files })
	}
}
