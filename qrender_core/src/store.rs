use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::DEFAULT_MAX_FILE_SIZE;
use crate::RenderError;
use crate::RenderResult;

/// A document resolved by a [`FileStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
	/// Location the store reads from and writes to.
	pub path: PathBuf,
	/// The path relative to the store root, as returned by the backend.
	pub relative: PathBuf,
}

/// The persistent file store documents are read from and written back to.
#[async_trait]
pub trait FileStore: Send + Sync {
	/// Resolve a store-relative path. Returns `None` when no such document
	/// exists.
	async fn resolve_by_path(&self, path: &Path) -> RenderResult<Option<FileHandle>>;

	async fn read_text(&self, handle: &FileHandle) -> RenderResult<String>;

	async fn write_text(&self, handle: &FileHandle, text: &str) -> RenderResult<()>;
}

/// A [`FileStore`] over a directory of the local filesystem.
#[derive(Debug, Clone)]
pub struct FsFileStore {
	root: PathBuf,
	max_file_size: u64,
}

impl FsFileStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
		}
	}

	#[must_use]
	pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
		self.max_file_size = max_file_size;
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}
}

#[async_trait]
impl FileStore for FsFileStore {
	async fn resolve_by_path(&self, path: &Path) -> RenderResult<Option<FileHandle>> {
		let full = self.root.join(path);

		match tokio::fs::metadata(&full).await {
			Ok(metadata) if metadata.is_file() => {
				Ok(Some(FileHandle {
					path: full,
					relative: path.to_path_buf(),
				}))
			}
			Ok(_) => Ok(None),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(error) => Err(error.into()),
		}
	}

	async fn read_text(&self, handle: &FileHandle) -> RenderResult<String> {
		let metadata = tokio::fs::metadata(&handle.path).await.map_err(|error| {
			if error.kind() == std::io::ErrorKind::NotFound {
				RenderError::FileNotFound(handle.relative.display().to_string())
			} else {
				error.into()
			}
		})?;

		if metadata.len() > self.max_file_size {
			return Err(RenderError::FileTooLarge {
				path: handle.relative.display().to_string(),
				size: metadata.len(),
				limit: self.max_file_size,
			});
		}

		Ok(tokio::fs::read_to_string(&handle.path).await?)
	}

	async fn write_text(&self, handle: &FileHandle, text: &str) -> RenderResult<()> {
		tokio::fs::write(&handle.path, text).await?;
		Ok(())
	}
}
