use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::RenderError;
use crate::RenderResult;

/// A compiled file selector: comma separated glob patterns matched against
/// paths relative to a project root.
///
/// `notes/**/*.md, README.md` selects every markdown file below `notes` and
/// the root readme.
#[derive(Debug, Clone)]
pub struct FileSelector {
	source: String,
	globs: GlobSet,
}

impl FileSelector {
	pub fn new(selector: &str) -> RenderResult<Self> {
		let query_error = |reason: String| {
			RenderError::Query {
				selector: selector.to_string(),
				reason,
			}
		};

		let mut builder = GlobSetBuilder::new();
		let mut count = 0;

		for pattern in selector.split(',').map(str::trim).filter(|p| !p.is_empty()) {
			let glob = Glob::new(pattern)
				.map_err(|e| query_error(format!("invalid glob `{pattern}`: {e}")))?;
			builder.add(glob);
			count += 1;
		}

		if count == 0 {
			return Err(query_error("selector has no patterns".to_string()));
		}

		let globs = builder.build().map_err(|e| query_error(e.to_string()))?;

		Ok(Self {
			source: selector.to_string(),
			globs,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub fn is_match(&self, relative: &Path) -> bool {
		self.globs.is_match(relative)
	}

	/// Walk `root` and return the sorted relative paths of every file the
	/// selector matches.
	///
	/// Files matched by the root `.gitignore` are skipped unless
	/// `disable_gitignore` is set. `exclude_patterns` use gitignore syntax and
	/// are always applied.
	pub fn collect(
		&self,
		root: &Path,
		exclude_patterns: &[String],
		disable_gitignore: bool,
	) -> RenderResult<Vec<PathBuf>> {
		let gitignore = if disable_gitignore {
			Gitignore::empty()
		} else {
			build_gitignore(root)
		};
		let exclude = build_exclude_matcher(root, exclude_patterns)?;
		let mut walker = Walker {
			root,
			selector: self,
			gitignore: &gitignore,
			exclude: &exclude,
			visited_dirs: HashSet::new(),
			files: Vec::new(),
		};

		walker.walk(root)?;

		let mut files = walker.files;
		files.sort();
		Ok(files)
	}
}

struct Walker<'a> {
	root: &'a Path,
	selector: &'a FileSelector,
	gitignore: &'a Gitignore,
	exclude: &'a Gitignore,
	visited_dirs: HashSet<PathBuf>,
	files: Vec<PathBuf>,
}

impl Walker<'_> {
	fn walk(&mut self, dir: &Path) -> RenderResult<()> {
		if !dir.is_dir() {
			return Ok(());
		}

		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !self.visited_dirs.insert(canonical) {
			tracing::debug!(path = %dir.display(), "skipping already visited directory");
			return Ok(());
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();

			if path
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(is_ignored_name)
			{
				continue;
			}

			let is_dir = path.is_dir();

			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				self.walk(&path)?;
				continue;
			}

			let Ok(relative) = path.strip_prefix(self.root) else {
				continue;
			};

			if self.selector.is_match(relative) {
				self.files.push(relative.to_path_buf());
			}
		}

		Ok(())
	}
}

fn is_ignored_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "target"
}

fn build_exclude_matcher(root: &Path, patterns: &[String]) -> RenderResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			RenderError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| RenderError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.is_file() {
		if let Some(error) = builder.add(&gitignore_path) {
			tracing::warn!(path = %gitignore_path.display(), %error, "failed to read .gitignore");
		}
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}
