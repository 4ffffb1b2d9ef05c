use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::FormatSettings;
use crate::Markers;
use crate::RenderError;
use crate::RenderResult;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of files rendered at once in batch mode.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["qrender.toml", ".qrender.toml", ".config/qrender.toml"];

/// Data source entry for a `[data]` namespace.
///
/// ```toml
/// [data]
/// pkg = "package.json"
/// release = { path = "release-info", format = "json" }
/// ```
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum DataSource {
	Path(PathBuf),
	Typed { path: PathBuf, format: String },
}

impl DataSource {
	pub fn path(&self) -> &Path {
		match self {
			Self::Path(path) | Self::Typed { path, .. } => path,
		}
	}

	/// The explicit format, or the file extension when none is configured.
	pub fn format(&self) -> String {
		match self {
			Self::Path(path) => {
				path.extension()
					.and_then(|extension| extension.to_str())
					.unwrap_or("")
					.to_ascii_lowercase()
			}
			Self::Typed { format, .. } => format.trim().to_ascii_lowercase(),
		}
	}
}

/// Settings for the `sh` expression language of the local backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
	/// Shell commands are only run when this is `true`.
	#[serde(default)]
	pub enabled: bool,
	/// Program invoked as `<program> -c <expression>`.
	#[serde(default = "default_shell_program")]
	pub program: String,
	/// Kill the command when it runs longer than this many milliseconds.
	#[serde(default)]
	pub timeout_ms: Option<u64>,
}

impl Default for ShellConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			program: default_shell_program(),
			timeout_ms: None,
		}
	}
}

fn default_shell_program() -> String {
	"sh".to_string()
}

/// Configuration for excluding files from selector queries.
#[derive(Debug, Default, Deserialize)]
pub struct ExcludeConfig {
	/// Gitignore-style patterns relative to the project root, e.g.
	/// `"vendor/"` or `"*.draft.md"`.
	#[serde(default)]
	pub patterns: Vec<String>,
}

/// Configuration loaded from a `qrender.toml` file.
///
/// ```toml
/// selector = "notes/**/*.md"
/// update_on_change = true
/// default_language = "jinja"
///
/// [markers]
/// start = "render block: start"
/// end = "render block: end"
///
/// [format]
/// null = "n/a"
/// list_marker = "* "
///
/// [shell]
/// enabled = true
///
/// [data]
/// pkg = "package.json"
/// ```
#[derive(Debug, Deserialize)]
pub struct QrenderConfig {
	/// Selector resolved by the backend to find the files to update in batch
	/// mode.
	#[serde(default)]
	pub selector: String,
	/// Re-render a watched document whenever it changes.
	#[serde(default)]
	pub update_on_change: bool,
	/// Language used for fences that have no language tag.
	#[serde(default = "default_language")]
	pub default_language: String,
	/// Maximum number of files rendered at once in batch mode.
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
	/// Files larger than this are not read.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// When true, `.gitignore` is not consulted while resolving selectors.
	#[serde(default)]
	pub disable_gitignore: bool,
	#[serde(default)]
	pub markers: Markers,
	#[serde(default)]
	pub format: FormatSettings,
	#[serde(default)]
	pub shell: ShellConfig,
	/// Map of namespace name to data source.
	#[serde(default)]
	pub data: HashMap<String, DataSource>,
	#[serde(default)]
	pub exclude: ExcludeConfig,
}

impl Default for QrenderConfig {
	fn default() -> Self {
		Self {
			selector: String::new(),
			update_on_change: false,
			default_language: default_language(),
			concurrency: DEFAULT_CONCURRENCY,
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			disable_gitignore: false,
			markers: Markers::default(),
			format: FormatSettings::default(),
			shell: ShellConfig::default(),
			data: HashMap::new(),
			exclude: ExcludeConfig::default(),
		}
	}
}

fn default_language() -> String {
	"jinja".to_string()
}

fn default_concurrency() -> usize {
	DEFAULT_CONCURRENCY
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

impl QrenderConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is no config file.
	pub fn load(root: &Path) -> RenderResult<Option<QrenderConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		Self::from_toml(&content).map(Some)
	}

	/// Load the config at `root`, falling back to defaults.
	pub fn load_or_default(root: &Path) -> RenderResult<QrenderConfig> {
		Ok(Self::load(root)?.unwrap_or_default())
	}

	pub fn from_toml(content: &str) -> RenderResult<QrenderConfig> {
		toml::from_str(content).map_err(|e| RenderError::ConfigParse(e.to_string()))
	}

	/// Read each data file and parse it into a `serde_json::Value` keyed by
	/// namespace.
	pub fn load_data(&self, root: &Path) -> RenderResult<HashMap<String, serde_json::Value>> {
		let mut data = HashMap::with_capacity(self.data.len());

		for (namespace, source) in &self.data {
			let display = source.path().display().to_string();
			let content = std::fs::read_to_string(root.join(source.path())).map_err(|e| {
				RenderError::DataFile {
					path: display.clone(),
					reason: e.to_string(),
				}
			})?;
			let value = parse_data_file(&content, &source.format(), &display)?;
			data.insert(namespace.clone(), value);
		}

		Ok(data)
	}
}

/// Parse a data file's content into a `serde_json::Value` based on its
/// format.
fn parse_data_file(content: &str, format: &str, path: &str) -> RenderResult<serde_json::Value> {
	let data_error = |reason: String| {
		RenderError::DataFile {
			path: path.to_string(),
			reason,
		}
	};

	match format {
		"text" | "txt" | "raw" => Ok(serde_json::Value::String(content.to_string())),
		"json" => serde_json::from_str(content).map_err(|e| data_error(e.to_string())),
		"toml" => {
			let value: toml::Value =
				toml::from_str(content).map_err(|e| data_error(e.to_string()))?;
			toml_to_json(value, path)
		}
		"yaml" | "yml" => serde_yaml_ng::from_str(content).map_err(|e| data_error(e.to_string())),
		other => Err(RenderError::UnsupportedDataFormat(other.to_string())),
	}
}

fn toml_to_json(value: toml::Value, path: &str) -> RenderResult<serde_json::Value> {
	let float = |value: f64| {
		serde_json::Number::from_f64(value)
			.map(serde_json::Value::Number)
			.ok_or_else(|| {
				RenderError::UnconvertibleFloat {
					path: path.to_string(),
					value: value.to_string(),
				}
			})
	};

	let json = match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::Number(i.into()),
		toml::Value::Float(f) => float(f)?,
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(items) => {
			serde_json::Value::Array(
				items
					.into_iter()
					.map(|item| toml_to_json(item, path))
					.collect::<RenderResult<_>>()?,
			)
		}
		toml::Value::Table(table) => {
			let mut map = serde_json::Map::new();
			for (key, item) in table {
				map.insert(key, toml_to_json(item, path)?);
			}
			serde_json::Value::Object(map)
		}
	};

	Ok(json)
}
