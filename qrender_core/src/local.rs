use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::EvaluationBackend;
use crate::EvaluationContext;
use crate::Evaluated;
use crate::FileSelector;
use crate::QrenderConfig;
use crate::QueryRow;
use crate::RenderError;
use crate::RenderResult;
use crate::ShellConfig;

/// An evaluation backend over a local project directory.
///
/// | language              | result                                            |
/// |-----------------------|---------------------------------------------------|
/// | `jinja`, `template`   | the rendered template text                        |
/// | `expr`                | the expression value, formatted by `format_value` |
/// | `sh`, `shell`         | stdout of the command (requires `[shell]`)        |
///
/// Templates and expressions see every `[data]` namespace plus a `file`
/// object with the `path`, `name` and `stem` of the rendered document.
#[derive(Debug, Clone)]
pub struct LocalBackend {
	root: PathBuf,
	data: HashMap<String, serde_json::Value>,
	default_language: String,
	shell: ShellConfig,
	exclude_patterns: Vec<String>,
	disable_gitignore: bool,
}

impl LocalBackend {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			data: HashMap::new(),
			default_language: "jinja".to_string(),
			shell: ShellConfig::default(),
			exclude_patterns: Vec::new(),
			disable_gitignore: false,
		}
	}

	/// Build a backend for `root` from its config, loading every data file.
	pub fn from_config(root: impl Into<PathBuf>, config: &QrenderConfig) -> RenderResult<Self> {
		let root = root.into();
		let data = config.load_data(&root)?;

		Ok(Self {
			data,
			default_language: config.default_language.clone(),
			shell: config.shell.clone(),
			exclude_patterns: config.exclude.patterns.clone(),
			disable_gitignore: config.disable_gitignore,
			root,
		})
	}

	#[must_use]
	pub fn with_data(mut self, namespace: impl Into<String>, value: serde_json::Value) -> Self {
		self.data.insert(namespace.into(), value);
		self
	}

	#[must_use]
	pub fn with_shell(mut self, shell: ShellConfig) -> Self {
		self.shell = shell;
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn template_context(&self, context: &EvaluationContext) -> serde_json::Value {
		let mut map: serde_json::Map<String, serde_json::Value> = self
			.data
			.iter()
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect();

		if let Some(file) = context.file() {
			let name = |value: Option<&std::ffi::OsStr>| {
				value
					.map(|part| part.to_string_lossy().into_owned())
					.unwrap_or_default()
			};
			map.insert(
				"file".to_string(),
				serde_json::json!({
					"path": file.to_string_lossy(),
					"name": name(file.file_name()),
					"stem": name(file.file_stem()),
				}),
			);
		}

		serde_json::Value::Object(map)
	}

	fn render_template(&self, source: &str, context: &EvaluationContext) -> RenderResult<String> {
		let env = environment();
		env.render_str(source, self.template_context(context))
			.map_err(|e| RenderError::Evaluation(e.to_string()))
	}

	fn eval_expression(
		&self,
		source: &str,
		context: &EvaluationContext,
	) -> RenderResult<serde_json::Value> {
		let env = environment();
		let expression = env
			.compile_expression(source)
			.map_err(|e| RenderError::Evaluation(e.to_string()))?;
		let value = expression
			.eval(self.template_context(context))
			.map_err(|e| RenderError::Evaluation(e.to_string()))?;

		serde_json::to_value(&value).map_err(|e| RenderError::Evaluation(e.to_string()))
	}

	async fn run_shell(&self, command: &str) -> RenderResult<String> {
		if !self.shell.enabled {
			return Err(RenderError::Evaluation(
				"shell expressions are disabled; set `[shell] enabled = true`".to_string(),
			));
		}

		let child = Command::new(&self.shell.program)
			.arg("-c")
			.arg(command)
			.current_dir(&self.root)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| {
				RenderError::Evaluation(format!("failed to start `{}`: {e}", self.shell.program))
			})?;

		let output = match self.shell.timeout_ms {
			Some(timeout) => {
				tokio::time::timeout(Duration::from_millis(timeout), child.wait_with_output())
					.await
					.map_err(|_| {
						RenderError::Evaluation(format!("command timed out after {timeout}ms"))
					})?
			}
			None => child.wait_with_output().await,
		}?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			let code = output
				.status
				.code()
				.map_or_else(|| "signal".to_string(), |code| code.to_string());
			return Err(RenderError::Evaluation(format!(
				"command exited with {code}: {}",
				stderr.trim()
			)));
		}

		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}
}

fn environment() -> minijinja::Environment<'static> {
	let mut env = minijinja::Environment::new();
	env.set_keep_trailing_newline(true);
	env.set_undefined_behavior(minijinja::UndefinedBehavior::Chainable);
	env
}

#[async_trait]
impl EvaluationBackend for LocalBackend {
	fn name(&self) -> &str {
		"local"
	}

	fn is_available(&self) -> bool {
		self.root.is_dir()
	}

	async fn query(&self, selector: &str) -> RenderResult<Vec<QueryRow>> {
		let selector = FileSelector::new(selector)?;
		let paths = selector.collect(&self.root, &self.exclude_patterns, self.disable_gitignore)?;

		Ok(paths.into_iter().map(QueryRow::new).collect())
	}

	async fn evaluate(
		&self,
		language: &str,
		expression: &str,
		context: &EvaluationContext,
	) -> RenderResult<Evaluated> {
		let language = if language.is_empty() {
			self.default_language.as_str()
		} else {
			language
		};

		match language.to_ascii_lowercase().as_str() {
			"jinja" | "template" => self.render_template(expression, context).map(Evaluated::Text),
			"expr" => self.eval_expression(expression, context).map(Evaluated::Value),
			"sh" | "shell" => self.run_shell(expression).await.map(Evaluated::Text),
			other => {
				Err(RenderError::Evaluation(format!(
					"unsupported query language `{other}`"
				)))
			}
		}
	}
}
