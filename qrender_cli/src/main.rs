use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use owo_colors::OwoColorize;
use qrender_cli::Commands;
use qrender_cli::OutputFormat;
use qrender_cli::QrenderCli;
use qrender_core::BatchOptions;
use qrender_core::BufferEditor;
use qrender_core::CONFIG_FILE_CANDIDATES;
use qrender_core::Editor;
use qrender_core::EvaluationContext;
use qrender_core::FileStatus;
use qrender_core::FileStore;
use qrender_core::FsFileStore;
use qrender_core::LocalBackend;
use qrender_core::QrenderConfig;
use qrender_core::RenderError;
use qrender_core::Renderer;
use qrender_core::UpdateOutcome;
use similar::ChangeTag;
use similar::TextDiff;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = QrenderCli::parse();

	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match Runtime::new() {
		Ok(rt) => run(&args, &rt),
		Err(e) => Err(e.into()),
	};

	if let Err(e) = result {
		match e.downcast::<RenderError>() {
			Ok(render_error) => {
				let report: miette::Report = (*render_error).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn init_tracing(verbose: bool, use_color: bool) {
	let filter = if verbose {
		EnvFilter::new("qrender_core=debug,qrender_cli=debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
	};

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();
}

fn run(args: &QrenderCli, rt: &Runtime) -> CliResult {
	match &args.command {
		Some(Commands::Init) => run_init(args),
		Some(Commands::Render {
			file,
			dry_run,
			watch,
		}) => run_render(args, rt, file, *dry_run, *watch),
		Some(Commands::Update { selector, dry_run }) => {
			run_update(args, rt, selector.as_deref(), *dry_run)
		}
		Some(Commands::Check {
			selector,
			diff,
			format,
		}) => run_check(args, rt, selector.as_deref(), *diff, *format),
		Some(Commands::List { selector }) => run_list(args, rt, selector.as_deref()),
		None => {
			eprintln!("No subcommand specified. Run `qrender --help` for usage.");
			process::exit(1);
		}
	}
}

fn resolve_root(args: &QrenderCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Everything a command needs to render documents of one project.
struct Workspace {
	root: PathBuf,
	config: QrenderConfig,
	renderer: Renderer,
	store: FsFileStore,
}

impl Workspace {
	fn load(args: &QrenderCli) -> CliResult<Self> {
		let root = resolve_root(args);
		let config = QrenderConfig::load_or_default(&root)?;
		let backend = Arc::new(LocalBackend::from_config(&root, &config)?);
		let renderer = Renderer::from_config(backend, &config)?;
		let store = FsFileStore::new(&root).with_max_file_size(config.max_file_size);

		if args.verbose {
			match QrenderConfig::resolve_path(&root) {
				Some(path) => println!("Using config {}", path.display()),
				None => println!("No config file found, using defaults"),
			}
		}

		Ok(Self {
			root,
			config,
			renderer,
			store,
		})
	}

	fn selector(&self, selector: Option<&str>) -> CliResult<String> {
		let selector = selector.unwrap_or(&self.config.selector).trim();

		if selector.is_empty() {
			return Err(
				"no selector configured: pass `--selector` or set `selector` in qrender.toml".into(),
			);
		}

		Ok(selector.to_string())
	}

	/// The path of `file` relative to the project root.
	fn relative(&self, file: &Path) -> PathBuf {
		if file.is_absolute() {
			file.strip_prefix(&self.root)
				.map_or_else(|_| file.to_path_buf(), Path::to_path_buf)
		} else {
			file.to_path_buf()
		}
	}
}

fn run_init(args: &QrenderCli) -> CliResult {
	let root = resolve_root(args);

	if let Some(existing) = QrenderConfig::resolve_path(&root) {
		println!("Config file already exists: {}", existing.display());
		return Ok(());
	}

	let config_path = root.join(CONFIG_FILE_CANDIDATES[0]);
	let sample_config = "# qrender configuration\n\n# Documents rendered by `qrender update` and \
	                     `qrender check`.\nselector = \"**/*.md\"\n\n# Re-render a document \
	                     passed to `qrender render` whenever it changes.\nupdate_on_change = \
	                     false\n\n# Language used by fences without a language tag.\n# \
	                     default_language = \"jinja\"\n\n# [markers]\n# start = \"render block: \
	                     start\"\n# end = \"render block: end\"\n\n# Allow `sh` blocks to run \
	                     shell commands.\n# [shell]\n# enabled = true\n# timeout_ms = 10000\n\n# \
	                     Map data files to namespaces available in `jinja` and `expr` blocks.\n# \
	                     [data]\n# pkg = \"package.json\"\n";

	std::fs::write(&config_path, sample_config)?;
	println!("Created {}", config_path.display());
	println!();
	println!("Next steps:");
	println!("  1. Add a block to one of your documents:");
	println!("     %% render block: start");
	println!("     ```jinja");
	println!("     Rendered from {{{{ file.name }}}}");
	println!("     ```");
	println!("     %%");
	println!("     %% render block: end %%");
	println!("  2. Run `qrender update` to render every block");

	Ok(())
}

fn run_render(
	args: &QrenderCli,
	rt: &Runtime,
	file: &Path,
	dry_run: bool,
	watch: bool,
) -> CliResult {
	let workspace = Workspace::load(args)?;
	let relative = workspace.relative(file);
	let watch = watch || workspace.config.update_on_change;

	render_once(rt, &workspace, &relative, dry_run, false)?;

	if !watch || dry_run {
		return Ok(());
	}

	let target = std::fs::canonicalize(workspace.root.join(&relative))?;
	let Some(parent) = target.parent().map(Path::to_path_buf) else {
		return Err(format!("cannot watch `{}`", target.display()).into());
	};

	println!(
		"\nWatching {} for changes... (press Ctrl+C to stop)",
		relative.display()
	);

	let (tx, rx) = mpsc::channel();
	let watched = target.clone();
	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				if matches!(
					event.kind,
					notify::EventKind::Modify(_) | notify::EventKind::Create(_)
				) && event.paths.iter().any(|path| path == &watched)
				{
					let _ = tx.send(());
				}
			}
		})?;

	use notify::Watcher;
	watcher.watch(&parent, notify::RecursiveMode::NonRecursive)?;

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

		tracing::debug!(path = %relative.display(), "document changed");
		// Writing the document triggers one more event, which renders to the
		// same text and is not written again.
		if let Err(e) = render_once(rt, &workspace, &relative, false, true) {
			eprintln!("{} {e}", colored!("error:", red));
		}
	}
}

/// Render one document. When `quiet` is set only updates are printed.
fn render_once(
	rt: &Runtime,
	workspace: &Workspace,
	relative: &Path,
	dry_run: bool,
	quiet: bool,
) -> CliResult {
	let handle = rt
		.block_on(workspace.store.resolve_by_path(relative))?
		.ok_or_else(|| RenderError::FileNotFound(relative.display().to_string()))?;
	let text = rt.block_on(workspace.store.read_text(&handle))?;
	let context = EvaluationContext::for_file(relative);
	let mut editor = BufferEditor::new(text.as_str());
	let outcome = rt.block_on(workspace.renderer.update_editor(&mut editor, &context))?;
	let display = relative.display();

	match outcome {
		UpdateOutcome::NoBlocks => {
			if !quiet {
				println!("No blocks found in {display}.");
			}
		}
		UpdateOutcome::Unchanged => {
			if !quiet {
				println!("{display} is already up to date.");
			}
		}
		UpdateOutcome::Updated { changes } => {
			if dry_run {
				println!("Dry run: would update {changes} block(s) in {display}:");
				print_diff(&text, &editor.text());
			} else {
				rt.block_on(workspace.store.write_text(&handle, &editor.text()))?;
				println!(
					"{} {changes} block(s) in {display}.",
					colored!("Rendered", green)
				);
			}
		}
	}

	Ok(())
}

fn run_update(args: &QrenderCli, rt: &Runtime, selector: Option<&str>, dry_run: bool) -> CliResult {
	let workspace = Workspace::load(args)?;
	let selector = workspace.selector(selector)?;
	let report = rt.block_on(workspace.renderer.update_from_selector(
		&workspace.store,
		&selector,
		BatchOptions { dry_run },
	))?;

	for file in report.skipped() {
		if let FileStatus::Skipped { error } = &file.status {
			eprintln!(
				"{} skipped {}: {error}",
				colored!("warning:", yellow),
				file.path.display()
			);
		}
	}

	if report.files.is_empty() {
		println!("No documents matched `{selector}`.");
		return Ok(());
	}

	let updated: Vec<_> = report.updated().collect();

	if updated.is_empty() {
		println!("All documents are already up to date.");
	} else if dry_run {
		println!("Dry run: would update {} file(s):", updated.len());
		for file in &updated {
			println!("  {}", file.path.display());
		}
	} else {
		println!("Updated {} file(s):", updated.len());
		for file in &updated {
			println!("  {}", file.path.display());
		}
	}

	if args.verbose {
		for file in report.unchanged() {
			println!("  {} (unchanged)", file.path.display());
		}
	}

	Ok(())
}

fn run_check(
	args: &QrenderCli,
	rt: &Runtime,
	selector: Option<&str>,
	show_diff: bool,
	format: OutputFormat,
) -> CliResult {
	let workspace = Workspace::load(args)?;
	let selector = workspace.selector(selector)?;
	let report = rt.block_on(workspace.renderer.update_from_selector(
		&workspace.store,
		&selector,
		BatchOptions { dry_run: true },
	))?;

	let stale: Vec<_> = report.updated().collect();
	let errors: Vec<_> = report.skipped().collect();
	let ok = stale.is_empty() && errors.is_empty();

	match format {
		OutputFormat::Json => {
			let stale_entries: Vec<String> = stale
				.iter()
				.map(|file| file.path.display().to_string())
				.collect();
			let error_entries: Vec<serde_json::Value> = errors
				.iter()
				.map(|file| {
					let message = match &file.status {
						FileStatus::Skipped { error } => error.as_str(),
						_ => "",
					};
					serde_json::json!({
						"file": file.path.display().to_string(),
						"message": message,
					})
				})
				.collect();
			let output = serde_json::json!({
				"ok": ok,
				"stale": stale_entries,
				"errors": error_entries,
			});
			println!("{output}");
		}
		OutputFormat::Text => {
			if ok {
				println!("Check passed: all documents are up to date.");
			} else {
				eprintln!("Check failed.");
				eprintln!("  errors: {}", errors.len());
				eprintln!("  stale documents: {}", stale.len());

				if !errors.is_empty() {
					eprintln!();
					eprintln!("Errors:");
					for file in &errors {
						if let FileStatus::Skipped { error } = &file.status {
							eprintln!("  {}: {error}", file.path.display());
						}
					}
				}

				if !stale.is_empty() {
					eprintln!();
					eprintln!("Stale documents:");
					for file in &stale {
						eprintln!("  {}", file.path.display());
						if show_diff {
							if let FileStatus::Updated { original, rendered } = &file.status {
								print_diff(original, rendered);
							}
						}
					}
				}

				eprintln!();
				eprintln!(
					"Run `qrender update` to render {} document(s).",
					stale.len()
				);
			}
		}
	}

	if !ok {
		process::exit(1);
	}

	Ok(())
}

fn run_list(args: &QrenderCli, rt: &Runtime, selector: Option<&str>) -> CliResult {
	let workspace = Workspace::load(args)?;
	let selector = workspace.selector(selector)?;
	let rows = rt.block_on(workspace.renderer.backend().query(&selector))?;
	let mut total = 0;

	for row in rows {
		let Some(handle) = rt.block_on(workspace.store.resolve_by_path(&row.path))? else {
			continue;
		};
		let text = match rt.block_on(workspace.store.read_text(&handle)) {
			Ok(text) => text,
			Err(e) => {
				eprintln!(
					"{} skipped {}: {e}",
					colored!("warning:", yellow),
					row.path.display()
				);
				continue;
			}
		};

		let mut printed_header = false;
		for result in qrender_core::parse(&text, workspace.renderer.markers()) {
			let block = match result {
				Ok(block) => block,
				Err(e) => {
					eprintln!(
						"{} {}: {e}",
						colored!("warning:", yellow),
						row.path.display()
					);
					break;
				}
			};

			if !printed_header {
				println!("{}", colored!(row.path.display().to_string(), bold));
				printed_header = true;
			}

			let language = if block.language.is_empty() {
				workspace.config.default_language.as_str()
			} else {
				block.language.as_str()
			};
			let expression = block.expression.lines().next().unwrap_or_default();
			println!(
				"  {}:{} [{language}] {expression}",
				block.span.start.line, block.span.start.column
			);
			total += 1;
		}
	}

	if total == 0 {
		println!("No blocks found.");
	} else {
		println!();
		println!("{total} block(s) found.");
	}

	Ok(())
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for hunk in diff.unified_diff().context_radius(2).iter_hunks() {
		eprintln!("  {}", hunk.header());
		for change in hunk.iter_changes() {
			match change.tag() {
				ChangeTag::Delete => {
					eprint!("  {}", colored!(format!("-{change}"), red));
				}
				ChangeTag::Insert => {
					eprint!("  {}", colored!(format!("+{change}"), green));
				}
				ChangeTag::Equal => {
					eprint!("   {change}");
				}
			}
			if change.missing_newline() {
				eprintln!();
			}
		}
	}
}
