use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render live query blocks in your documents into static text.",
	long_about = "qrender evaluates the query embedded in every `%% render block: start` \
	              delimiter of a document and writes the result between the delimiters, so \
	              the document can be read without the query engine.\n\nQuick start:\n  \
	              qrender init              Create a qrender.toml\n  qrender render notes.md   \
	              Render one document\n  qrender update            Render every selected \
	              document\n  qrender check             Verify everything is up to date"
)]
pub struct QrenderCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output and debug logging.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a sample `qrender.toml` in the project root.
	///
	/// Does nothing when a config file already exists.
	Init,
	/// Render every block of a single document now.
	///
	/// The document is only written when its rendered text differs from the
	/// current text. Malformed blocks fail the command.
	Render {
		/// The document to render, relative to the project root.
		file: PathBuf,

		/// Show the rendered changes without writing the file.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// Re-render the document every time it changes. Enabled by default
		/// when `update_on_change = true` is set in `qrender.toml`.
		#[arg(long, default_value_t = false)]
		watch: bool,
	},
	/// Render every document matched by the selector.
	///
	/// Files that cannot be read, parsed or written are reported and skipped.
	Update {
		/// Selector to use instead of the `selector` from `qrender.toml`.
		#[arg(long, short)]
		selector: Option<String>,

		/// Report which files would change without writing them.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// Check that every selected document is up to date.
	///
	/// Exits with status 1 when rendering would change any document or a
	/// document has malformed blocks. Nothing is written.
	Check {
		/// Selector to use instead of the `selector` from `qrender.toml`.
		#[arg(long, short)]
		selector: Option<String>,

		/// Show a unified diff for every stale document.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Output format for check results.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// List the blocks of every selected document.
	List {
		/// Selector to use instead of the `selector` from `qrender.toml`.
		#[arg(long, short)]
		selector: Option<String>,
	},
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
	Text,
	Json,
}
