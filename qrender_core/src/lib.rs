//! `qrender_core` renders live query blocks embedded in text documents into
//! static output, so the document can be read or published without running
//! the query engine again.
//!
//! ## Block Syntax
//!
//! ````markdown
//! %% render block: start
//! ```expr
//! pkg.keywords
//! ```
//! %%
//!
//! - markdown
//! - render
//!
//! %% render block: end %%
//! ````
//!
//! The fence may also follow the closed start delimiter:
//! `%% render block: start %%` and then the fenced expression. Everything
//! between the fence and the end delimiter is the output of the block and is
//! replaced every time the block is rendered.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Document text
//!   → Lexer (logos tokens for `%%`, fences, newlines and text)
//!   → Parser (delimiter state machine, yields Blocks lazily)
//!   → Evaluator (evaluates every block concurrently against the backend)
//!   → Planner (composes each block into a search / replace pair)
//!   → Updater (folds the plan into the text and writes back on change)
//! ```
//!
//! ## Key Types
//!
//! - [`Block`]: A parsed region: start marker, expression, output and end
//!   marker.
//! - [`EvaluationBackend`]: The query engine blocks are evaluated against.
//! - [`Renderer`]: Renders editors, single files and whole selectors.
//! - [`LocalBackend`]: A bundled backend for templates, expressions and
//!   shell commands over a project directory.
//! - [`QrenderConfig`]: Configuration loaded from `qrender.toml`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use qrender_core::BatchOptions;
//! use qrender_core::FsFileStore;
//! use qrender_core::LocalBackend;
//! use qrender_core::Renderer;
//!
//! # async fn run() -> qrender_core::RenderResult<()> {
//! let backend = Arc::new(LocalBackend::new("."));
//! let renderer = Renderer::new(backend)?;
//! let store = FsFileStore::new(".");
//! let report = renderer
//! 	.update_from_selector(&store, "**/*.md", BatchOptions::default())
//! 	.await?;
//!
//! for file in report.updated() {
//! 	println!("updated {}", file.path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub use backend::*;
pub use block::*;
pub use config::*;
pub use editor::*;
pub use error::*;
pub use evaluator::*;
pub use local::*;
pub use parser::*;
pub use planner::*;
pub use position::*;
pub use selector::*;
pub use store::*;
pub use updater::*;

mod backend;
mod block;
pub mod config;
mod editor;
#[allow(unused_assignments)]
mod error;
mod evaluator;
pub(crate) mod lexer;
mod local;
mod parser;
pub mod planner;
mod position;
mod selector;
mod store;
mod updater;

#[cfg(test)]
mod __fixtures;
