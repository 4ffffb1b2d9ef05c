use derive_more::Deref;
use derive_more::DerefMut;

use crate::EvaluationBackend;
use crate::EvaluationContext;
use crate::FormatSettings;
use crate::Markers;
use crate::RenderError;
use crate::RenderResult;
use crate::contains_delimiter;
use crate::evaluate_all;
use crate::parse_blocks;

/// A literal search and replace pair for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacer {
	/// The original text of the block.
	pub search: String,
	/// The recomposed text of the block.
	pub replace: String,
}

impl Replacer {
	pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
		Self {
			search: search.into(),
			replace: replace.into(),
		}
	}

	pub fn is_noop(&self) -> bool {
		self.search == self.replace
	}
}

/// Replacers for every block of a document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct Plan(Vec<Replacer>);

impl Plan {
	pub fn new(replacers: Vec<Replacer>) -> Self {
		Self(replacers)
	}

	/// Number of replacers whose text actually changes.
	pub fn changes(&self) -> usize {
		self.0.iter().filter(|replacer| !replacer.is_noop()).count()
	}

	pub fn into_inner(self) -> Vec<Replacer> {
		self.0
	}
}

impl FromIterator<Replacer> for Plan {
	fn from_iter<T: IntoIterator<Item = Replacer>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Build the replacement plan for `text`.
///
/// Fails when any block is malformed. Evaluation failures do not fail the
/// plan; they become the output of the failing block. Output that contains a
/// block delimiter is treated as an evaluation failure.
pub async fn plan(
	text: &str,
	markers: &Markers,
	backend: &dyn EvaluationBackend,
	context: &EvaluationContext,
	settings: &FormatSettings,
) -> RenderResult<Plan> {
	let blocks = parse_blocks(text, markers)?;

	if blocks.is_empty() {
		return Ok(Plan::default());
	}

	let outputs = evaluate_all(&blocks, backend, context, settings).await;
	let plan: Plan = blocks
		.iter()
		.zip(outputs)
		.map(|(block, output)| {
			let output = if contains_delimiter(&output, markers) {
				tracing::warn!(line = block.span.start.line, "output contains a block delimiter");
				RenderError::Evaluation("output contains a block delimiter".to_string()).to_string()
			} else {
				output
			};

			Replacer::new(&block.content, block.with_output(output).content)
		})
		.collect();

	tracing::debug!(
		blocks = plan.len(),
		changes = plan.changes(),
		file = ?context.file(),
		"planned block replacements"
	);

	Ok(plan)
}
