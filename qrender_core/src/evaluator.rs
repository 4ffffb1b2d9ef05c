use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::join_all;

use crate::Block;
use crate::EvaluationBackend;
use crate::EvaluationContext;
use crate::Evaluated;
use crate::FormatSettings;
use crate::RenderError;
use crate::RenderResult;

/// Evaluate the expression of `block` and return its new output.
///
/// This never fails. When the backend returns an error or panics, the error
/// is logged and `Error executing query: <message>` becomes the output of
/// this block only.
pub async fn evaluate_block(
	block: &Block,
	backend: &dyn EvaluationBackend,
	context: &EvaluationContext,
	settings: &FormatSettings,
) -> String {
	let evaluation = AssertUnwindSafe(evaluate_raw(block, backend, context, settings))
		.catch_unwind()
		.await
		.unwrap_or_else(|payload| Err(RenderError::Evaluation(panic_message(&*payload))));

	match evaluation {
		Ok(output) => output,
		Err(error) => {
			tracing::error!(
				backend = backend.name(),
				line = block.span.start.line,
				language = %block.language,
				%error,
				"failed to evaluate block"
			);
			failure_output(error)
		}
	}
}

/// Evaluate every block concurrently. Outputs are returned in the order of
/// `blocks`, regardless of the order in which evaluations complete.
pub async fn evaluate_all(
	blocks: &[Block],
	backend: &dyn EvaluationBackend,
	context: &EvaluationContext,
	settings: &FormatSettings,
) -> Vec<String> {
	join_all(
		blocks
			.iter()
			.map(|block| evaluate_block(block, backend, context, settings)),
	)
	.await
}

async fn evaluate_raw(
	block: &Block,
	backend: &dyn EvaluationBackend,
	context: &EvaluationContext,
	settings: &FormatSettings,
) -> RenderResult<String> {
	let output = match backend
		.evaluate(&block.language, &block.expression, context)
		.await?
	{
		Evaluated::Text(text) => text,
		Evaluated::Value(value) => backend.format_value(&value, settings),
	};

	Ok(output.trim().to_string())
}

fn failure_output(error: RenderError) -> String {
	match error {
		RenderError::Evaluation(_) => error.to_string(),
		other => RenderError::Evaluation(other.to_string()).to_string(),
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	payload
		.downcast_ref::<&str>()
		.map(|message| (*message).to_string())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "evaluation panicked".to_string())
}
