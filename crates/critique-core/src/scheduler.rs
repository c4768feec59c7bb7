//! Scatter-gather dispatch of per-file review tasks.

use std::future::Future;

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::error;

use crate::plan::FileReviewResult;

/// Dispatch every task immediately and yield results in completion order.
///
/// The stream is finite: exactly one item per dispatched task, then
/// termination. A task that dies outside its own error handling (a panic) is
/// converted into a synthetic `"system"` result instead of being propagated,
/// so one runaway task can never silently stop the gather loop.
pub fn scatter<F>(tasks: Vec<F>) -> impl Stream<Item = FileReviewResult>
where
    F: Future<Output = FileReviewResult> + Send + 'static,
{
    let handles: FuturesUnordered<JoinHandle<FileReviewResult>> =
        tasks.into_iter().map(tokio::spawn).collect();

    handles.map(|joined| match joined {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "review task aborted unexpectedly");
            FileReviewResult::system_error(&format!("Error: {e}"))
        }
    })
}
