//! Batch worker: the per-thread task loop.
//!
//! Each worker receives a pre-partitioned slice of the batch and reports
//! back over a typed channel: one `Progress` message per finished task
//! (success or failure), then a single `Done` carrying the results.
//!
//! Workers run the fast compositor. A task that fails is retried once
//! with a reduced options bag (no feathering, filters, or shadow) before
//! its error is recorded; the batch never aborts on a single bad task.

use crate::task::{BatchResult, BatchTask, TaskError};
use clipcrop_core::{compose_fast, fast_path_dropped_effects, ComposeError, ComposedImage};
use std::sync::mpsc::Sender;
use tracing::{debug, warn};

/// Messages a worker sends back to the coordinator.
#[derive(Debug)]
pub enum WorkerMessage {
    /// One more task finished; counters are worker-local.
    Progress { done: usize, total: usize },
    /// The worker's slice is complete.
    Done { results: Vec<BatchResult> },
}

/// Run a worker over its slice of tasks, reporting through `tx`.
///
/// Sends exactly `tasks.len()` progress messages followed by one `Done`.
/// A dropped receiver stops the worker early.
pub fn run_worker(tasks: Vec<BatchTask>, tx: Sender<WorkerMessage>) {
    let total = tasks.len();
    let mut results = Vec::with_capacity(total);

    for (done, task) in tasks.into_iter().enumerate() {
        let id = task.id;
        let dropped = fast_path_dropped_effects(&task.options);
        if !dropped.is_empty() {
            debug!(task = id, effects = ?dropped, "fast path skips requested effects");
        }
        results.push(execute(task, compose_fast));
        if tx.send(WorkerMessage::Progress { done: done + 1, total }).is_err() {
            debug!(task = id, "coordinator gone, stopping worker");
            return;
        }
    }

    let _ = tx.send(WorkerMessage::Done { results });
}

/// Run one task through the given compositor, retrying once with reduced
/// options on failure.
pub(crate) fn execute(
    task: BatchTask,
    compositor: fn(
        &clipcrop_core::SourceImage,
        &clipcrop_core::CropRect,
        &clipcrop_core::ExportOptions,
    ) -> Result<ComposedImage, ComposeError>,
) -> BatchResult {
    let output = match compositor(&task.image, &task.crop, &task.options) {
        Ok(composed) => Ok(composed),
        Err(first) => {
            warn!(task = task.id, error = %first, "task failed, retrying with reduced options");
            compositor(&task.image, &task.crop, &task.options.reduced()).map_err(|second| {
                warn!(task = task.id, error = %second, "task failed after retry");
                second
            })
        }
    };

    let size = task.size();
    BatchResult {
        id: task.id,
        label: task.label,
        size,
        output: output.map_err(TaskError::from),
    }
}
