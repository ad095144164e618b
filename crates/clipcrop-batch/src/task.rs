//! Batch task model.
//!
//! A batch export is the cross product of source images and requested
//! output sizes. Tasks are numbered from 1 in submission order (all sizes
//! of the first image, then the second, and so on) so results can be
//! re-aggregated deterministically after parallel execution.

use clipcrop_core::{ComposeError, ComposedImage, CropRect, ExportOptions, SourceImage};
use std::sync::Arc;
use thiserror::Error;

/// Why a task produced no output.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// The worker thread died before reporting this task's result.
    #[error("Worker terminated before finishing this task")]
    WorkerLost,
}

/// One source image queued for batch export.
#[derive(Debug, Clone)]
pub struct BatchImage {
    /// Human-readable label, used in archive entry names.
    pub label: String,
    pub image: Arc<SourceImage>,
    pub crop: CropRect,
}

/// One unit of batch work: a single image at a single output size.
#[derive(Debug, Clone)]
pub struct BatchTask {
    /// 1-based task id, stable across workers.
    pub id: usize,
    pub label: String,
    pub image: Arc<SourceImage>,
    pub crop: CropRect,
    pub options: ExportOptions,
}

/// The outcome of one task, tagged with its id for re-aggregation.
#[derive(Debug)]
pub struct BatchResult {
    pub id: usize,
    pub label: String,
    /// The requested output size, if any, for archive entry naming.
    pub size: Option<u32>,
    pub output: Result<ComposedImage, TaskError>,
}

impl BatchTask {
    /// The requested output size this task was expanded with.
    pub fn size(&self) -> Option<u32> {
        self.options.out_size
    }
}

impl BatchResult {
    pub fn is_ok(&self) -> bool {
        self.output.is_ok()
    }
}

/// Expand images and sizes into the task cross product.
///
/// An empty size list produces one task per image at the base options'
/// own output size.
pub fn build_tasks(
    images: &[BatchImage],
    sizes: &[u32],
    base_options: &ExportOptions,
) -> Vec<BatchTask> {
    let mut tasks = Vec::with_capacity(images.len() * sizes.len().max(1));
    let mut id = 1;

    for image in images {
        if sizes.is_empty() {
            tasks.push(BatchTask {
                id,
                label: image.label.clone(),
                image: Arc::clone(&image.image),
                crop: image.crop,
                options: base_options.clone(),
            });
            id += 1;
            continue;
        }
        for &size in sizes {
            let mut options = base_options.clone();
            options.out_size = Some(size);
            tasks.push(BatchTask {
                id,
                label: image.label.clone(),
                image: Arc::clone(&image.image),
                crop: image.crop,
                options,
            });
            id += 1;
        }
    }
    tasks
}
