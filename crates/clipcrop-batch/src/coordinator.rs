//! Batch coordinator: fan out tasks, aggregate results, package the zip.
//!
//! Tasks are partitioned round-robin across worker threads and executed
//! with the fast compositor; the coordinator drains a shared channel,
//! reporting monotonic overall progress as workers finish tasks in any
//! order. With `workers == 0` the whole batch runs sequentially on the
//! caller's thread through the full compositor instead, trading speed for
//! complete effect fidelity.

use crate::archive::{pack, ArchiveEntry, ArchiveError, EntryNamer};
use crate::task::{build_tasks, BatchImage, BatchResult, BatchTask, TaskError};
use crate::worker::{execute, run_worker, WorkerMessage};
use clipcrop_core::{compose, ExportOptions};
use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can fail an entire batch export.
#[derive(Debug, Error)]
pub enum BatchError {
    /// No images or sizes were supplied
    #[error("Nothing to export")]
    NothingToExport,

    /// Every task in the batch failed
    #[error("All {0} tasks failed")]
    AllTasksFailed(usize),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// A reasonable worker count for the current machine.
pub fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Execute a prepared task list and return results ordered by task id.
///
/// `progress` is invoked with `(done, total)` after every finished task,
/// counting failures as done; `done` only ever increases. Failed tasks
/// are recorded in their result, never propagated as a panic or an early
/// return.
pub fn run_tasks(
    tasks: Vec<BatchTask>,
    workers: usize,
    mut progress: impl FnMut(usize, usize),
) -> Vec<BatchResult> {
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }

    // Sequential fallback: full-fidelity compositor on the caller's thread
    if workers == 0 {
        debug!(total, "running batch sequentially with the full compositor");
        let mut results = Vec::with_capacity(total);
        for (done, task) in tasks.into_iter().enumerate() {
            results.push(execute(task, compose));
            progress(done + 1, total);
        }
        return results;
    }

    let workers = workers.min(total);
    let expected: Vec<(usize, String, Option<u32>)> = tasks
        .iter()
        .map(|t| (t.id, t.label.clone(), t.size()))
        .collect();
    let mut slices: Vec<Vec<BatchTask>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, task) in tasks.into_iter().enumerate() {
        slices[i % workers].push(task);
    }

    let mut results = Vec::with_capacity(total);
    let (tx, rx) = mpsc::channel();
    let mut done = 0;

    thread::scope(|scope| {
        let handles: Vec<_> = slices
            .into_iter()
            .map(|slice| {
                let tx = tx.clone();
                scope.spawn(move || run_worker(slice, tx))
            })
            .collect();
        drop(tx);

        for message in rx {
            match message {
                WorkerMessage::Progress { .. } => {
                    done += 1;
                    progress(done, total);
                }
                WorkerMessage::Done {
                    results: worker_results,
                } => results.extend(worker_results),
            }
        }

        // Joining here keeps a worker panic from propagating out of the
        // scope; its tasks are recorded as lost below.
        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread panicked, marking its unreported tasks failed");
            }
        }
    });

    let reported: HashSet<usize> = results.iter().map(|r| r.id).collect();
    for (id, label, size) in expected {
        if !reported.contains(&id) {
            results.push(BatchResult {
                id,
                label,
                size,
                output: Err(TaskError::WorkerLost),
            });
            if done < total {
                done += 1;
                progress(done, total);
            }
        }
    }

    results.sort_by_key(|r| r.id);
    results
}

/// Export every image at every size and package the results as a zip.
///
/// Failed tasks are logged and skipped; the archive contains whatever
/// succeeded. The batch as a whole fails only when there was nothing to
/// do, when every task failed, or when the archive cannot be written.
pub fn export_batch(
    images: &[BatchImage],
    sizes: &[u32],
    options: &ExportOptions,
    prefix: &str,
    workers: usize,
    progress: impl FnMut(usize, usize),
) -> Result<Vec<u8>, BatchError> {
    let tasks = build_tasks(images, sizes, options);
    if tasks.is_empty() {
        return Err(BatchError::NothingToExport);
    }
    let total = tasks.len();
    info!(total, workers, "starting batch export");

    let results = run_tasks(tasks, workers, progress);

    let mut namer = EntryNamer::new();
    let mut entries = Vec::with_capacity(results.len());
    let mut failures = 0;
    for result in results {
        match result.output {
            Ok(composed) => {
                let name = namer.name(prefix, &result.label, result.size, composed.format.extension());
                entries.push(ArchiveEntry {
                    name,
                    bytes: composed.bytes,
                });
            }
            Err(error) => {
                failures += 1;
                warn!(task = result.id, label = %result.label, %error, "task excluded from archive");
            }
        }
    }

    if entries.is_empty() {
        return Err(BatchError::AllTasksFailed(total));
    }
    info!(
        archived = entries.len(),
        failures, "batch export complete"
    );
    Ok(pack(&entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipcrop_core::{CropRect, MaskShape, OutputFormat, SourceImage};
    use std::io::Cursor;
    use std::sync::Arc;
    use zip::ZipArchive;

    fn images(count: usize) -> Vec<BatchImage> {
        (0..count)
            .map(|i| BatchImage {
                label: format!("img{i}"),
                image: Arc::new(SourceImage::solid(24, 24, [200, 50, 50, 255])),
                crop: CropRect::new(2.0, 2.0, 20.0, 20.0),
            })
            .collect()
    }

    fn archive_names(bytes: Vec<u8>) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_batch_produces_every_combination() {
        let bytes = export_batch(
            &images(3),
            &[16, 32],
            &ExportOptions::default(),
            "batch",
            2,
            |_, _| {},
        )
        .unwrap();

        let names = archive_names(bytes);
        assert_eq!(names.len(), 6);
        assert!(names
            .iter()
            .any(|n| n.starts_with("batch-img0-16-") && n.ends_with(".png")));
        assert!(names
            .iter()
            .any(|n| n.starts_with("batch-img2-32-") && n.ends_with(".png")));
    }

    #[test]
    fn test_archive_names_are_distinct() {
        // Two images with the same label still get distinct entries
        let mut imgs = images(2);
        imgs[1].label = "img0".to_string();

        let bytes = export_batch(
            &imgs,
            &[16],
            &ExportOptions::default(),
            "x",
            1,
            |_, _| {},
        )
        .unwrap();

        let names = archive_names(bytes);
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
        assert!(names.iter().all(|n| n.starts_with("x-img0-16-")));
    }

    #[test]
    fn test_jpeg_entries_use_jpg_extension() {
        let mut opts = ExportOptions::default();
        opts.format = OutputFormat::Jpeg;

        let bytes = export_batch(&images(1), &[16], &opts, "p", 1, |_, _| {}).unwrap();
        let names = archive_names(bytes);
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("p-img0-16-") && names[0].ends_with(".jpg"));
    }

    #[test]
    fn test_shaped_jpeg_batch_lands_as_png() {
        let mut opts = ExportOptions::default();
        opts.format = OutputFormat::Jpeg;
        opts.mask = MaskShape::Circle;

        let bytes = export_batch(&images(1), &[16], &opts, "p", 1, |_, _| {}).unwrap();
        let names = archive_names(bytes);
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("p-img0-16-") && names[0].ends_with(".png"));
    }

    #[test]
    fn test_progress_is_monotonic_and_complete() {
        let mut seen = Vec::new();
        export_batch(
            &images(2),
            &[16, 24, 32],
            &ExportOptions::default(),
            "p",
            3,
            |done, total| seen.push((done, total)),
        )
        .unwrap();

        assert_eq!(seen.len(), 6);
        assert!(seen.windows(2).all(|w| w[1].0 == w[0].0 + 1));
        assert_eq!(*seen.last().unwrap(), (6, 6));
        assert!(seen.iter().all(|&(_, total)| total == 6));
    }

    #[test]
    fn test_partial_failure_archives_the_rest() {
        let mut imgs = images(3);
        // An empty crop fails validation on both attempts
        imgs[1].crop = CropRect::new(0.0, 0.0, 0.0, 0.0);

        let mut seen = 0;
        let bytes = export_batch(
            &imgs,
            &[16, 32],
            &ExportOptions::default(),
            "p",
            2,
            |_, _| seen += 1,
        )
        .unwrap();

        // Failed tasks still count toward progress
        assert_eq!(seen, 6);
        assert_eq!(archive_names(bytes).len(), 4);
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        let result = export_batch(&[], &[16], &ExportOptions::default(), "p", 1, |_, _| {});
        assert!(matches!(result, Err(BatchError::NothingToExport)));
    }

    #[test]
    fn test_all_failures_is_an_error() {
        let mut imgs = images(1);
        imgs[0].crop = CropRect::new(0.0, 0.0, -1.0, -1.0);

        let result = export_batch(&imgs, &[16], &ExportOptions::default(), "p", 1, |_, _| {});
        assert!(matches!(result, Err(BatchError::AllTasksFailed(1))));
    }

    #[test]
    fn test_sequential_fallback_matches_parallel_output() {
        let imgs = images(2);
        let opts = ExportOptions::default();

        let parallel = export_batch(&imgs, &[16, 32], &opts, "p", 4, |_, _| {}).unwrap();
        let sequential = export_batch(&imgs, &[16, 32], &opts, "p", 0, |_, _| {}).unwrap();

        // Same entries either way once the per-run id is stripped; the
        // fallback uses the full compositor, which agrees with the fast
        // path when no effects are requested
        fn without_run(names: Vec<String>) -> Vec<String> {
            names
                .into_iter()
                .map(|n| {
                    let (stem, ext) = n.rsplit_once('.').unwrap();
                    let (head, _) = stem.rsplit_once('-').unwrap();
                    format!("{head}.{ext}")
                })
                .collect()
        }
        assert_eq!(
            without_run(archive_names(parallel)),
            without_run(archive_names(sequential))
        );
    }

    #[test]
    fn test_run_tasks_orders_results_by_id() {
        let tasks = build_tasks(&images(4), &[16, 32], &ExportOptions::default());
        let results = run_tasks(tasks, 3, |_, _| {});
        let ids: Vec<usize> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<usize>>());
    }

    #[test]
    fn test_worker_panic_marks_tasks_failed() {
        let mut tasks = build_tasks(&images(2), &[16], &ExportOptions::default());
        // An undersized pixel buffer makes the blit panic inside the worker
        tasks[0].image = Arc::new(SourceImage {
            width: 24,
            height: 24,
            pixels: vec![0; 16],
        });

        let mut seen = Vec::new();
        let results = run_tasks(tasks, 2, |done, total| seen.push((done, total)));

        assert_eq!(results.len(), 2);
        assert!(!results[0].is_ok(), "lost task is recorded as failed");
        assert!(results[1].is_ok(), "other worker's task still succeeds");
        assert_eq!(*seen.last().unwrap(), (2, 2));
        assert!(seen.windows(2).all(|w| w[1].0 == w[0].0 + 1));
    }

    #[test]
    fn test_more_workers_than_tasks() {
        let tasks = build_tasks(&images(1), &[16], &ExportOptions::default());
        let results = run_tasks(tasks, 16, |_, _| {});
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }
}
