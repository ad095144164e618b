//! Clipcrop Batch - Parallel batch export
//!
//! This crate turns a set of cropped images and target sizes into a zip
//! archive of encoded exports. Work is expanded into a task cross
//! product, fanned out across worker threads running the fast compositor
//! from `clipcrop-core`, aggregated back in submission order, and
//! packaged with collision-free entry names.

pub mod archive;
pub mod coordinator;
pub mod task;
pub mod worker;

pub use archive::{pack, ArchiveEntry, ArchiveError, EntryNamer};
pub use coordinator::{default_workers, export_batch, run_tasks, BatchError};
pub use task::{build_tasks, BatchImage, BatchResult, BatchTask, TaskError};
pub use worker::WorkerMessage;
