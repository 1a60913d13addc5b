//! Harvest orchestration for pdfharvest.
//!
//! Ties category discovery, browser-driven link extraction, document
//! fetching and checkpointing into one resumable run (`harvest`), plus
//! read-only inspection of a checkpoint (`status`).

pub mod pipeline;
pub mod status;

pub use pipeline::{HarvestReport, ProgressReporter, SilentProgress, discover_categories, harvest};
pub use status::{CheckpointStatus, checkpoint_status};
