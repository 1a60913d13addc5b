//! Checkpoint inspection.

use std::path::{Path, PathBuf};

use pdfharvest_shared::{Checkpoint, HarvestConfig, Result, category_dir_name, filename_from_url};
use pdfharvest_storage::CheckpointStore;
use tracing::debug;

/// Snapshot of the checkpoint for display.
#[derive(Debug, Clone)]
pub struct CheckpointStatus {
    pub path: PathBuf,
    /// `None` when no checkpoint has been written yet.
    pub checkpoint: Option<Checkpoint>,
    /// Downloaded URLs with no file in any category directory.
    /// Only computed when verification was requested.
    pub missing_files: Option<Vec<String>>,
}

/// Read the checkpoint at the configured path.
///
/// Unlike a harvest run, a corrupt file is reported as an error here.
pub fn checkpoint_status(config: &HarvestConfig, verify: bool) -> Result<CheckpointStatus> {
    let store = CheckpointStore::new(&config.checkpoint_path);
    let checkpoint = store.try_load()?;

    let missing_files = match (&checkpoint, verify) {
        (Some(cp), true) => Some(missing_files(cp, &config.save_root)),
        (None, true) => Some(Vec::new()),
        (_, false) => None,
    };

    Ok(CheckpointStatus {
        path: store.path().to_path_buf(),
        checkpoint,
        missing_files,
    })
}

fn missing_files(checkpoint: &Checkpoint, save_root: &Path) -> Vec<String> {
    let mut dirs: Vec<PathBuf> = checkpoint
        .categories
        .keys()
        .map(|name| save_root.join(category_dir_name(name)))
        .collect();

    // Directories from categories dropped since the file was saved.
    if let Ok(entries) = std::fs::read_dir(save_root) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && !dirs.contains(&path) {
                dirs.push(path);
            }
        }
    }

    debug!(dirs = dirs.len(), "verifying downloaded files");

    checkpoint
        .downloaded
        .iter()
        .filter(|url| {
            let name = filename_from_url(url);
            !dirs.iter().any(|dir| dir.join(name).is_file())
        })
        .cloned()
        .collect()
}
