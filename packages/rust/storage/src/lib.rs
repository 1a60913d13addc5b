//! JSON checkpoint storage.
//!
//! The [`CheckpointStore`] persists the category map and the set of
//! downloaded document URLs to a single file.
//!
//! **Durability rules:**
//! - `save` writes a sibling temp file, syncs it, then renames it over the
//!   target, so a crash mid-write leaves the previous checkpoint intact.
//! - `load` never fails: a missing or unreadable file is an empty checkpoint.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use pdfharvest_shared::{CURRENT_SCHEMA_VERSION, Checkpoint, HarvestError, Result};
use tracing::{debug, warn};

/// File-backed checkpoint handle.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint, falling back to an empty one.
    ///
    /// Corruption is logged and otherwise treated as "no checkpoint".
    pub fn load(&self) -> Checkpoint {
        match self.try_load() {
            Ok(Some(checkpoint)) => {
                debug!(
                    path = %self.path.display(),
                    categories = checkpoint.categories.len(),
                    downloaded = checkpoint.downloaded.len(),
                    "checkpoint loaded"
                );
                checkpoint
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no checkpoint found, starting fresh");
                Checkpoint::default()
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable checkpoint, starting fresh");
                Checkpoint::default()
            }
        }
    }

    /// Read the checkpoint, surfacing corruption as [`HarvestError::CheckpointCorrupt`].
    ///
    /// Returns `Ok(None)` when no checkpoint file exists.
    pub fn try_load(&self) -> Result<Option<Checkpoint>> {
        let content = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HarvestError::corrupt(&self.path, e.to_string())),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&content)
            .map_err(|e| HarvestError::corrupt(&self.path, e.to_string()))?;

        if checkpoint.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(HarvestError::corrupt(
                &self.path,
                format!(
                    "unsupported schema_version {} (expected {CURRENT_SCHEMA_VERSION})",
                    checkpoint.schema_version
                ),
            ));
        }

        Ok(Some(checkpoint))
    }

    /// Persist the full checkpoint via write-to-temp-then-rename.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut snapshot = checkpoint.clone();
        snapshot.schema_version = CURRENT_SCHEMA_VERSION;
        snapshot.updated_at = Some(Utc::now());

        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| HarvestError::corrupt(&self.path, format!("serialization failed: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
        }

        let temp = self.temp_path();
        {
            let mut file = File::create(&temp).map_err(|e| HarvestError::io(&temp, e))?;
            file.write_all(&json).map_err(|e| HarvestError::io(&temp, e))?;
            file.sync_all().map_err(|e| HarvestError::io(&temp, e))?;
        }

        std::fs::rename(&temp, &self.path).map_err(|e| HarvestError::io(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            downloaded = snapshot.downloaded.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// `.<name>.tmp` next to the checkpoint, so the rename never crosses filesystems.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".into());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}
