//! Error types for pdfharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all pdfharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTTP or transport failure while fetching a page or document.
    #[error("fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The browser did not render the expected page structure in time.
    #[error("page load timed out after {}s: {url}", timeout.as_secs_f64())]
    PageLoadTimeout { url: String, timeout: Duration },

    /// A single UI element could not be expanded or scanned.
    #[error("element interaction failed: {message}")]
    ElementInteraction { message: String },

    /// The persisted checkpoint could not be read or parsed.
    #[error("checkpoint at {path:?} is corrupt: {message}")]
    CheckpointCorrupt { path: PathBuf, message: String },

    /// Browser engine failure (launch, CDP transport, navigation).
    #[error("browser error: {0}")]
    Browser(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an element interaction error from any displayable message.
    pub fn interaction(msg: impl Into<String>) -> Self {
        Self::ElementInteraction {
            message: msg.into(),
        }
    }

    /// Create a corrupt-checkpoint error.
    pub fn corrupt(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::CheckpointCorrupt {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the orchestrator can skip past this error and keep running.
    ///
    /// Configuration and browser-engine failures leave nothing useful to do.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::Browser(_))
    }
}
