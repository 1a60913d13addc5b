//! Browser-driven link extraction and document fetching.
//!
//! This crate provides:
//! - [`browser`]: The [`BrowserSession`] capability and its Chrome implementation
//! - [`extractor`]: Expands category page sections and collects document URLs
//! - [`fetcher`]: Downloads one document into a category directory

pub mod browser;
pub mod extractor;
pub mod fetcher;

pub use browser::{BrowserSession, ChromiumSession, LaunchOptions, find_chrome};
#[cfg(any(test, feature = "test-support"))]
pub use browser::{ScriptedPage, ScriptedSession, SessionEvent};
pub use extractor::extract_document_links;
pub use fetcher::{SavedDocument, build_client, fetch_and_save};
