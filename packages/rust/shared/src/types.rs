//! Core domain types for pdfharvest: categories, the resume checkpoint,
//! and the URL/filename rules shared by discovery, extraction, and fetching.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Current schema version for the checkpoint file format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A named grouping of documents, crawled from one category page.
///
/// Identity is the name; the URL is already absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Trimmed visible text of the category link.
    pub name: String,
    /// Absolute URL of the category page.
    pub landing_url: String,
}

impl Category {
    pub fn new(name: impl Into<String>, landing_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            landing_url: landing_url.into(),
        }
    }
}

/// Categories keyed by name.
pub type CategoryMap = BTreeMap<String, Category>;

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Durable resume state: the category map and every document URL already
/// written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Schema version for forward compatibility.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// When the checkpoint was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Category name to category.
    #[serde(default)]
    pub categories: CategoryMap,
    /// Document URLs already saved. Only ever grows.
    #[serde(default)]
    pub downloaded: BTreeSet<String>,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            updated_at: None,
            categories: CategoryMap::new(),
            downloaded: BTreeSet::new(),
        }
    }
}

impl Checkpoint {
    /// Whether a previous run already resolved the category map.
    pub fn has_categories(&self) -> bool {
        !self.categories.is_empty()
    }

    pub fn is_downloaded(&self, url: &str) -> bool {
        self.downloaded.contains(url)
    }

    /// Record a successfully saved document. Returns `false` if it was already recorded.
    pub fn mark_downloaded(&mut self, url: impl Into<String>) -> bool {
        self.downloaded.insert(url.into())
    }
}

// ---------------------------------------------------------------------------
// URL and filename rules
// ---------------------------------------------------------------------------

/// Resolve an href against the site's base origin.
///
/// Origin-relative hrefs (`/path`) are prefixed with the origin; anything
/// else is returned unchanged.
pub fn resolve_href(base_origin: &str, href: &str) -> String {
    if href.starts_with('/') && !href.starts_with("//") {
        format!("{}{href}", base_origin.trim_end_matches('/'))
    } else {
        href.to_string()
    }
}

/// Resolve an href read from the page at `page_url` to an absolute URL.
///
/// Origin-relative hrefs follow [`resolve_href`]. Document-relative ones
/// (`../x.pdf`, `x.pdf`, `//host/x.pdf`) are joined onto the page URL.
/// Absolute hrefs are returned unchanged.
pub fn resolve_page_href(base_origin: &str, page_url: &str, href: &str) -> String {
    let resolved = resolve_href(base_origin, href);
    if Url::parse(&resolved).is_ok() {
        return resolved;
    }
    match Url::parse(page_url).and_then(|page| page.join(&resolved)) {
        Ok(url) => url.to_string(),
        Err(_) => resolved,
    }
}

/// Whether an href points at a library document.
///
/// Both checks are literal and case-sensitive: `foo.PDF` does not match `.pdf`.
pub fn is_document_href(href: &str, path_marker: &str, suffix: &str) -> bool {
    href.contains(path_marker) && href.ends_with(suffix)
}

/// The local filename for a document: everything after the final `/`.
///
/// Distinct URLs that share a final segment map to the same file.
pub fn filename_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Directory name for a category under the save root.
///
/// Path separators are replaced so a category can never write outside the root.
pub fn category_dir_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
