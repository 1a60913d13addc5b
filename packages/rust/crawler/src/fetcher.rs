//! Document download and persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pdfharvest_shared::{HarvestError, Result, filename_from_url};
use reqwest::Client;
use tracing::{debug, instrument};

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("pdfharvest/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// A document written to disk.
#[derive(Debug, Clone)]
pub struct SavedDocument {
    /// Source URL.
    pub url: String,
    /// Final file location.
    pub path: PathBuf,
    /// Body size in bytes.
    pub bytes: usize,
}

/// Build the HTTP client shared by discovery and document fetching.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| HarvestError::config(format!("failed to build HTTP client: {e}")))
}

/// GET `url` once and write its body to `target_dir/<last path segment>`.
///
/// Any transport error or non-2xx status is a [`HarvestError::Fetch`]; there
/// is no retry. The body lands in a `.part` file first and is renamed into
/// place, replacing any existing file of the same name.
#[instrument(skip(client, target_dir), fields(dir = %target_dir.display()))]
pub async fn fetch_and_save(client: &Client, url: &str, target_dir: &Path) -> Result<SavedDocument> {
    let filename = filename_from_url(url);
    if matches!(filename, "" | "." | "..") {
        return Err(HarvestError::fetch(url, "URL has no usable filename segment"));
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| HarvestError::fetch(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::fetch(url, format!("HTTP {status}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| HarvestError::fetch(url, format!("body read failed: {e}")))?;

    tokio::fs::create_dir_all(target_dir)
        .await
        .map_err(|e| HarvestError::io(target_dir, e))?;

    let target = target_dir.join(filename);
    let partial = target_dir.join(format!(".{filename}.part"));

    tokio::fs::write(&partial, &body)
        .await
        .map_err(|e| HarvestError::io(&partial, e))?;
    tokio::fs::rename(&partial, &target)
        .await
        .map_err(|e| HarvestError::io(&target, e))?;

    debug!(path = %target.display(), bytes = body.len(), "document saved");

    Ok(SavedDocument {
        url: url.to_string(),
        path: target,
        bytes: body.len(),
    })
}
