//! Category discovery from the repository's landing page.
//!
//! One GET of the landing page, then every anchor whose href contains the
//! configured category marker becomes a [`Category`](pdfharvest_shared::Category).
//! No browser is involved: the landing page renders its category links
//! server-side.

mod parser;

use pdfharvest_shared::{CategoryMap, HarvestError, Result, SiteConfig};
use reqwest::Client;
use tracing::{info, instrument, warn};

/// Fetch the landing page and extract the category map.
///
/// A transport failure is a [`HarvestError::Fetch`]. A non-2xx status is
/// logged and tolerated as long as the body can be read, since error pages
/// on the target site still carry the navigation links. Zero matching anchors
/// yields an empty map, not an error.
#[instrument(skip_all, fields(url = %site.landing_url))]
pub async fn discover(client: &Client, site: &SiteConfig) -> Result<CategoryMap> {
    let url = site.landing_url.as_str();
    info!("discovering categories");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| HarvestError::fetch(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "landing page returned non-success status, parsing anyway");
    }

    let body = response
        .text()
        .await
        .map_err(|e| HarvestError::fetch(url, format!("failed to read body: {e}")))?;

    let categories = parser::parse_categories(&body, &site.base_origin, &site.category_marker);

    if categories.is_empty() {
        warn!(marker = %site.category_marker, "no category links found on landing page");
    } else {
        info!(count = categories.len(), "categories discovered");
    }

    Ok(categories)
}
