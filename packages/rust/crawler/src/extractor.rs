//! Document link extraction from a category page.
//!
//! Document rows only exist in the DOM once their section header has been
//! clicked, so extraction is: navigate, wait for the page, then expand every
//! header and scan the rows it reveals.

use std::collections::BTreeSet;

use pdfharvest_shared::{ExtractConfig, HarvestError, Result, is_document_href, resolve_page_href};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::browser::BrowserSession;

/// Collect every document URL reachable from the category page at `category_url`.
///
/// Fails with [`HarvestError::PageLoadTimeout`] if the page never renders.
/// A section header that cannot be expanded or scanned is logged and
/// skipped; the remaining headers are still processed. Losing the browser
/// itself is never skipped.
#[instrument(skip_all, fields(url = %category_url))]
pub async fn extract_document_links<S: BrowserSession>(
    session: &mut S,
    category_url: &str,
    config: &ExtractConfig,
) -> Result<BTreeSet<String>> {
    session.navigate(category_url).await?;

    // The site answers 400 once accumulated cookies overflow its header limit.
    match session.clear_cookies().await {
        Ok(()) => {}
        Err(e) if !e.is_recoverable() => return Err(e),
        Err(e) => warn!(error = %e, "failed to clear cookies, continuing"),
    }

    wait_for_page(session, category_url, config).await?;

    let headers = session.find_by_text(&config.expand_text).await?;
    info!(sections = headers.len(), "expanding sections");

    let mut links = BTreeSet::new();
    for (index, header) in headers.iter().enumerate() {
        match expand_and_scan(session, header, config).await {
            Ok(hrefs) => {
                let before = links.len();
                links.extend(accept_hrefs(hrefs, category_url, config));
                debug!(section = index, new_links = links.len() - before, "section scanned");
            }
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => {
                warn!(section = index, error = %e, "skipping section");
            }
        }
    }

    info!(documents = links.len(), "extraction complete");
    Ok(links)
}

/// Poll until the ready tag appears or the page wait times out.
async fn wait_for_page<S: BrowserSession>(
    session: &mut S,
    url: &str,
    config: &ExtractConfig,
) -> Result<()> {
    let deadline = Instant::now() + config.page_wait_timeout;
    loop {
        match session.element_present(&config.ready_tag).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => debug!(error = %e, "page not queryable yet"),
        }

        if Instant::now() >= deadline {
            return Err(HarvestError::PageLoadTimeout {
                url: url.to_string(),
                timeout: config.page_wait_timeout,
            });
        }
        sleep(config.poll_interval).await;
    }
}

/// Expand one section header and return the row hrefs visible afterwards.
///
/// Order matters: scroll settles before the click, and rows are scanned
/// only after the click has had a chance to render.
async fn expand_and_scan<S: BrowserSession>(
    session: &mut S,
    header: &S::Element,
    config: &ExtractConfig,
) -> Result<Vec<String>> {
    session.scroll_into_view(header).await?;
    sleep(config.scroll_settle).await;

    let rows_before = session.anchor_hrefs(&config.document_row_class).await?.len();
    session.pointer_click(header).await?;

    wait_for_new_rows(session, config, rows_before).await
}

/// Rescan rows until more than `rows_before` are visible or the expand
/// timeout passes. Returns the last scan either way.
async fn wait_for_new_rows<S: BrowserSession>(
    session: &mut S,
    config: &ExtractConfig,
    rows_before: usize,
) -> Result<Vec<String>> {
    let deadline = Instant::now() + config.expand_timeout;
    loop {
        let hrefs = session.anchor_hrefs(&config.document_row_class).await?;
        if hrefs.len() > rows_before {
            return Ok(hrefs);
        }
        if Instant::now() >= deadline {
            debug!(rows = hrefs.len(), "no new rows after expansion");
            return Ok(hrefs);
        }
        sleep(config.poll_interval).await;
    }
}

/// Keep document hrefs, resolved to absolute URLs against the page they came from.
fn accept_hrefs(hrefs: Vec<String>, page_url: &str, config: &ExtractConfig) -> Vec<String> {
    hrefs
        .into_iter()
        .filter(|href| {
            is_document_href(href, &config.document_path_marker, &config.document_suffix)
        })
        .map(|href| resolve_page_href(&config.base_origin, page_url, &href))
        .collect()
}
