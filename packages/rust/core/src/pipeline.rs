//! End-to-end harvest pipeline:
//! checkpoint → categories → extract links → download → checkpoint.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};

use pdfharvest_crawler::{BrowserSession, build_client, extract_document_links, fetch_and_save};
use pdfharvest_shared::{
    Category, CategoryMap, Checkpoint, HarvestConfig, Result, category_dir_name,
    filename_from_url,
};
use pdfharvest_storage::CheckpointStore;

/// Result of one harvest run.
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    /// Categories selected for this run.
    pub categories_total: usize,
    /// Categories whose links were extracted.
    pub categories_processed: usize,
    /// Skipped categories (name, cause).
    pub categories_failed: Vec<(String, String)>,
    /// Document links extracted across all categories.
    pub documents_found: usize,
    /// Documents saved during this run.
    pub documents_downloaded: usize,
    /// Links skipped because an earlier run already saved them.
    pub documents_already_present: usize,
    /// Failed downloads (URL, cause). These are retried on the next run.
    pub documents_failed: Vec<(String, String)>,
    /// Whether the category map was reused from the checkpoint.
    pub categories_from_checkpoint: bool,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl HarvestReport {
    /// True when nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.categories_failed.is_empty() && self.documents_failed.is_empty()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a category's page is opened.
    fn category_started(&self, name: &str, current: usize, total: usize);
    /// Called after each document is written.
    fn document_saved(&self, filename: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &HarvestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn category_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn document_saved(&self, _filename: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &HarvestReport) {}
}

/// Run the full harvest on an already-launched browser session.
///
/// The session is closed before returning, whether the run succeeded or not.
/// Category and document failures are recorded in the report; only errors
/// that leave nothing to continue with (a dead browser, a failed category
/// discovery) are returned.
#[instrument(skip_all, fields(origin = %config.site.base_origin))]
pub async fn harvest<S: BrowserSession>(
    config: &HarvestConfig,
    session: &mut S,
    progress: &dyn ProgressReporter,
) -> Result<HarvestReport> {
    let outcome = run(config, session, progress).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close browser session");
    }

    match &outcome {
        Ok(report) => {
            progress.done(report);
            info!(
                categories = report.categories_processed,
                categories_failed = report.categories_failed.len(),
                downloaded = report.documents_downloaded,
                already_present = report.documents_already_present,
                failed = report.documents_failed.len(),
                elapsed_ms = report.elapsed.as_millis(),
                "harvest complete"
            );
        }
        Err(e) => error!(error = %e, "harvest aborted"),
    }

    outcome
}

/// Fetch the landing page and return its categories, without a browser.
pub async fn discover_categories(config: &HarvestConfig) -> Result<CategoryMap> {
    let client = build_client(config.http_timeout)?;
    pdfharvest_discovery::discover(&client, &config.site).await
}

async fn run<S: BrowserSession>(
    config: &HarvestConfig,
    session: &mut S,
    progress: &dyn ProgressReporter,
) -> Result<HarvestReport> {
    let start = Instant::now();
    let client = build_client(config.http_timeout)?;
    let store = CheckpointStore::new(&config.checkpoint_path);

    // --- Phase 1: Resolve categories ---
    progress.phase("Loading checkpoint");
    let mut checkpoint = store.load();
    let from_checkpoint = checkpoint.has_categories();

    if from_checkpoint {
        info!(
            categories = checkpoint.categories.len(),
            downloaded = checkpoint.downloaded.len(),
            "resuming with categories from checkpoint"
        );
    } else {
        progress.phase("Discovering categories");
        checkpoint.categories = pdfharvest_discovery::discover(&client, &config.site).await?;
        if let Err(e) = store.save(&checkpoint) {
            error!(error = %e, "failed to persist discovered categories");
        }
    }

    let categories = select_categories(&checkpoint.categories, &config.only_categories);

    let mut report = HarvestReport {
        categories_total: categories.len(),
        categories_from_checkpoint: from_checkpoint,
        ..HarvestReport::default()
    };

    if categories.is_empty() {
        warn!("no categories to process");
    }

    // --- Phase 2: Per category ---
    let total = categories.len();
    for (i, category) in categories.iter().enumerate() {
        progress.category_started(&category.name, i + 1, total);
        process_category(
            config,
            session,
            &client,
            &store,
            &mut checkpoint,
            category,
            &mut report,
            progress,
        )
        .await?;
    }

    report.elapsed = start.elapsed();
    Ok(report)
}

/// Apply the optional name filter. Unknown names are logged.
fn select_categories(all: &CategoryMap, only: &[String]) -> Vec<Category> {
    if only.is_empty() {
        return all.values().cloned().collect();
    }

    for name in only {
        if !all.contains_key(name) {
            warn!(category = %name, "requested category not found");
        }
    }

    all.values()
        .filter(|c| only.iter().any(|n| n == &c.name))
        .cloned()
        .collect()
}

/// Extract and download one category.
///
/// Returns `Err` only for failures that make the rest of the run pointless.
#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, fields(category = %category.name))]
async fn process_category<S: BrowserSession>(
    config: &HarvestConfig,
    session: &mut S,
    client: &Client,
    store: &CheckpointStore,
    checkpoint: &mut Checkpoint,
    category: &Category,
    report: &mut HarvestReport,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let dir = config.save_root.join(category_dir_name(&category.name));
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), error = %e, "cannot create category directory, skipping");
        report
            .categories_failed
            .push((category.name.clone(), e.to_string()));
        return Ok(());
    }

    let links =
        match extract_document_links(session, &category.landing_url, &config.extract).await {
            Ok(links) => links,
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => {
                warn!(error = %e, "skipping category");
                report
                    .categories_failed
                    .push((category.name.clone(), e.to_string()));
                return Ok(());
            }
        };

    report.categories_processed += 1;
    report.documents_found += links.len();

    let pending: Vec<&String> = links
        .iter()
        .filter(|url| !checkpoint.is_downloaded(url))
        .collect();
    report.documents_already_present += links.len() - pending.len();

    debug!(found = links.len(), pending = pending.len(), "links resolved");

    for (i, url) in pending.iter().enumerate() {
        match fetch_and_save(client, url, &dir).await {
            Ok(saved) => {
                checkpoint.mark_downloaded(url.as_str());
                if let Err(e) = store.save(checkpoint) {
                    error!(error = %e, "failed to persist checkpoint");
                }
                report.documents_downloaded += 1;
                progress.document_saved(filename_from_url(url), i + 1, pending.len());
                info!(url = %url, path = %saved.path.display(), bytes = saved.bytes, "downloaded");
            }
            Err(e) => {
                warn!(url = %url, error = %e, "download failed, will retry on next run");
                report.documents_failed.push((url.to_string(), e.to_string()));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfharvest_crawler::{ScriptedPage, ScriptedSession};
    use pdfharvest_shared::{AppConfig, HarvestError};
    use std::path::{Path, PathBuf};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LANDING: &str = r#"<html><body><div>
        <a href="/Lib/Forms/Alpha.aspx">Alpha</a>
        <a href="/Lib/Forms/Beta.aspx">Beta</a>
        <a href="/Lib/Forms/Gamma.aspx">Gamma</a>
        <a href="/Pages/About.aspx">About</a>
    </div></body></html>"#;

    struct Site {
        server: MockServer,
        root: PathBuf,
    }

    impl Site {
        async fn start() -> Self {
            let server = MockServer::start().await;
            let root =
                std::env::temp_dir().join(format!("pdfharvest-pipeline-test-{}", Uuid::now_v7()));
            Self { server, root }
        }

        fn url(&self, p: &str) -> String {
            format!("{}{p}", self.server.uri())
        }

        fn config(&self) -> HarvestConfig {
            let mut app = AppConfig::default();
            app.site.base_origin = self.server.uri();
            app.storage.save_root = self.root.join("out").to_string_lossy().into_owned();
            app.storage.checkpoint_path =
                self.root.join("checkpoint.json").to_string_lossy().into_owned();
            app.extract.scroll_settle_ms = 0;
            app.extract.expand_timeout_ms = 20;
            app.extract.poll_interval_ms = 5;

            let mut config = HarvestConfig::try_from(&app).unwrap();
            config.extract.page_wait_timeout = Duration::from_millis(50);
            config
        }

        async fn landing(&self, body: &str, times: u64) {
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(times)
                .mount(&self.server)
                .await;
        }

        async fn document(&self, p: &str, times: u64) {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(p.as_bytes().to_vec()))
                .expect(times)
                .mount(&self.server)
                .await;
        }

        fn session(&self) -> ScriptedSession {
            ScriptedSession::new()
                .page(
                    self.url("/Lib/Forms/Alpha.aspx"),
                    ScriptedPage::new()
                        .section("Title: 1990s", ["/Content%20Library/a1.pdf"])
                        .section("Title: 2000s", ["/Content%20Library/a2.pdf", "/Other/x.pdf"]),
                )
                .page(
                    self.url("/Lib/Forms/Beta.aspx"),
                    ScriptedPage::new().section("Title", ["/Content%20Library/b1.pdf"]),
                )
                .page(
                    self.url("/Lib/Forms/Gamma.aspx"),
                    ScriptedPage::new().section("Title", ["/Content%20Library/g1.pdf"]),
                )
        }

        fn checkpoint(&self) -> Checkpoint {
            CheckpointStore::new(self.root.join("checkpoint.json")).load()
        }

        fn file(&self, category: &str, name: &str) -> PathBuf {
            self.root.join("out").join(category).join(name)
        }
    }

    impl Drop for Site {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    fn exists(p: &Path) -> bool {
        p.is_file()
    }

    #[tokio::test]
    async fn downloads_everything_then_resumes_without_refetching() {
        let site = Site::start().await;
        // Second run must reuse checkpointed categories: landing fetched once.
        site.landing(LANDING, 1).await;
        for doc in ["a1", "a2", "b1", "g1"] {
            site.document(&format!("/Content%20Library/{doc}.pdf"), 1).await;
        }
        let config = site.config();

        let mut session = site.session();
        let first = harvest(&config, &mut session, &SilentProgress).await.unwrap();

        assert!(session.is_closed());
        assert!(!first.categories_from_checkpoint);
        assert_eq!(first.categories_total, 3);
        assert_eq!(first.documents_downloaded, 4);
        assert!(first.is_clean());
        assert!(exists(&site.file("Alpha", "a1.pdf")));
        assert!(exists(&site.file("Alpha", "a2.pdf")));
        assert!(exists(&site.file("Beta", "b1.pdf")));
        assert!(exists(&site.file("Gamma", "g1.pdf")));

        let mut session = site.session();
        let second = harvest(&config, &mut session, &SilentProgress).await.unwrap();

        assert!(second.categories_from_checkpoint);
        assert_eq!(second.documents_downloaded, 0);
        assert_eq!(second.documents_already_present, 4);

        let cp = site.checkpoint();
        assert_eq!(cp.categories.len(), 3);
        assert_eq!(cp.downloaded.len(), 4);
        // Mock expectations (each document exactly once) are verified on drop.
    }

    #[tokio::test]
    async fn failing_category_does_not_affect_others() {
        let site = Site::start().await;
        site.landing(LANDING, 1).await;
        site.document("/Content%20Library/a1.pdf", 1).await;
        site.document("/Content%20Library/a2.pdf", 1).await;
        site.document("/Content%20Library/b1.pdf", 0).await;
        site.document("/Content%20Library/g1.pdf", 1).await;

        let mut session = site
            .session()
            .page(site.url("/Lib/Forms/Beta.aspx"), ScriptedPage::never_ready());

        let report = harvest(&site.config(), &mut session, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.categories_processed, 2);
        assert_eq!(report.categories_failed.len(), 1);
        assert_eq!(report.categories_failed[0].0, "Beta");
        assert!(report.categories_failed[0].1.contains("timed out"));
        assert!(exists(&site.file("Alpha", "a1.pdf")));
        assert!(exists(&site.file("Gamma", "g1.pdf")));
        assert!(!exists(&site.file("Beta", "b1.pdf")));
    }

    #[tokio::test]
    async fn failed_download_is_retried_next_run() {
        let site = Site::start().await;
        site.landing(LANDING, 1).await;
        for doc in ["a1", "b1", "g1"] {
            site.document(&format!("/Content%20Library/{doc}.pdf"), 1).await;
        }
        // a2 fails once, then succeeds.
        Mock::given(path("/Content%20Library/a2.pdf"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&site.server)
            .await;
        site.document("/Content%20Library/a2.pdf", 1).await;

        let config = site.config();

        let mut session = site.session();
        let first = harvest(&config, &mut session, &SilentProgress).await.unwrap();
        assert_eq!(first.documents_downloaded, 3);
        assert_eq!(first.documents_failed.len(), 1);
        assert!(first.documents_failed[0].0.ends_with("/Content%20Library/a2.pdf"));
        assert!(!site.checkpoint().downloaded.iter().any(|u| u.ends_with("a2.pdf")));

        let mut session = site.session();
        let second = harvest(&config, &mut session, &SilentProgress).await.unwrap();
        assert_eq!(second.documents_downloaded, 1);
        assert_eq!(site.checkpoint().downloaded.len(), 4);
        assert!(exists(&site.file("Alpha", "a2.pdf")));
    }

    #[tokio::test]
    async fn zero_categories_exits_cleanly() {
        let site = Site::start().await;
        site.landing("<html><body><p>Nothing here</p></body></html>", 1)
            .await;

        let mut session = site.session();
        let report = harvest(&site.config(), &mut session, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.categories_total, 0);
        assert_eq!(report.documents_found, 0);
        assert!(session.is_closed());
        assert!(session.visited().is_empty());
    }

    #[tokio::test]
    async fn browser_crash_aborts_but_closes_session() {
        let site = Site::start().await;
        site.landing(LANDING, 1).await;
        site.document("/Content%20Library/a1.pdf", 1).await;
        site.document("/Content%20Library/a2.pdf", 1).await;

        let mut session = site.session().crash_on(site.url("/Lib/Forms/Beta.aspx"));
        let err = harvest(&site.config(), &mut session, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Browser(_)));
        assert!(session.is_closed());
        // Alpha finished before the crash and is checkpointed.
        assert_eq!(site.checkpoint().downloaded.len(), 2);
    }

    #[tokio::test]
    async fn browser_lost_mid_category_aborts_run() {
        let site = Site::start().await;
        site.landing(LANDING, 1).await;
        site.document("/Content%20Library/a1.pdf", 1).await;
        site.document("/Content%20Library/a2.pdf", 1).await;
        site.document("/Content%20Library/g1.pdf", 0).await;

        let mut session = site.session().page(
            site.url("/Lib/Forms/Beta.aspx"),
            ScriptedPage::new().dead_section("Title"),
        );
        let err = harvest(&site.config(), &mut session, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Browser(_)));
        assert!(session.is_closed());
        assert!(!session.visited().contains(&site.url("/Lib/Forms/Gamma.aspx").as_str()));
    }

    #[tokio::test]
    async fn only_selected_categories_are_processed() {
        let site = Site::start().await;
        site.landing(LANDING, 1).await;
        site.document("/Content%20Library/g1.pdf", 1).await;

        let mut config = site.config();
        config.only_categories = vec!["Gamma".into(), "Delta".into()];

        let mut session = site.session();
        let report = harvest(&config, &mut session, &SilentProgress).await.unwrap();

        assert_eq!(report.categories_total, 1);
        assert_eq!(session.visited(), vec![site.url("/Lib/Forms/Gamma.aspx").as_str()]);
        // The full category map is still checkpointed.
        assert_eq!(site.checkpoint().categories.len(), 3);
    }

    #[tokio::test]
    async fn corrupt_checkpoint_starts_fresh() {
        let site = Site::start().await;
        site.landing(LANDING, 1).await;
        for doc in ["a1", "a2", "b1", "g1"] {
            site.document(&format!("/Content%20Library/{doc}.pdf"), 1).await;
        }
        std::fs::create_dir_all(&site.root).unwrap();
        std::fs::write(site.root.join("checkpoint.json"), b"not json").unwrap();

        let mut session = site.session();
        let report = harvest(&site.config(), &mut session, &SilentProgress)
            .await
            .unwrap();

        assert!(!report.categories_from_checkpoint);
        assert_eq!(report.documents_downloaded, 4);
    }
}
