//! Chrome-backed session using chromiumoxide.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use pdfharvest_shared::{HarvestConfig, HarvestError, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::BrowserSession;

/// Env var naming an explicit Chrome/Chromium binary.
const CHROME_ENV: &str = "PDFHARVEST_CHROME";

/// Binaries probed on `PATH`, in order.
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// How to launch the browser.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Run without a window.
    pub headless: bool,
    /// Explicit binary; falls back to [`find_chrome`].
    pub chrome_executable: Option<PathBuf>,
}

impl From<&HarvestConfig> for LaunchOptions {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_executable: config.chrome_executable.clone(),
        }
    }
}

/// Locate a Chrome binary: `PDFHARVEST_CHROME`, then the system `PATH`.
///
/// Returns `None` to let chromiumoxide apply its own platform defaults.
pub fn find_chrome() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROME_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        warn!(path = %p, "{CHROME_ENV} does not exist, probing PATH");
    }

    CHROME_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// One Chrome process with a single tab.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromiumSession {
    /// Launch Chrome and open a blank tab.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if !options.headless {
            builder = builder.with_head();
        }

        if let Some(path) = options.chrome_executable.clone().or_else(find_chrome) {
            debug!(path = %path.display(), "using chrome binary");
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| HarvestError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to launch chrome: {e}")))?;

        // The CDP event loop must be polled for any command to complete.
        let handler = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to open tab: {e}")))?;

        info!(headless = options.headless, "browser session started");

        Ok(Self {
            browser,
            page,
            handler,
            closed: false,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::fetch(url, format!("navigation failed: {msg}")))
            })?;
        Ok(())
    }

    async fn clear_cookies(&mut self) -> Result<()> {
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("clearing cookies: {msg}")))
            })?;
        Ok(())
    }

    async fn element_present(&mut self, tag: &str) -> Result<bool> {
        let found = self
            .page
            .find_elements(tag)
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("querying <{tag}>: {msg}")))
            })?;
        Ok(!found.is_empty())
    }

    async fn find_by_text(&mut self, needle: &str) -> Result<Vec<Element>> {
        let xpath = format!("//*[contains(text(), {})]", xpath_literal(needle));
        self.page
            .find_xpaths(xpath)
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("finding text {needle:?}: {msg}")))
            })
    }

    async fn scroll_into_view(&mut self, element: &Element) -> Result<()> {
        element
            .scroll_into_view()
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("scroll into view: {msg}")))
            })?;
        Ok(())
    }

    async fn pointer_click(&mut self, element: &Element) -> Result<()> {
        let point = element
            .clickable_point()
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("element not clickable: {msg}")))
            })?;

        self.page
            .move_mouse(point)
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("pointer move: {msg}")))
            })?;
        self.page
            .click(point)
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("click: {msg}")))
            })?;
        Ok(())
    }

    async fn anchor_hrefs(&mut self, class: &str) -> Result<Vec<String>> {
        let selector = format!("a.{class}");
        let anchors = self
            .page
            .find_elements(selector.as_str())
            .await
            .map_err(|e| {
                session_error(e, |msg| HarvestError::interaction(format!("querying {selector}: {msg}")))
            })?;

        let mut hrefs = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            let href = anchor
                .attribute("href")
                .await
                .map_err(|e| {
                    session_error(e, |msg| HarvestError::interaction(format!("reading href: {msg}")))
                })?;
            if let Some(href) = href {
                hrefs.push(href);
            }
        }
        Ok(hrefs)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self
            .browser
            .close()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to close chrome: {e}")));

        if result.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handler.abort();

        info!("browser session closed");
        result.map(|_| ())
    }
}

/// Whether `e` means the browser connection is gone, as opposed to a
/// failure of one page or element.
fn is_session_lost(e: &CdpError) -> bool {
    matches!(
        e,
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::NoResponse | CdpError::ChannelSendError(_)
    )
}

/// Map a CDP failure to [`HarvestError::Browser`] when the session is gone,
/// otherwise to the operation's own error.
fn session_error(e: CdpError, otherwise: impl FnOnce(String) -> HarvestError) -> HarvestError {
    if is_session_lost(&e) {
        HarvestError::Browser(format!("browser connection lost: {e}"))
    } else {
        otherwise(e.to_string())
    }
}

/// Quote `s` as an XPath 1.0 string literal.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_connection_is_browser_error() {
        let closed = CdpError::from(futures::channel::oneshot::Canceled);
        let err = session_error(closed, |msg| HarvestError::fetch("https://example.com/", msg));
        assert!(matches!(err, HarvestError::Browser(_)));
        assert!(!err.is_recoverable());

        let err = session_error(CdpError::NoResponse, HarvestError::interaction);
        assert!(matches!(err, HarvestError::Browser(_)));
    }

    #[test]
    fn page_level_failures_stay_recoverable() {
        let err = session_error(CdpError::Timeout, |msg| {
            HarvestError::fetch("https://example.com/", format!("navigation failed: {msg}"))
        });
        assert!(matches!(err, HarvestError::Fetch { .. }));
        assert!(err.is_recoverable());

        let err = session_error(CdpError::NotFound, HarvestError::interaction);
        assert!(matches!(err, HarvestError::ElementInteraction { .. }));

        let err = session_error(CdpError::msg("net::ERR_NAME_NOT_RESOLVED"), |msg| {
            HarvestError::fetch("https://example.com/", msg)
        });
        assert!(err.is_recoverable());
    }

    #[test]
    fn xpath_literal_quoting() {
        assert_eq!(xpath_literal("Title"), "'Title'");
        assert_eq!(xpath_literal("Owner's Title"), "\"Owner's Title\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn launch_options_from_config() {
        let app = pdfharvest_shared::AppConfig::default();
        let mut config = HarvestConfig::try_from(&app).unwrap();
        config.headless = true;
        config.chrome_executable = Some(PathBuf::from("/opt/chrome/chrome"));

        let opts = LaunchOptions::from(&config);
        assert!(opts.headless);
        assert_eq!(opts.chrome_executable, Some(PathBuf::from("/opt/chrome/chrome")));
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn test_chromium_expand_and_scan() {
        let mut session = ChromiumSession::launch(&LaunchOptions {
            headless: true,
            chrome_executable: None,
        })
        .await
        .expect("failed to launch chrome");

        let html = "data:text/html,<div><span onclick=\"document.getElementById('rows').innerHTML=\
                    '<a class=ms-listlink href=/Content%2520Library/a.pdf>a</a>'\">Title A</span>\
                    <div id=rows></div></div>";
        session.navigate(html).await.expect("navigate");
        session.clear_cookies().await.expect("clear cookies");
        assert!(session.element_present("div").await.unwrap());

        let headers = session.find_by_text("Title").await.unwrap();
        assert_eq!(headers.len(), 1);
        session.scroll_into_view(&headers[0]).await.unwrap();
        session.pointer_click(&headers[0]).await.unwrap();

        let hrefs = session.anchor_hrefs("ms-listlink").await.unwrap();
        assert_eq!(hrefs, vec!["/Content%20Library/a.pdf".to_string()]);

        session.close().await.expect("close");
        session.close().await.expect("second close is a no-op");
    }
}
