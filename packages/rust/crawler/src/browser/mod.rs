//! Browser session abstraction.
//!
//! Category pages hide their document rows behind collapsed sections that
//! only a real browser can expand. [`BrowserSession`] is the narrow set of
//! operations the extractor needs; [`ChromiumSession`] drives Chrome over
//! CDP, and `ScriptedSession` (tests, `test-support` feature) replays an
//! in-memory site.

pub mod chromium;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

use async_trait::async_trait;
use pdfharvest_shared::Result;

pub use chromium::{ChromiumSession, LaunchOptions, find_chrome};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptedPage, ScriptedSession, SessionEvent};

/// A single stateful browser tab.
///
/// Implementations must not retry internally: the extractor owns every
/// wait and decides what a failure means.
#[async_trait]
pub trait BrowserSession: Send {
    /// Handle to an element on the current page. May go stale after navigation.
    type Element: Send + Sync;

    /// Load `url` in the tab.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Drop every cookie the session holds.
    async fn clear_cookies(&mut self) -> Result<()>;

    /// Whether at least one `<tag>` element is currently in the DOM.
    async fn element_present(&mut self, tag: &str) -> Result<bool>;

    /// Elements whose own text contains `needle`.
    async fn find_by_text(&mut self, needle: &str) -> Result<Vec<Self::Element>>;

    /// Scroll `element` into the visible viewport.
    async fn scroll_into_view(&mut self, element: &Self::Element) -> Result<()>;

    /// Move the pointer onto `element` and click it.
    async fn pointer_click(&mut self, element: &Self::Element) -> Result<()>;

    /// `href` attributes of every `<a>` carrying `class`, in document order.
    async fn anchor_hrefs(&mut self, class: &str) -> Result<Vec<String>>;

    /// Release the browser. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}
