//! In-memory browser session for tests.
//!
//! Each registered URL maps to a [`ScriptedPage`] made of collapsible
//! sections. Clicking a section header reveals its document rows, either on
//! the next row scan or after a set number of scans; rows stay revealed
//! until the next navigation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use pdfharvest_shared::{HarvestError, Result};

use super::BrowserSession;

/// Something the session was asked to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Navigate(String),
    ClearCookies,
    Scroll(usize),
    Click(usize),
    Close,
}

#[derive(Debug, Clone)]
struct Section {
    label: String,
    hrefs: Vec<String>,
    broken: bool,
    /// Clicking the header kills the browser.
    dead: bool,
    /// Row scans after the click that still come back without this section's rows.
    hidden_scans: usize,
}

/// One category page.
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    ready: bool,
    sections: Vec<Section>,
}

impl Default for ScriptedPage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPage {
    /// A page that renders immediately and has no sections yet.
    pub fn new() -> Self {
        Self {
            ready: true,
            sections: Vec::new(),
        }
    }

    /// A page whose structural elements never appear.
    pub fn never_ready() -> Self {
        Self {
            ready: false,
            sections: Vec::new(),
        }
    }

    /// Add a collapsible section whose rows carry `hrefs`.
    pub fn section<I, S>(mut self, label: &str, hrefs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections.push(Section {
            label: label.to_string(),
            hrefs: hrefs.into_iter().map(Into::into).collect(),
            broken: false,
            dead: false,
            hidden_scans: 0,
        });
        self
    }

    /// Add a section header whose click takes the browser down.
    pub fn dead_section(mut self, label: &str) -> Self {
        self = self.section(label, Vec::<String>::new());
        if let Some(section) = self.sections.last_mut() {
            section.dead = true;
        }
        self
    }

    /// Add a section whose rows only render after `hidden_scans` row scans
    /// following the click.
    pub fn delayed_section<I, S>(mut self, label: &str, hrefs: I, hidden_scans: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self = self.section(label, hrefs);
        if let Some(section) = self.sections.last_mut() {
            section.hidden_scans = hidden_scans;
        }
        self
    }

    /// Add a section header that fails on interaction.
    pub fn broken_section(mut self, label: &str) -> Self {
        self.sections.push(Section {
            label: label.to_string(),
            hrefs: Vec::new(),
            broken: true,
            dead: false,
            hidden_scans: 0,
        });
        self
    }
}

/// Replays a fixed set of pages. Unknown URLs load a page that never renders.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    pages: HashMap<String, ScriptedPage>,
    crash_urls: BTreeSet<String>,
    current: Option<ScriptedPage>,
    /// Clicked sections and the number of row scans seen since.
    expanded: BTreeMap<usize, usize>,
    events: Vec<SessionEvent>,
    closed: bool,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `page` at `url`.
    pub fn page(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Navigating to `url` fails as if the browser process died.
    pub fn crash_on(mut self, url: impl Into<String>) -> Self {
        self.crash_urls.insert(url.into());
        self
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// URLs navigated to, in order.
    pub fn visited(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Navigate(url) => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn section(&self, index: usize) -> Result<&Section> {
        self.current
            .as_ref()
            .and_then(|p| p.sections.get(index))
            .ok_or_else(|| HarvestError::interaction(format!("stale element reference {index}")))
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    type Element = usize;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.events.push(SessionEvent::Navigate(url.to_string()));
        if self.crash_urls.contains(url) {
            return Err(HarvestError::Browser("browser process exited".into()));
        }
        self.current = Some(
            self.pages
                .get(url)
                .cloned()
                .unwrap_or_else(ScriptedPage::never_ready),
        );
        self.expanded.clear();
        Ok(())
    }

    async fn clear_cookies(&mut self) -> Result<()> {
        self.events.push(SessionEvent::ClearCookies);
        Ok(())
    }

    async fn element_present(&mut self, _tag: &str) -> Result<bool> {
        Ok(self.current.as_ref().is_some_and(|p| p.ready))
    }

    async fn find_by_text(&mut self, needle: &str) -> Result<Vec<usize>> {
        Ok(self
            .current
            .as_ref()
            .map(|p| {
                p.sections
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.label.contains(needle))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scroll_into_view(&mut self, element: &usize) -> Result<()> {
        self.events.push(SessionEvent::Scroll(*element));
        if self.section(*element)?.broken {
            return Err(HarvestError::interaction("element is not interactable"));
        }
        Ok(())
    }

    async fn pointer_click(&mut self, element: &usize) -> Result<()> {
        self.events.push(SessionEvent::Click(*element));
        if self.section(*element)?.dead {
            return Err(HarvestError::Browser("browser process exited".into()));
        }
        if self.section(*element)?.broken {
            return Err(HarvestError::interaction("element click intercepted"));
        }
        self.expanded.entry(*element).or_insert(0);
        Ok(())
    }

    async fn anchor_hrefs(&mut self, _class: &str) -> Result<Vec<String>> {
        let Some(page) = self.current.as_ref() else {
            return Ok(Vec::new());
        };
        let mut hrefs = Vec::new();
        for (index, scans) in self.expanded.iter_mut() {
            let Some(section) = page.sections.get(*index) else {
                continue;
            };
            *scans = scans.saturating_add(1);
            if *scans > section.hidden_scans {
                hrefs.extend(section.hrefs.iter().cloned());
            }
        }
        Ok(hrefs)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.events.push(SessionEvent::Close);
            self.closed = true;
        }
        Ok(())
    }
}
