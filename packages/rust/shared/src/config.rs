//! Application configuration for pdfharvest.
//!
//! User config lives at `~/.pdfharvest/pdfharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pdfharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pdfharvest";

// ---------------------------------------------------------------------------
// Config structs (matching pdfharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target site.
    #[serde(default)]
    pub site: SiteSection,

    /// Category page expansion and link filtering.
    #[serde(default)]
    pub extract: ExtractSection,

    /// Output locations.
    #[serde(default)]
    pub storage: StorageSection,

    /// Browser session.
    #[serde(default)]
    pub browser: BrowserSection,

    /// HTTP client.
    #[serde(default)]
    pub http: HttpSection,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSection {
    /// Scheme + host (+ port) of the document repository.
    #[serde(default = "default_base_origin")]
    pub base_origin: String,

    /// Path of the page listing all categories.
    #[serde(default = "default_landing_page_path")]
    pub landing_page_path: String,

    /// Substring an href must contain to count as a category link.
    #[serde(default = "default_category_marker")]
    pub category_marker: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            base_origin: default_base_origin(),
            landing_page_path: default_landing_page_path(),
            category_marker: default_category_marker(),
        }
    }
}

fn default_base_origin() -> String {
    "https://canteach.candu.org".into()
}
fn default_landing_page_path() -> String {
    "/".into()
}
fn default_category_marker() -> String {
    "Forms".into()
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSection {
    /// Tag that must be present before a category page counts as loaded.
    #[serde(default = "default_ready_tag")]
    pub ready_tag: String,

    /// Visible text identifying collapsed section headers.
    #[serde(default = "default_expand_text")]
    pub expand_text: String,

    /// CSS class carried by document-row anchors.
    #[serde(default = "default_document_row_class")]
    pub document_row_class: String,

    /// Path marker a document href must contain.
    #[serde(default = "default_document_path_marker")]
    pub document_path_marker: String,

    /// Suffix a document href must end with (case-sensitive).
    #[serde(default = "default_document_suffix")]
    pub document_suffix: String,

    /// Pause after scrolling a header into view.
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    /// Upper bound on waiting for new rows after a click.
    #[serde(default = "default_expand_timeout_ms")]
    pub expand_timeout_ms: u64,

    /// Polling interval for DOM wait conditions.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            ready_tag: default_ready_tag(),
            expand_text: default_expand_text(),
            document_row_class: default_document_row_class(),
            document_path_marker: default_document_path_marker(),
            document_suffix: default_document_suffix(),
            scroll_settle_ms: default_scroll_settle_ms(),
            expand_timeout_ms: default_expand_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_ready_tag() -> String {
    "div".into()
}
fn default_expand_text() -> String {
    "Title".into()
}
fn default_document_row_class() -> String {
    "ms-listlink".into()
}
fn default_document_path_marker() -> String {
    "Content%20Library".into()
}
fn default_document_suffix() -> String {
    ".pdf".into()
}
fn default_scroll_settle_ms() -> u64 {
    500
}
fn default_expand_timeout_ms() -> u64 {
    3000
}
fn default_poll_interval_ms() -> u64 {
    100
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Root directory; each category gets a subdirectory.
    #[serde(default = "default_save_root")]
    pub save_root: String,

    /// Checkpoint file location.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            save_root: default_save_root(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

fn default_save_root() -> String {
    "downloads".into()
}
fn default_checkpoint_path() -> String {
    "checkpoint.json".into()
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSection {
    /// Run Chrome without a window.
    #[serde(default)]
    pub headless: bool,

    /// Bounded wait for a category page to render.
    #[serde(default = "default_page_wait_timeout_secs")]
    pub page_wait_timeout_secs: u64,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<String>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: false,
            page_wait_timeout_secs: default_page_wait_timeout_secs(),
            chrome_executable: None,
        }
    }
}

fn default_page_wait_timeout_secs() -> u64 {
    10
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    /// Whole-request timeout for page and document GETs.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Runtime config (validated, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// What the category discoverer needs to know about the site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Origin without a trailing slash, e.g. `https://canteach.candu.org`.
    pub base_origin: String,
    /// Absolute URL of the landing page.
    pub landing_url: Url,
    /// Category link discriminator.
    pub category_marker: String,
}

/// What the document link extractor needs.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub base_origin: String,
    pub ready_tag: String,
    pub expand_text: String,
    pub document_row_class: String,
    pub document_path_marker: String,
    pub document_suffix: String,
    pub page_wait_timeout: Duration,
    pub scroll_settle: Duration,
    pub expand_timeout: Duration,
    pub poll_interval: Duration,
}

/// Fully validated configuration for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub site: SiteConfig,
    pub extract: ExtractConfig,
    /// Root directory for category subdirectories.
    pub save_root: PathBuf,
    /// Checkpoint file path.
    pub checkpoint_path: PathBuf,
    /// Launch the browser without a window.
    pub headless: bool,
    /// Explicit browser binary.
    pub chrome_executable: Option<PathBuf>,
    /// HTTP request timeout.
    pub http_timeout: Duration,
    /// When non-empty, only these categories are processed.
    pub only_categories: Vec<String>,
}

impl TryFrom<&AppConfig> for HarvestConfig {
    type Error = HarvestError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let origin_url = Url::parse(&config.site.base_origin).map_err(|e| {
            HarvestError::config(format!(
                "invalid base_origin '{}': {e}",
                config.site.base_origin
            ))
        })?;

        if !matches!(origin_url.scheme(), "http" | "https") || origin_url.host_str().is_none() {
            return Err(HarvestError::config(format!(
                "base_origin must be an http(s) URL with a host, got '{}'",
                config.site.base_origin
            )));
        }

        let base_origin = origin_url.origin().ascii_serialization();
        let landing_url = origin_url
            .join(&config.site.landing_page_path)
            .map_err(|e| {
                HarvestError::config(format!(
                    "invalid landing_page_path '{}': {e}",
                    config.site.landing_page_path
                ))
            })?;

        require_non_empty("site.category_marker", &config.site.category_marker)?;
        require_non_empty("extract.ready_tag", &config.extract.ready_tag)?;
        require_non_empty("extract.expand_text", &config.extract.expand_text)?;
        require_non_empty("extract.document_row_class", &config.extract.document_row_class)?;
        require_non_empty("extract.document_suffix", &config.extract.document_suffix)?;

        if config.browser.page_wait_timeout_secs == 0 {
            return Err(HarvestError::config(
                "browser.page_wait_timeout_secs must be greater than zero",
            ));
        }

        let extract = &config.extract;
        Ok(Self {
            site: SiteConfig {
                base_origin: base_origin.clone(),
                landing_url,
                category_marker: config.site.category_marker.clone(),
            },
            extract: ExtractConfig {
                base_origin,
                ready_tag: extract.ready_tag.clone(),
                expand_text: extract.expand_text.clone(),
                document_row_class: extract.document_row_class.clone(),
                document_path_marker: extract.document_path_marker.clone(),
                document_suffix: extract.document_suffix.clone(),
                page_wait_timeout: Duration::from_secs(config.browser.page_wait_timeout_secs),
                scroll_settle: Duration::from_millis(extract.scroll_settle_ms),
                expand_timeout: Duration::from_millis(extract.expand_timeout_ms),
                poll_interval: Duration::from_millis(extract.poll_interval_ms.max(1)),
            },
            save_root: PathBuf::from(&config.storage.save_root),
            checkpoint_path: PathBuf::from(&config.storage.checkpoint_path),
            headless: config.browser.headless,
            chrome_executable: config.browser.chrome_executable.as_ref().map(PathBuf::from),
            http_timeout: Duration::from_secs(config.http.timeout_secs),
            only_categories: Vec::new(),
        })
    }
}

fn require_non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(HarvestError::config(format!("{key} must not be empty")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pdfharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pdfharvest/pdfharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
