//! Shared types, error model, and configuration for pdfharvest.
//!
//! This crate is the foundation depended on by all other pdfharvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`Category`], [`Checkpoint`]) and URL/filename helpers
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserSection, ExtractConfig, ExtractSection, HarvestConfig, HttpSection,
    SiteConfig, SiteSection, StorageSection, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, Category, CategoryMap, Checkpoint, category_dir_name,
    filename_from_url, is_document_href, resolve_href, resolve_page_href,
};
