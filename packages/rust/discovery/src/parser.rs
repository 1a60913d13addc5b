//! Landing page parser.
//!
//! A category link is any `<a href>` whose href contains the configured
//! marker. The category name is the anchor's trimmed visible text.

use pdfharvest_shared::{Category, CategoryMap, resolve_href};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

/// Matches every anchor that carries an href.
static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));

/// Extract `name -> Category` pairs from landing page markup.
///
/// Later anchors with the same name replace earlier ones. Anchors with no
/// visible text are skipped, since they cannot name a category directory.
pub(crate) fn parse_categories(html: &str, base_origin: &str, marker: &str) -> CategoryMap {
    let doc = Html::parse_document(html);
    let mut categories = CategoryMap::new();

    for el in doc.select(&ANCHOR_SEL) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if !href.contains(marker) {
            continue;
        }

        let name = el.text().collect::<String>().trim().to_string();
        if name.is_empty() {
            debug!(href, "category link has no text, skipping");
            continue;
        }

        let landing_url = resolve_href(base_origin, href);
        categories.insert(name.clone(), Category::new(name, landing_url));
    }

    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://canteach.candu.org";

    #[test]
    fn parses_fixture() {
        let html = std::fs::read_to_string("../../../fixtures/html/landing.html")
            .expect("read landing fixture");
        let cats = parse_categories(&html, ORIGIN, "Forms");

        assert_eq!(cats.len(), 4);
        assert_eq!(
            cats["Design Documents"].landing_url,
            "https://canteach.candu.org/Content%20Library/Forms/Design%20Documents.aspx"
        );
        // Absolute hrefs pass through unchanged.
        assert_eq!(
            cats["Reports"].landing_url,
            "https://canteach.candu.org/Content%20Library/Forms/Reports.aspx"
        );
        assert!(cats.contains_key("Image Library"));
        assert!(!cats.contains_key("Search"));
        assert!(!cats.contains_key("Home"));
    }

    #[test]
    fn marker_is_configurable() {
        let html = r#"<a href="/lib/Collections/a">A</a><a href="/lib/Forms/b">B</a>"#;
        let cats = parse_categories(html, ORIGIN, "Collections");
        assert_eq!(cats.len(), 1);
        assert!(cats.contains_key("A"));
    }

    #[test]
    fn duplicate_names_last_wins() {
        let html = r#"
            <a href="/Forms/first">Reports</a>
            <a href="/Forms/second">  Reports </a>
        "#;
        let cats = parse_categories(html, ORIGIN, "Forms");
        assert_eq!(cats.len(), 1);
        assert_eq!(cats["Reports"].landing_url, "https://canteach.candu.org/Forms/second");
    }

    #[test]
    fn no_matches_is_empty() {
        let html = r#"<html><body><a href="/about">About</a><a>no href</a></body></html>"#;
        assert!(parse_categories(html, ORIGIN, "Forms").is_empty());
    }

    #[test]
    fn textless_anchor_skipped() {
        let html = r#"<a href="/Forms/icon"><img src="x.png"></a>"#;
        assert!(parse_categories(html, ORIGIN, "Forms").is_empty());
    }
}
