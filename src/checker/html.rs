// src/checker/html.rs
// =============================================================================
// This module extracts links from the HTML of an assignment description.
//
// We use the `scraper` crate which:
// - Parses HTML fragments into a DOM
// - Supports CSS selectors for finding elements
// - Is built on html5ever, so broken markup from rich-text editors still parses
//
// Links are returned exactly as written in the href. Nothing is resolved or
// filtered by scheme here: a "mailto:" or relative href is still a link the
// author put in the assignment, and the checker reports it as an invalid URL.
// =============================================================================

use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::record::{DiscoveredLink, OriginContext};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

// Extracts every <a href> from an HTML fragment.
//
// Parameters:
//   html: the markup (e.g. an assignment intro)
//   origin: where the markup came from, attached to every link
//
// Example:
//   html = "<p>See <a href='https://example.com'>this</a></p>"
//   result = [DiscoveredLink { url: "https://example.com", origin }]
pub fn extract_html_links(html: &str, origin: &OriginContext) -> Vec<DiscoveredLink> {
    let fragment = Html::parse_fragment(html);

    fragment
        .select(&ANCHOR)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| is_candidate(href))
        .map(|href| DiscoveredLink::new(href, origin.clone()))
        .collect()
}

// Empty hrefs and in-page anchors ("#section") point nowhere worth checking
fn is_candidate(href: &str) -> bool {
    !href.is_empty() && !href.starts_with('#')
}
