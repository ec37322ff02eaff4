//! HTML parsing of search-result pages into [`ParsedSerp`].
//!
//! Result-page layouts drift, so every element is located through a table
//! of CSS selectors tried in order — first selector that yields elements
//! wins for containers, first match wins within an entry. Adding support
//! for a layout change means extending a table, not touching the scan
//! logic.

use scraper::{ElementRef, Html, Selector};

use crate::types::{ParsedSerp, SerpEntry, SerpFeatures};

// Containers holding one organic result each.
const ORGANIC_CONTAINER_SELECTORS: &[&str] = &[
    "div[data-section='organic'] div.result",
    "div.organic-result",
    "div.g div[data-content-feature]",
    "div.g",
    "li.serp-item[data-organic]",
];

// Containers holding one sponsored/ad result each.
const SPONSORED_CONTAINER_SELECTORS: &[&str] = &[
    "div[data-section='ads'] div.result",
    "div[data-text-ad]",
    "div.ads-ad",
    "li.serp-item[data-sponsored]",
];

const TITLE_LINK_SELECTORS: &[&str] = &["h3 a", "h2 a", "a h3", "a[data-title]", "a[href]"];

const SNIPPET_SELECTORS: &[&str] = &[
    "div[data-snippet]",
    "div.snippet",
    "span.result-snippet",
    "div.VwiC3b",
];

// Feature sections, detected by presence only.
const FEATURE_SELECTORS: &[(&str, &[&str])] = &[
    ("map_pack", &["div[data-feature='map-pack']", "div.map-pack", "#lu_map"]),
    ("video", &["div[data-feature='video']", "div.video-results", "video-voyager"]),
    ("image", &["div[data-feature='images']", "div.image-pack", "#imagebox"]),
    ("snippet", &["div[data-feature='snippet']", "div.featured-snippet", "block-component"]),
    (
        "people_also_ask",
        &["div[data-feature='paa']", "div.related-question-pair", "div[data-initq]"],
    ),
    (
        "knowledge_panel",
        &["div[data-feature='knowledge']", "div.knowledge-panel", "div.kp-wholepage"],
    ),
    ("shopping", &["div[data-feature='shopping']", "div.shopping-results", "div.commercial-unit"]),
    ("news", &["div[data-feature='news']", "div.news-results", "g-section-with-header"]),
    (
        "related_searches",
        &["div[data-feature='related']", "div.related-searches", "div#botstuff div.card-section"],
    ),
];

/// Parses raw result-page markup. Never fails: unparseable markup yields an
/// empty [`ParsedSerp`], which the extractor reports as unranked rather than
/// as an error.
#[must_use]
pub fn parse_serp(html: &str) -> ParsedSerp {
    let doc = Html::parse_document(html);

    let organic = extract_entries(&doc, ORGANIC_CONTAINER_SELECTORS);
    let sponsored = extract_entries(&doc, SPONSORED_CONTAINER_SELECTORS);
    let features = detect_features(&doc);

    ParsedSerp {
        organic,
        sponsored,
        features,
    }
}

/// Finds result entries using the first container selector that matches
/// anything.
fn extract_entries(doc: &Html, container_selectors: &[&str]) -> Vec<SerpEntry> {
    for raw in container_selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let entries: Vec<SerpEntry> = doc
            .select(&selector)
            .filter_map(|el| extract_entry(&el))
            .collect();
        if !entries.is_empty() {
            return entries;
        }
    }
    Vec::new()
}

/// Pulls title/url/snippet out of one result container. Containers without
/// an external link are skipped (layout scaffolding, not results).
fn extract_entry(element: &ElementRef<'_>) -> Option<SerpEntry> {
    let (title, url) = TITLE_LINK_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        element.select(&selector).find_map(|link| {
            let href = link.value().attr("href")?;
            if !href.starts_with("http") {
                return None;
            }
            let title = link.text().collect::<String>().trim().to_owned();
            Some((title, href.to_owned()))
        })
    })?;

    let snippet = SNIPPET_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        element.select(&selector).next().map(|el| {
            el.text().collect::<String>().trim().to_owned()
        })
    });

    Some(SerpEntry {
        title,
        url,
        snippet: snippet.filter(|s| !s.is_empty()),
    })
}

fn detect_features(doc: &Html) -> SerpFeatures {
    let present = |selectors: &[&str]| -> bool {
        selectors.iter().any(|raw| {
            Selector::parse(raw)
                .map(|s| doc.select(&s).next().is_some())
                .unwrap_or(false)
        })
    };

    let mut features = SerpFeatures::default();
    for (name, selectors) in FEATURE_SELECTORS {
        let flag = present(selectors);
        match *name {
            "map_pack" => features.map_pack = flag,
            "video" => features.video = flag,
            "image" => features.image = flag,
            "snippet" => features.snippet = flag,
            "people_also_ask" => features.people_also_ask = flag,
            "knowledge_panel" => features.knowledge_panel = flag,
            "shopping" => features.shopping = flag,
            "news" => features.news = flag,
            "related_searches" => features.related_searches = flag,
            _ => {}
        }
    }
    features
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
