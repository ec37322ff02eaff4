use super::*;

const FIXTURE: &str = r#"<!DOCTYPE html>
<html><body>
  <div data-section="ads">
    <div class="result">
      <h3><a href="https://ads.megastore.com/landing">Big Store Deals</a></h3>
      <div data-snippet>Sponsored deals on everything.</div>
    </div>
  </div>
  <div data-feature="map-pack"><span>3 local places</span></div>
  <div data-section="organic">
    <div class="result">
      <h3><a href="https://en.wikipedia.org/wiki/Espresso">Espresso - Wikipedia</a></h3>
      <div data-snippet>Espresso is a coffee-brewing method.</div>
    </div>
    <div class="result">
      <h3><a href="https://shop.example.com/machines">Espresso Machines | Example</a></h3>
      <div data-snippet>Browse our espresso machines.</div>
    </div>
    <div class="result">
      <h3><a href="https://www.roasters.coffee/guide">The Espresso Guide</a></h3>
    </div>
    <div class="result">
      <span>No link here, just layout scaffolding.</span>
    </div>
  </div>
  <div data-feature="related"><a href="/search?q=espresso+beans">espresso beans</a></div>
</body></html>"#;

#[test]
fn parses_organic_entries_in_document_order() {
    let parsed = parse_serp(FIXTURE);

    assert_eq!(parsed.organic.len(), 3, "scaffolding container must be skipped");
    assert_eq!(parsed.organic[0].url, "https://en.wikipedia.org/wiki/Espresso");
    assert_eq!(parsed.organic[0].title, "Espresso - Wikipedia");
    assert_eq!(parsed.organic[1].url, "https://shop.example.com/machines");
    assert_eq!(parsed.organic[2].url, "https://www.roasters.coffee/guide");
}

#[test]
fn parses_snippets_when_present() {
    let parsed = parse_serp(FIXTURE);

    assert_eq!(
        parsed.organic[0].snippet.as_deref(),
        Some("Espresso is a coffee-brewing method.")
    );
    assert!(parsed.organic[2].snippet.is_none());
}

#[test]
fn separates_sponsored_from_organic() {
    let parsed = parse_serp(FIXTURE);

    assert_eq!(parsed.sponsored.len(), 1);
    assert_eq!(parsed.sponsored[0].url, "https://ads.megastore.com/landing");
    assert!(
        !parsed.organic.iter().any(|e| e.url.contains("megastore")),
        "sponsored entries must not leak into organic"
    );
}

#[test]
fn detects_present_feature_sections_only() {
    let parsed = parse_serp(FIXTURE);

    assert!(parsed.features.map_pack);
    assert!(parsed.features.related_searches);
    assert!(!parsed.features.video);
    assert!(!parsed.features.knowledge_panel);
    assert!(!parsed.features.shopping);
}

#[test]
fn relative_links_are_not_results() {
    let html = r#"<div data-section="organic">
        <div class="result"><h3><a href="/internal">Internal</a></h3></div>
    </div>"#;
    let parsed = parse_serp(html);
    assert!(parsed.organic.is_empty());
}

#[test]
fn empty_or_garbage_markup_yields_empty_serp() {
    let parsed = parse_serp("");
    assert!(parsed.organic.is_empty());
    assert!(parsed.sponsored.is_empty());
    assert_eq!(parsed.features, SerpFeatures::default());

    let parsed = parse_serp("<<<>>> not html at all &&&");
    assert!(parsed.organic.is_empty());
}
