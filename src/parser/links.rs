use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Absolute anchor targets whose host is `host_pattern` or a subdomain of it.
/// First occurrence wins; order of discovery is kept.
pub fn harvest_links(doc: &Html, base: &Url, host_pattern: &str) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for a in doc.select(&ANCHOR) {
        let Some(href) = a.value().attr("href").map(str::trim) else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        if !url.host_str().is_some_and(|h| host_matches(h, host_pattern)) {
            continue;
        }
        if seen.insert(url.to_string()) {
            links.push(url);
        }
    }

    links
}

fn host_matches(host: &str, pattern: &str) -> bool {
    let host = host.trim_end_matches('.');
    host == pattern
        || host
            .strip_suffix(pattern)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
