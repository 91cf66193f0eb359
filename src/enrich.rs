use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::browser::Browser;
use crate::error::EnrichmentError;
use crate::parser::PageParser;

/// The company-size descriptor found on an enrichment page, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentFact {
    Found(String),
    Unknown,
}

impl EnrichmentFact {
    pub fn render(&self, unknown: &str) -> String {
        match self {
            EnrichmentFact::Found(s) => s.clone(),
            EnrichmentFact::Unknown => unknown.to_string(),
        }
    }
}

/// How the facts from several enrichment links on one page collapse into one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// The last link that loaded decides, even when it had no matching fact.
    #[default]
    LastWins,
    /// The first link that produced a fact decides.
    FirstKnown,
}

/// Open `link`, look up the fact, release the page. Only navigation failures are errors.
pub async fn fetch_fact(
    browser: &Browser,
    parser: &PageParser,
    link: &Url,
) -> Result<EnrichmentFact, EnrichmentError> {
    let page = browser
        .open(link.as_str())
        .await
        .map_err(|source| EnrichmentError {
            link: link.to_string(),
            source,
        })?;

    Ok(match parser.fact(&page) {
        Some(fact) => EnrichmentFact::Found(fact),
        None => EnrichmentFact::Unknown,
    })
}

/// Facts per enrichment link, in link order. Fetched once per page.
#[derive(Debug, Default)]
pub struct EnrichmentMap {
    entries: Vec<(Url, Result<EnrichmentFact, EnrichmentError>)>,
}

impl EnrichmentMap {
    /// Fetch every link one at a time. A failed link is logged and kept as a failure.
    pub async fn build(browser: &Browser, parser: &PageParser, links: &[Url]) -> Self {
        let mut entries = Vec::with_capacity(links.len());

        for link in links {
            info!("Navigating to enrichment URL: {}", link);
            let result = fetch_fact(browser, parser, link).await;
            if let Err(ref e) = result {
                warn!("{}: {}", e, e.source);
            }
            entries.push((link.clone(), result));
        }

        Self { entries }
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// Collapse to one fact. Failed links never contribute; no usable link means `Unknown`.
    pub fn resolve(&self, policy: MergePolicy) -> EnrichmentFact {
        let mut loaded = self.entries.iter().filter_map(|(_, r)| r.as_ref().ok());
        let picked = match policy {
            MergePolicy::LastWins => loaded.last(),
            MergePolicy::FirstKnown => loaded.find(|f| matches!(f, EnrichmentFact::Found(_))),
        };
        picked.cloned().unwrap_or(EnrichmentFact::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{browser, StaticSource};
    use crate::settings::{EnrichmentSettings, SelectorSchema};

    fn parser() -> PageParser {
        PageParser::new(&SelectorSchema::default(), &EnrichmentSettings::default()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    const A: &str = "https://www.linkedin.com/company/a";
    const B: &str = "https://www.linkedin.com/company/b";
    const C: &str = "https://www.linkedin.com/company/c";

    fn source() -> StaticSource {
        StaticSource::default()
            .page(A, "<dl><dd>300 employees</dd></dl>")
            .page(B, "<dl><dd>1,001-5,000 employees</dd></dl>")
            .page(C, "<dl><dd>Software</dd></dl>")
    }

    #[tokio::test]
    async fn fetch_fact_found_and_unknown() {
        let b = browser(source());
        let p = parser();
        assert_eq!(
            fetch_fact(&b, &p, &url(A)).await.unwrap(),
            EnrichmentFact::Found("300 employees".into())
        );
        assert_eq!(fetch_fact(&b, &p, &url(C)).await.unwrap(), EnrichmentFact::Unknown);
        assert_eq!(b.open_contexts(), 0);
    }

    #[tokio::test]
    async fn fetch_fact_navigation_failure() {
        let b = browser(source());
        let err = fetch_fact(&b, &parser(), &url("https://www.linkedin.com/company/gone"))
            .await
            .unwrap_err();
        assert_eq!(err.link, "https://www.linkedin.com/company/gone");
        assert_eq!(b.open_contexts(), 0);
    }

    #[tokio::test]
    async fn fetch_fact_is_repeatable() {
        let b = browser(source());
        let p = parser();
        let first = fetch_fact(&b, &p, &url(B)).await.unwrap();
        let second = fetch_fact(&b, &p, &url(B)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn last_loaded_link_wins() {
        let b = browser(source());
        let map = EnrichmentMap::build(&b, &parser(), &[url(A), url(B)]).await;
        assert_eq!(
            map.resolve(MergePolicy::LastWins),
            EnrichmentFact::Found("1,001-5,000 employees".into())
        );

        // A loaded page without the keyword still overrides earlier facts.
        let map = EnrichmentMap::build(&b, &parser(), &[url(A), url(C)]).await;
        assert_eq!(map.resolve(MergePolicy::LastWins), EnrichmentFact::Unknown);
        assert_eq!(
            map.resolve(MergePolicy::FirstKnown),
            EnrichmentFact::Found("300 employees".into())
        );
    }

    #[tokio::test]
    async fn failed_links_do_not_contribute() {
        let b = browser(source());
        let gone = url("https://www.linkedin.com/company/gone");
        let map = EnrichmentMap::build(&b, &parser(), &[url(A), gone]).await;
        assert_eq!(map.failures(), 1);
        assert_eq!(
            map.resolve(MergePolicy::LastWins),
            EnrichmentFact::Found("300 employees".into())
        );
    }

    #[test]
    fn empty_map_is_unknown() {
        let map = EnrichmentMap::default();
        assert_eq!(map.resolve(MergePolicy::LastWins), EnrichmentFact::Unknown);
        assert_eq!(EnrichmentFact::Unknown.render("unknown"), "unknown");
    }
}
