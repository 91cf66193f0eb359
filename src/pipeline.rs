use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::browser::Browser;
use crate::enrich::{EnrichmentMap, MergePolicy};
use crate::error::NavigationError;
use crate::parser::records::RawRecord;
use crate::parser::PageParser;
use crate::settings::{EnrichmentSettings, Target};

/// An enriched, provenance-tagged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Champion {
    pub name: String,
    pub role: String,
    pub company: String,
    pub company_size: String,
    /// The target page the record was extracted from, never the enrichment link.
    pub source: String,
}

impl Champion {
    fn new(record: RawRecord, company_size: String, source: &str) -> Self {
        Self {
            name: record.name,
            role: record.role,
            company: record.company,
            company_size,
            source: source.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub target: String,
    pub records: usize,
    pub skipped_blocks: usize,
    pub links: usize,
    pub enrichment_failures: usize,
}

#[derive(Debug)]
pub enum TargetOutcome {
    Scraped(PageReport),
    Failed { target: String, error: NavigationError },
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<TargetOutcome>,
    pub peak_contexts: usize,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TargetOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped_blocks(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                TargetOutcome::Scraped(r) => r.skipped_blocks,
                TargetOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

pub struct RunOutput {
    /// Every champion from every target that loaded, in target then document order.
    pub champions: Vec<Champion>,
    pub report: RunReport,
}

/// Drives one sequential pass over the targets.
pub struct Pipeline {
    browser: Browser,
    parser: PageParser,
    merge: MergePolicy,
    unknown: String,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(browser: Browser, parser: PageParser, enrichment: &EnrichmentSettings) -> Self {
        Self {
            browser,
            parser,
            merge: enrichment.merge,
            unknown: enrichment.unknown.clone(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn parser(&self) -> &PageParser {
        &self.parser
    }

    /// A failing target contributes nothing and the run moves on to the next one.
    pub async fn run(&self, targets: &[Target]) -> RunOutput {
        let mut champions = Vec::new();
        let mut report = RunReport::default();

        for target in targets {
            self.progress.set_message(target.name.clone());
            info!("Scraping {}...", target.name);

            match self.scrape_target(target).await {
                Ok((found, page)) => {
                    info!(
                        "Scraped {} champions from {} ({} blocks skipped, {} links, {} enrichment failures)",
                        page.records, target.name, page.skipped_blocks, page.links, page.enrichment_failures
                    );
                    champions.extend(found);
                    report.outcomes.push(TargetOutcome::Scraped(page));
                }
                Err(error) => {
                    warn!("Failed to scrape {}: {}", target.name, error);
                    report.outcomes.push(TargetOutcome::Failed {
                        target: target.name.clone(),
                        error,
                    });
                }
            }
            self.progress.inc(1);
        }

        self.progress.finish_and_clear();
        if self.browser.open_contexts() > 0 {
            warn!("{} browsing contexts still open after run", self.browser.open_contexts());
        }
        report.peak_contexts = self.browser.peak_contexts();
        RunOutput { champions, report }
    }

    async fn scrape_target(&self, target: &Target) -> Result<(Vec<Champion>, PageReport), NavigationError> {
        let page = self.browser.open(&target.url).await?;
        let parsed = self.parser.parse(&page);
        let records = parsed.extraction.records;

        // Links only matter when there is a record to attach them to.
        let enrichment = if records.is_empty() {
            EnrichmentMap::default()
        } else {
            EnrichmentMap::build(&self.browser, &self.parser, &parsed.links).await
        };
        let company_size = enrichment.resolve(self.merge).render(&self.unknown);

        let report = PageReport {
            target: target.name.clone(),
            records: records.len(),
            skipped_blocks: parsed.extraction.skipped,
            links: parsed.links.len(),
            enrichment_failures: enrichment.failures(),
        };

        let champions = records
            .into_iter()
            .map(|r| Champion::new(r, company_size.clone(), &target.url))
            .collect();

        drop(page);
        Ok((champions, report))
    }
}
