pub mod facts;
pub mod links;
pub mod records;

use scraper::Selector;
use url::Url;

use crate::browser::Page;
use crate::error::SelectorError;
use crate::settings::{EnrichmentSettings, SelectorSchema};
use records::{Extraction, RecordSchema};

/// What one vendor page yields before enrichment.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub extraction: Extraction,
    pub links: Vec<Url>,
}

/// Compiled selectors for vendor pages and enrichment pages.
pub struct PageParser {
    records: RecordSchema,
    host_pattern: String,
    fact: Selector,
    keyword: String,
}

impl PageParser {
    pub fn new(schema: &SelectorSchema, enrichment: &EnrichmentSettings) -> Result<Self, SelectorError> {
        Ok(Self {
            records: RecordSchema::compile(schema)?,
            host_pattern: enrichment.host_pattern.to_lowercase(),
            fact: compile(&enrichment.fact_selector)?,
            keyword: enrichment.keyword.clone(),
        })
    }

    /// Records and enrichment links from a vendor page. Links are harvested page-wide.
    pub fn parse(&self, page: &Page) -> ParsedPage {
        let doc = page.document();
        ParsedPage {
            extraction: records::extract_records(&doc, &self.records),
            links: links::harvest_links(&doc, page.url(), &self.host_pattern),
        }
    }

    pub fn fact(&self, page: &Page) -> Option<String> {
        facts::find_fact(&page.document(), &self.fact, &self.keyword)
    }
}

pub(crate) fn compile(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
