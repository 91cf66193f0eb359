use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::compile;
use crate::error::SelectorError;
use crate::settings::SelectorSchema;

/// An extracted, unenriched champion candidate. All three fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    pub role: String,
    pub company: String,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<RawRecord>,
    /// Blocks dropped because a field was missing or empty.
    pub skipped: usize,
}

pub struct RecordSchema {
    block: Selector,
    name: Selector,
    role: Selector,
    company: Selector,
}

impl RecordSchema {
    pub fn compile(schema: &SelectorSchema) -> Result<Self, SelectorError> {
        Ok(Self {
            block: compile(&schema.block)?,
            name: compile(&schema.name)?,
            role: compile(&schema.role)?,
            company: compile(&schema.company)?,
        })
    }
}

/// Walk every block in document order. A block missing any field is skipped, never half-filled.
pub fn extract_records(doc: &Html, schema: &RecordSchema) -> Extraction {
    let mut out = Extraction::default();

    for block in doc.select(&schema.block) {
        let record = field(&block, &schema.name).and_then(|name| {
            let role = field(&block, &schema.role)?;
            let company = field(&block, &schema.company)?;
            Some(RawRecord { name, role, company })
        });

        match record {
            Some(r) => out.records.push(r),
            None => out.skipped += 1,
        }
    }

    out
}

fn field(block: &ElementRef, selector: &Selector) -> Option<String> {
    let el = block.select(selector).next()?;
    let text = el.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
