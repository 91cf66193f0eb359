use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::enrich::MergePolicy;
use crate::filter::FilterRules;

const DEFAULT_CONFIG_FILE: &str = "champions.toml";
const ENV_PREFIX: &str = "CHAMPIONS";

/// A vendor page to scrape. Scrape order follows configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub url: String,
}

impl Target {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

pub fn default_targets() -> Vec<Target> {
    vec![
        Target::new("Datadog", "https://www.datadoghq.com/customers/"),
        Target::new("HashiCorp", "https://www.hashicorp.com/case-studies"),
        Target::new("Elastic", "https://www.elastic.co/customers"),
    ]
}

/// One repeated-block selector plus three field selectors scoped to each block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSchema {
    pub block: String,
    pub name: String,
    pub role: String,
    pub company: String,
}

impl Default for SelectorSchema {
    fn default() -> Self {
        Self {
            block: ".case-study".into(),
            name: ".champion-name".into(),
            role: ".champion-role".into(),
            company: ".champion-company".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    /// Outbound links whose host matches this domain are enrichment links.
    pub host_pattern: String,
    /// Element holding candidate facts on the enrichment page.
    pub fact_selector: String,
    /// First fact element containing this keyword wins.
    pub keyword: String,
    pub unknown: String,
    pub merge: MergePolicy,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            host_pattern: "linkedin.com".into(),
            fact_selector: "dd".into(),
            keyword: "employees".into(),
            unknown: "unknown".into(),
            merge: MergePolicy::LastWins,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Plain HTTP GET of the page HTML
    Http,
    /// Rendered HTML from a Browserless /content endpoint
    Browserless,
    /// Raw HTML via spider.cloud
    Spider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub backend: Backend,
    pub timeout_secs: u64,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Http,
            timeout_secs: 30,
            browserless_url: None,
            browserless_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub targets: Vec<Target>,
    pub selectors: SelectorSchema,
    pub enrichment: EnrichmentSettings,
    pub filter: FilterRules,
    pub fetch: FetchSettings,
    pub output: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            selectors: SelectorSchema::default(),
            enrichment: EnrichmentSettings::default(),
            filter: FilterRules::default(),
            fetch: FetchSettings::default(),
            output: PathBuf::from("champions.json"),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file, then `CHAMPIONS_*` environment variables.
    /// Nested keys use `__`, e.g. `CHAMPIONS_FETCH__TIMEOUT_SECS=10`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Failed to parse settings")?;

        Ok(settings)
    }
}
