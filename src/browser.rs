use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::Html;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::debug;
use url::Url;

use crate::error::NavigationError;
use crate::settings::{Backend, FetchSettings};

/// Something that can turn a URL into the HTML of a parsed document.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn load(&self, url: &Url) -> Result<String, NavigationError>;
}

#[derive(Debug, Default)]
struct ContextCounter {
    open: AtomicUsize,
    peak: AtomicUsize,
}

/// Releases its browsing context when dropped, on every exit path.
#[derive(Debug)]
struct ContextGuard {
    counter: Arc<ContextCounter>,
    url: String,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.counter.open.fetch_sub(1, Ordering::SeqCst);
        debug!("Closed browsing context for {}", self.url);
    }
}

/// A loaded page. Holds its browsing context until dropped.
#[derive(Debug)]
pub struct Page {
    url: Url,
    html: String,
    _context: ContextGuard,
}

impl Page {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Parse the page into a DOM. The result is not `Send`; keep it out of await points.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Opens pages through a `PageSource`, bounding every navigation with a timeout.
pub struct Browser {
    source: Box<dyn PageSource>,
    timeout: Duration,
    contexts: Arc<ContextCounter>,
}

impl Browser {
    pub fn new(source: Box<dyn PageSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            contexts: Arc::new(ContextCounter::default()),
        }
    }

    pub fn from_settings(fetch: &FetchSettings) -> Result<Self> {
        let timeout = Duration::from_secs(fetch.timeout_secs);
        let source: Box<dyn PageSource> = match fetch.backend {
            Backend::Http => Box::new(HttpSource::new(timeout)?),
            Backend::Browserless => {
                let base_url = fetch
                    .browserless_url
                    .as_deref()
                    .context("browserless backend needs BROWSERLESS_URL")?;
                Box::new(BrowserlessSource::new(
                    base_url,
                    fetch.browserless_token.as_deref(),
                    timeout,
                )?)
            }
            Backend::Spider => Box::new(SpiderSource::from_env()?),
        };
        Ok(Self::new(source, timeout))
    }

    /// Open a browsing context and navigate to `url`, returning once the document is parsed.
    pub async fn open(&self, url: &str) -> Result<Page, NavigationError> {
        let parsed = parse_page_url(url)?;
        let context = self.acquire(url);

        let html = match tokio::time::timeout(self.timeout, self.source.load(&parsed)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(NavigationError::Timeout {
                    url: url.to_string(),
                    after: self.timeout,
                })
            }
        };

        Ok(Page {
            url: parsed,
            html,
            _context: context,
        })
    }

    pub fn open_contexts(&self) -> usize {
        self.contexts.open.load(Ordering::SeqCst)
    }

    /// Highest number of browsing contexts open at the same time.
    pub fn peak_contexts(&self) -> usize {
        self.contexts.peak.load(Ordering::SeqCst)
    }

    fn acquire(&self, url: &str) -> ContextGuard {
        let open = self.contexts.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.contexts.peak.fetch_max(open, Ordering::SeqCst);
        debug!("Opened browsing context for {} ({} open)", url, open);
        ContextGuard {
            counter: Arc::clone(&self.contexts),
            url: url.to_string(),
        }
    }
}

fn parse_page_url(url: &str) -> Result<Url, NavigationError> {
    let parsed = Url::parse(url).map_err(|e| NavigationError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(NavigationError::InvalidUrl {
            url: url.to_string(),
            message: format!("unsupported scheme {other}"),
        }),
    }
}

// ── Backends ──

/// Plain HTTP GET. No script execution; the response body is the parsed document.
pub struct HttpSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn load(&self, url: &Url) -> Result<String, NavigationError> {
        let start = Instant::now();
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| NavigationError::from_reqwest(url.as_str(), e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| NavigationError::from_reqwest(url.as_str(), e, self.timeout))?;
        debug!("GET {} -> {} bytes in {}ms", url, body.len(), start.elapsed().as_millis());
        Ok(body)
    }
}

/// Rendered HTML from a Browserless `/content` endpoint.
pub struct BrowserlessSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl BrowserlessSource {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            timeout,
        })
    }
}

#[async_trait]
impl PageSource for BrowserlessSource {
    async fn load(&self, url: &Url) -> Result<String, NavigationError> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        // domcontentloaded: don't wait for every subresource.
        let body = serde_json::json!({
            "url": url.as_str(),
            "gotoOptions": { "waitUntil": "domcontentloaded" },
        });

        let resp = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| NavigationError::from_reqwest(url.as_str(), e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| NavigationError::from_reqwest(url.as_str(), e, self.timeout))
    }
}

/// Raw HTML via spider.cloud.
pub struct SpiderSource {
    spider: Spider,
}

impl SpiderSource {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .context("SPIDER_API_KEY environment variable must be set")?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        Ok(Self { spider })
    }
}

#[async_trait]
impl PageSource for SpiderSource {
    async fn load(&self, url: &Url) -> Result<String, NavigationError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let response = self
            .spider
            .scrape_url(url.as_str(), Some(params), "application/json")
            .await
            .map_err(|e| NavigationError::network(url.as_str(), e))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };

        let first = parsed.as_array().and_then(|arr| arr.first());

        if let Some(status) = first.and_then(|obj| obj.get("status")).and_then(|s| s.as_u64()) {
            check_status(url, status)?;
        }

        first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| NavigationError::network(url.as_str(), "no content in spider response"))
    }
}

/// Spider reports the upstream status as a bare number; anything outside u16 is garbage.
fn check_status(url: &Url, status: u64) -> Result<(), NavigationError> {
    match u16::try_from(status) {
        Ok(s) if (200..300).contains(&s) => Ok(()),
        Ok(s) => Err(NavigationError::Status {
            url: url.to_string(),
            status: s,
        }),
        Err(_) => Err(NavigationError::network(
            url.as_str(),
            format!("invalid upstream status {status}"),
        )),
    }
}
