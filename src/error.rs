use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A page could not be loaded. Local to one unit of work (a target or an enrichment link).
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("invalid url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("navigation to {url} timed out after {:.1}s", .after.as_secs_f64())]
    Timeout { url: String, after: Duration },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

impl NavigationError {
    pub fn network(url: &str, err: impl std::fmt::Display) -> Self {
        NavigationError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn from_reqwest(url: &str, err: reqwest::Error, after: Duration) -> Self {
        if err.is_timeout() {
            NavigationError::Timeout {
                url: url.to_string(),
                after,
            }
        } else {
            Self::network(url, err)
        }
    }
}

/// An enrichment link failed to load. A missing fact is not an error.
#[derive(Debug, Error)]
#[error("enrichment fetch failed for {link}")]
pub struct EnrichmentError {
    pub link: String,
    #[source]
    pub source: NavigationError,
}

#[derive(Debug, Error)]
#[error("invalid selector {selector:?}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize champions: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
