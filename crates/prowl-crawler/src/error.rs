use prowl_browser::BrowserError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while crawling a domain
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("navigation to {url} failed after {attempts} attempts: {source}")]
    Navigation {
        url: String,
        attempts: u32,
        #[source]
        source: BrowserError,
    },

    #[error("CAPTCHA on {url} not resolved within {waited:?}")]
    CaptchaTimeout { url: String, waited: Duration },

    #[error("classifier produced confidence {confidence} for {url}")]
    InvalidConfidence { url: String, confidence: f64 },

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    /// Whether the error ends the whole domain session rather than one URL.
    #[must_use]
    pub fn is_domain_fatal(&self) -> bool {
        match self {
            Self::Browser(e) | Self::Navigation { source: e, .. } => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;
