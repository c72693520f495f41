//! Shared types used across the Prowl crawler.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::ProwlError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// A crawl target: the normalized host key plus the entry URL the crawl
/// starts from.
///
/// The key is the lowercase host with any leading `www.` removed, so
/// `https://www.Amazon.in` and `amazon.in` name the same domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain {
    key: String,
    entry: Url,
}

impl Domain {
    /// Parse a domain from either a bare host (`amazon.in`) or a URL
    /// (`https://flipkart.com`).
    ///
    /// Bare hosts without a `www.` prefix are entered through
    /// `https://www.<host>`; URLs are entered exactly as given.
    ///
    /// # Errors
    /// Returns error if the input is empty, not a valid host, or a URL
    /// without an http(s) scheme and host.
    pub fn parse(input: &str) -> Result<Self, ProwlError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ProwlError::Validation("domain cannot be empty".to_string()));
        }

        if input.contains("://") {
            let entry = Url::parse(input)
                .map_err(|e| ProwlError::Validation(format!("invalid domain URL '{input}': {e}")))?;
            if !matches!(entry.scheme(), "http" | "https") {
                return Err(ProwlError::Validation(format!(
                    "domain URL must use http or https, got '{}'",
                    entry.scheme()
                )));
            }
            let host = entry
                .host_str()
                .ok_or_else(|| ProwlError::Validation(format!("domain URL '{input}' has no host")))?;
            let key = strip_www(&host.to_lowercase()).to_string();
            Self::validate_host(&key)?;
            return Ok(Self { key, entry });
        }

        let host = input.trim_end_matches('/').to_lowercase();
        let key = strip_www(&host).to_string();
        Self::validate_host(&key)?;

        let entry_host = if host.starts_with("www.") {
            host.clone()
        } else {
            format!("www.{host}")
        };
        let entry = Url::parse(&format!("https://{entry_host}"))
            .map_err(|e| ProwlError::Validation(format!("invalid domain '{input}': {e}")))?;

        Ok(Self { key, entry })
    }

    /// Normalized host key, e.g. `amazon.in`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// First label of the host key, e.g. `amazon` for `amazon.in`.
    ///
    /// Domain-specific rule tables are registered under this label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.key.split('.').next().unwrap_or(&self.key)
    }

    /// URL the crawl of this domain starts from.
    #[must_use]
    pub fn entry_url(&self) -> &str {
        self.entry.as_str()
    }

    /// Whether a URL host belongs to this domain (the host contains the key).
    #[must_use]
    pub fn owns_host(&self, host: &str) -> bool {
        host.to_lowercase().contains(&self.key)
    }

    fn validate_host(host: &str) -> Result<(), ProwlError> {
        static HOST_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = HOST_REGEX.get_or_init(|| {
            Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$")
                .expect("valid regex")
        });

        if regex.is_match(host) {
            Ok(())
        } else {
            Err(ProwlError::Validation(format!(
                "invalid domain: expected a dotted hostname, got '{host}'"
            )))
        }
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl TryFrom<String> for Domain {
    type Error = ProwlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.entry.to_string()
    }
}

/// Terminal (or running) status of one domain crawl session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlStatus {
    /// Crawl loop still active
    Running,
    /// Frontier drained without hitting any budget
    Completed,
    /// `max_urls_per_domain` visits reached
    UrlLimitReached,
    /// Frontier drained after refusing links beyond `max_depth`
    DepthExhausted,
    /// Per-domain soft limit or global batch timeout elapsed
    TimedOut,
    /// Session aborted by a domain-fatal error
    Failed,
}

impl CrawlStatus {
    /// Whether the session has stopped.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::UrlLimitReached => "url-limit-reached",
            Self::DepthExhausted => "depth-exhausted",
            Self::TimedOut => "timed-out",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, ProwlError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ProwlError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 (ISO-8601) string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
