//! Retry, backoff and CAPTCHA gating around every navigation.

use crate::classifier::ProductMatch;
use crate::error::{CrawlError, Result};
use crate::markers;
use async_trait::async_trait;
use prowl_browser::{BrowserError, PageDriver, WaitMode};
use prowl_core::{AppConfig, Domain};
use prowl_rules::{Markers, Rulebook};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How often the manual resolver re-checks the page.
const RESOLUTION_POLL: Duration = Duration::from_secs(2);

/// Progress of a page through CAPTCHA gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaState {
    /// No CAPTCHA marker on the page
    None,
    /// A marker was found
    Detected,
    /// Waiting on an external resolution signal
    AwaitingResolution,
    /// The challenge cleared before the ceiling
    Resolved,
    /// The ceiling elapsed with the challenge still up
    TimedOut,
}

/// External party that clears a CAPTCHA. Implementations wait until the
/// page no longer shows one; the gate bounds the wait.
#[async_trait]
pub trait CaptchaResolver: Send + Sync {
    /// Return once the challenge on `page` is gone.
    async fn await_resolution(
        &self,
        page: &dyn PageDriver,
        markers: &Markers,
    ) -> std::result::Result<(), BrowserError>;
}

/// Waits for a human to solve the challenge in a visible browser window.
#[derive(Debug, Clone)]
pub struct ManualResolver {
    poll_interval: Duration,
}

impl ManualResolver {
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for ManualResolver {
    fn default() -> Self {
        Self::new(RESOLUTION_POLL)
    }
}

#[async_trait]
impl CaptchaResolver for ManualResolver {
    async fn await_resolution(
        &self,
        page: &dyn PageDriver,
        markers: &Markers,
    ) -> std::result::Result<(), BrowserError> {
        loop {
            if markers::any_present(page, &markers.captcha_resolved).await? {
                return Ok(());
            }
            if !markers::any_present(page, &markers.captcha).await? {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Retry and wait bounds for the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed navigation
    pub max_retries: u32,
    /// Base delay, multiplied by the attempt number
    pub retry_delay: Duration,
    /// Bound on a single navigation
    pub navigation_timeout: Duration,
    /// Bound on the best-effort idle wait after navigation
    pub network_idle_timeout: Duration,
    /// Bound on waiting for a CAPTCHA to clear
    pub captcha_ceiling: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.crawl.max_retries,
            retry_delay: config.crawl.retry_delay(),
            navigation_timeout: config.browser.navigation_timeout(),
            network_idle_timeout: config.browser.network_idle_timeout(),
            captcha_ceiling: config.crawl.captcha_ceiling(),
        }
    }

    /// Linear backoff before retrying after failed attempt `attempt` (0-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay * (attempt + 1)
    }
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// The URL shape alone decided it is a product page
    FastPath(ProductMatch),
    /// The page is loaded and ready to be materialized
    Page {
        /// Final CAPTCHA state, `None` or `Resolved`
        captcha: CaptchaState,
    },
}

/// Guards navigation with retries and CAPTCHA gating.
pub struct AccessGate {
    rules: Arc<Rulebook>,
    policy: RetryPolicy,
    resolver: Arc<dyn CaptchaResolver>,
}

impl AccessGate {
    /// Gate that waits for manual CAPTCHA resolution.
    #[must_use]
    pub fn new(rules: Arc<Rulebook>, policy: RetryPolicy) -> Self {
        Self {
            rules,
            policy,
            resolver: Arc::new(ManualResolver::default()),
        }
    }

    /// Replace the CAPTCHA resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn CaptchaResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Navigate `page` to `url`.
    ///
    /// Fast-path URLs are only navigated to and reported as products.
    /// Everything else also passes CAPTCHA gating and a best-effort
    /// network-idle wait.
    pub async fn fetch(&self, page: &dyn PageDriver, url: &str, domain: &Domain) -> Result<Fetched> {
        if let Some(pattern) = self.rules.patterns.fast_path_match(url, domain) {
            self.navigate_with_retry(page, url).await?;
            info!(url, pattern = pattern.id(), "fast-path product");
            let verdict = ProductMatch::new(url, pattern.weight(), vec![pattern.id().to_string()])?;
            return Ok(Fetched::FastPath(verdict));
        }

        self.navigate_with_retry(page, url).await?;
        let captcha = self.gate_captcha(page, url).await?;

        match page.wait_for_network_idle(self.policy.network_idle_timeout).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => debug!(url, "continuing without network idle: {}", e),
        }

        Ok(Fetched::Page { captcha })
    }

    /// Whether `page` currently shows a CAPTCHA challenge.
    pub async fn is_captcha_present(
        &self,
        page: &dyn PageDriver,
    ) -> std::result::Result<bool, BrowserError> {
        markers::any_present(page, &self.rules.markers.captcha).await
    }

    async fn navigate_with_retry(&self, page: &dyn PageDriver, url: &str) -> Result<()> {
        let mut attempt = 0;
        loop {
            match page
                .navigate(url, WaitMode::DomContentLoaded, self.policy.navigation_timeout)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        "navigation failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(CrawlError::Navigation {
                        url: url.to_string(),
                        attempts: attempt + 1,
                        source,
                    })
                }
            }
        }
    }

    async fn gate_captcha(&self, page: &dyn PageDriver, url: &str) -> Result<CaptchaState> {
        if !self.is_captcha_present(page).await? {
            return Ok(CaptchaState::None);
        }

        debug!(url, state = ?CaptchaState::Detected, "captcha marker found");
        info!(
            url,
            state = ?CaptchaState::AwaitingResolution,
            ceiling = ?self.policy.captcha_ceiling,
            "CAPTCHA detected, waiting for resolution"
        );

        let started = Instant::now();
        let waited = tokio::time::timeout(
            self.policy.captcha_ceiling,
            self.resolver.await_resolution(page, &self.rules.markers),
        )
        .await;

        let state = match waited {
            Ok(Ok(())) => CaptchaState::Resolved,
            Ok(Err(e)) if e.is_fatal() => return Err(e.into()),
            Ok(Err(e)) => {
                warn!(url, "CAPTCHA resolution check failed: {}", e);
                CaptchaState::TimedOut
            }
            Err(_) => CaptchaState::TimedOut,
        };

        if state == CaptchaState::TimedOut {
            warn!(url, "CAPTCHA not resolved in time");
            return Err(CrawlError::CaptchaTimeout {
                url: url.to_string(),
                waited: started.elapsed(),
            });
        }

        info!(url, waited = ?started.elapsed(), "CAPTCHA resolved");
        Ok(state)
    }
}
