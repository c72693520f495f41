//! Forcing lazy-loaded and infinite-scroll content to render before links
//! are read.

use crate::markers;
use prowl_browser::{BrowserError, PageDriver, PageScripts};
use prowl_core::CrawlConfig;
use prowl_rules::Rulebook;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Consecutive zero-gain scrolls after which the page is considered exhausted.
pub const STALL_LIMIT: u32 = 2;

/// Time and attempt limits for one materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeBudget {
    /// Per-probe wait for product containers, and the pause after a
    /// load-more click
    pub dynamic_wait: Duration,
    /// Bound on the initial network-idle wait
    pub network_idle: Duration,
    /// Pause after each scroll before re-reading links
    pub scroll_settle: Duration,
    /// Maximum scroll attempts
    pub max_scroll_attempts: u32,
    /// Wall-clock bound on the scroll loop
    pub scroll_timeout: Duration,
    /// Consecutive zero-gain scrolls that end the loop
    pub stall_limit: u32,
}

impl MaterializeBudget {
    #[must_use]
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            dynamic_wait: config.dynamic_wait(),
            network_idle: config.dynamic_wait(),
            scroll_settle: config.scroll_settle(),
            max_scroll_attempts: config.max_scroll_attempts,
            scroll_timeout: config.scroll_timeout(),
            stall_limit: STALL_LIMIT,
        }
    }
}

/// What materialization observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    /// Every link seen across all extractions, in discovery order, without
    /// duplicates
    pub links: Vec<String>,
    /// Scroll attempts performed
    pub scrolls: u32,
    /// Whether a product container became visible during probing
    pub containers_visible: bool,
}

/// Accumulates links across extractions, preserving first-seen order.
#[derive(Default)]
struct LinkSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl LinkSet {
    /// Merge `links`, returning how many were new.
    fn merge(&mut self, links: Vec<String>) -> usize {
        let before = self.order.len();
        for link in links {
            if self.seen.insert(link.clone()) {
                self.order.push(link);
            }
        }
        self.order.len() - before
    }
}

/// Drives a page until its deferred content has rendered.
pub struct DynamicContentController {
    rules: Arc<Rulebook>,
}

impl DynamicContentController {
    #[must_use]
    pub fn new(rules: Arc<Rulebook>) -> Self {
        Self { rules }
    }

    /// Materialize the current page and return every link observed.
    ///
    /// Script and extraction failures count as "no links" and the page is
    /// still returned; only session-fatal driver errors propagate.
    pub async fn materialize(
        &self,
        page: &dyn PageDriver,
        budget: &MaterializeBudget,
    ) -> Result<Materialized, BrowserError> {
        match page.wait_for_network_idle(budget.network_idle).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("network never settled: {}", e),
        }

        let container = markers::first_visible(
            page,
            &self.rules.markers.product_containers,
            budget.dynamic_wait,
        )
        .await?;
        match &container {
            Some(selector) => trace!(selector = %selector, "product container visible"),
            None => {
                if let Err(e) = page.flush_render().await {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    debug!("render flush failed: {}", e);
                }
            }
        }

        let mut links = LinkSet::default();
        links.merge(extract(page).await?);

        let scrolls = if self.is_scroll_heavy(page).await? {
            self.scroll_loop(page, budget, &mut links).await?
        } else {
            0
        };

        Ok(Materialized {
            links: links.order,
            scrolls,
            containers_visible: container.is_some(),
        })
    }

    async fn is_scroll_heavy(&self, page: &dyn PageDriver) -> Result<bool, BrowserError> {
        let viewport = tolerate(page.viewport_height().await, 0)?;
        if viewport == 0 {
            return Ok(false);
        }
        let height = tolerate(page.scroll_height().await, 0)?;
        Ok(height > viewport * 2)
    }

    async fn scroll_loop(
        &self,
        page: &dyn PageDriver,
        budget: &MaterializeBudget,
        links: &mut LinkSet,
    ) -> Result<u32, BrowserError> {
        let deadline = Instant::now() + budget.scroll_timeout;
        let mut stalls = 0;
        let mut attempts = 0;
        let mut last_height: Option<u64> = None;

        while attempts < budget.max_scroll_attempts {
            if Instant::now() >= deadline {
                debug!(attempts, "scroll timeout reached");
                break;
            }

            let height = tolerate(page.scroll_height().await, 0)?;
            if last_height == Some(height) && self.activate_load_more(page).await? {
                tokio::time::sleep(budget.dynamic_wait).await;
            }
            last_height = Some(height);

            if let Err(e) = page.scroll_to_bottom().await {
                if e.is_fatal() {
                    return Err(e);
                }
                debug!("scroll failed: {}", e);
            }
            tokio::time::sleep(budget.scroll_settle).await;
            attempts += 1;

            let gained = links.merge(extract(page).await?);
            trace!(attempt = attempts, gained, "scrolled");
            if gained == 0 {
                stalls += 1;
                if stalls >= budget.stall_limit {
                    debug!(attempts, "no new links after {} scrolls", stalls);
                    break;
                }
            } else {
                stalls = 0;
            }
        }

        Ok(attempts)
    }

    /// Try each load-more phrase until one activates a control.
    async fn activate_load_more(&self, page: &dyn PageDriver) -> Result<bool, BrowserError> {
        for phrase in &self.rules.markers.load_more {
            match page.activate_by_text(phrase).await {
                Ok(true) => {
                    debug!(phrase = %phrase, "activated load-more control");
                    return Ok(true);
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => trace!(phrase = %phrase, "load-more probe failed: {}", e),
            }
        }
        Ok(false)
    }
}

async fn extract(page: &dyn PageDriver) -> Result<Vec<String>, BrowserError> {
    tolerate(page.extract_links().await, Vec::new())
}

/// Substitute `fallback` for non-fatal errors.
fn tolerate<T>(result: Result<T, BrowserError>, fallback: T) -> Result<T, BrowserError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!("page script failed: {}", e);
            Ok(fallback)
        }
    }
}
