//! The crawl loop for a single domain.
//!
//! One `DomainOrchestrator` owns one frontier and one result shard, and
//! drives one rendering session sequentially: fetch, materialize, classify,
//! then either record the page or expand its links.

use crate::classifier::{PageClassifier, ProductMatch};
use crate::dynamic::{DynamicContentController, MaterializeBudget};
use crate::error::Result;
use crate::frontier::{FrontierLimits, FrontierManager};
use crate::gate::{AccessGate, CaptchaResolver, Fetched, RetryPolicy};
use crate::store::ShardWriter;
use async_trait::async_trait;
use prowl_browser::{absolutize, BrowserError, PageDriver, PageScripts};
use prowl_core::{AppConfig, BrowserConfig, CrawlStatus, Domain};
use prowl_rules::Rulebook;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Opens a rendering session for a domain.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a fresh page for `domain`.
    async fn open(&self, domain: &Domain) -> std::result::Result<Box<dyn PageDriver>, BrowserError>;
}

/// Sessions backed by the configured browser engine.
pub struct BrowserSessions {
    config: BrowserConfig,
}

impl BrowserSessions {
    #[must_use]
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for BrowserSessions {
    async fn open(&self, domain: &Domain) -> std::result::Result<Box<dyn PageDriver>, BrowserError> {
        debug!(domain = %domain, engine = ?self.config.engine, "opening session");
        prowl_browser::open_driver(&self.config).await
    }
}

/// Collaborators and limits shared by every domain session of one crawl.
pub struct CrawlContext {
    /// Rules every component reads
    pub rules: Arc<Rulebook>,
    /// Navigation guard
    pub gate: AccessGate,
    /// Lazy-content driver
    pub controller: DynamicContentController,
    /// Product scorer
    pub classifier: PageClassifier,
    /// Materialization limits
    pub budget: MaterializeBudget,
    /// Frontier limits
    pub limits: FrontierLimits,
    /// Optional randomized pause between page visits, in milliseconds
    pub politeness_delay_ms: Option<(u64, u64)>,
}

impl CrawlContext {
    #[must_use]
    pub fn from_config(config: &AppConfig, rules: Arc<Rulebook>) -> Self {
        let crawl = &config.crawl;
        Self {
            gate: AccessGate::new(Arc::clone(&rules), RetryPolicy::from_config(config)),
            controller: DynamicContentController::new(Arc::clone(&rules)),
            classifier: PageClassifier::from_config(Arc::clone(&rules), crawl),
            budget: MaterializeBudget::from_config(crawl),
            limits: FrontierLimits {
                max_depth: crawl.max_depth,
                max_urls: crawl.max_urls_per_domain,
                time_limit: crawl.domain_time_limit(),
            },
            politeness_delay_ms: crawl.politeness_delay_ms,
            rules,
        }
    }

    /// Replace the gate's CAPTCHA resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn CaptchaResolver>) -> Self {
        self.gate = self.gate.with_resolver(resolver);
        self
    }
}

/// How one domain session ended.
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    /// Domain crawled
    pub domain: Domain,
    /// Correlates the session's log lines
    pub session_id: Uuid,
    /// Terminal status
    pub status: CrawlStatus,
    /// Pages visited
    pub visited: usize,
    /// Product URLs recorded
    pub products: usize,
    /// URLs skipped after errors
    pub failed: usize,
    /// Wall-clock time of the session
    pub duration: Duration,
}

/// Drives the crawl of one domain.
pub struct DomainOrchestrator {
    session_id: Uuid,
    ctx: Arc<CrawlContext>,
    frontier: FrontierManager,
    writer: ShardWriter,
    failed: usize,
}

impl DomainOrchestrator {
    #[must_use]
    pub fn new(domain: Domain, ctx: Arc<CrawlContext>, writer: ShardWriter) -> Self {
        let frontier = FrontierManager::new(domain, Arc::clone(&ctx.rules), ctx.limits);
        Self {
            session_id: Uuid::new_v4(),
            ctx,
            frontier,
            writer,
            failed: 0,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        self.frontier.domain()
    }

    #[must_use]
    pub fn frontier(&self) -> &FrontierManager {
        &self.frontier
    }

    /// Crawl the domain from its entry URL until the frontier terminates or
    /// `cancel` fires. Products recorded before cancellation are kept.
    pub async fn run(&mut self, page: &dyn PageDriver, cancel: &CancellationToken) -> DomainReport {
        let started = Instant::now();
        let entry = self.domain().entry_url().to_string();
        let admission = self.frontier.admit(&entry, 0);
        if !admission.is_admitted() {
            warn!(url = %entry, ?admission, "entry URL refused");
        }
        info!(url = %entry, "crawl started");

        let status = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("crawl cancelled");
                CrawlStatus::TimedOut
            }
            status = self.crawl_loop(page) => status,
        };

        let report = self.report(status, started.elapsed());
        info!(
            status = status.display_name(),
            visited = report.visited,
            products = report.products,
            failed = report.failed,
            "crawl finished"
        );
        report
    }

    /// Report for the session's current state.
    #[must_use]
    pub fn report(&self, status: CrawlStatus, duration: Duration) -> DomainReport {
        DomainReport {
            domain: self.domain().clone(),
            session_id: self.session_id,
            status,
            visited: self.frontier.visited_count(),
            products: self.frontier.product_count(),
            failed: self.failed,
            duration,
        }
    }

    async fn crawl_loop(&mut self, page: &dyn PageDriver) -> CrawlStatus {
        let mut visits = 0usize;
        loop {
            if let Some(status) = self.frontier.termination() {
                return status;
            }
            let Some((url, depth)) = self.frontier.next() else {
                return self.frontier.termination().unwrap_or(CrawlStatus::Completed);
            };

            if visits > 0 {
                if let Some(delay) = self.politeness_delay() {
                    tokio::time::sleep(delay).await;
                }
            }
            visits += 1;

            if let Err(e) = self.visit(page, &url, depth).await {
                if e.is_domain_fatal() {
                    error!(url = %url, "session lost: {}", e);
                    return CrawlStatus::Failed;
                }
                warn!(url = %url, "skipping: {}", e);
                self.failed += 1;
            }
        }
    }

    async fn visit(&mut self, page: &dyn PageDriver, url: &str, depth: u32) -> Result<()> {
        debug!(url, depth, "visiting");
        let fetched = self.ctx.gate.fetch(page, url, self.frontier.domain()).await?;
        let captcha = match fetched {
            Fetched::FastPath(verdict) => {
                self.record(&verdict);
                return Ok(());
            }
            Fetched::Page { captcha } => captcha,
        };

        let materialized = self.ctx.controller.materialize(page, &self.ctx.budget).await?;
        let content = soft(page.content().await, String::new(), url, "content")?;
        let blocks = soft(page.structured_data_blocks().await, Vec::new(), url, "structured data")?;

        let verdict = self
            .ctx
            .classifier
            .classify(url, &content, &blocks, self.frontier.domain())?;
        if let Some(verdict) = verdict {
            self.record(&verdict);
            if self.ctx.classifier.halts_descent(&verdict) {
                return Ok(());
            }
        }

        let mut admitted = 0;
        for link in &materialized.links {
            let Some(target) = absolutize(url, link) else {
                continue;
            };
            if self.frontier.admit(&target, depth + 1).is_admitted() {
                admitted += 1;
            }
        }
        debug!(
            url,
            ?captcha,
            links = materialized.links.len(),
            scrolls = materialized.scrolls,
            admitted,
            "expanded"
        );
        Ok(())
    }

    fn record(&mut self, verdict: &ProductMatch) {
        if self.frontier.record_product(verdict.url()) {
            self.writer.record(verdict.url());
            info!(
                url = verdict.url(),
                confidence = verdict.confidence(),
                patterns = ?verdict.patterns(),
                "product found"
            );
        }
    }

    fn politeness_delay(&self) -> Option<Duration> {
        let (low, high) = self.ctx.politeness_delay_ms?;
        let ms = if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        };
        Some(Duration::from_millis(ms))
    }
}

/// Non-fatal read failures become `fallback`.
fn soft<T>(
    result: std::result::Result<T, BrowserError>,
    fallback: T,
    url: &str,
    what: &str,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            debug!(url, "{} unavailable: {}", what, e);
            Ok(fallback)
        }
    }
}
